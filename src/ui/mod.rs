//! egui rendering on top of [`crate::state::AppState`].

pub mod fonts;
pub mod panels;
