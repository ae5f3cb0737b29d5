mod app;
mod config;
mod data;
mod error;
mod headless;
mod state;
mod ui;

use anyhow::anyhow;
use app::QuoteLookupApp;
use clap::Parser;
use config::Cli;
use data::loader::Loader;
use eframe::egui;
use state::AppState;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    if let Some(keyword) = &cli.query {
        return headless::run(&cli, keyword);
    }

    let mut state = AppState::new(Loader::new(cli.loader_config()), cli.dir.clone());
    match &cli.file {
        Some(path) => state.upload(path),
        None => state.load_latest(),
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 720.0])
            .with_min_inner_size([600.0, 400.0])
            .with_drag_and_drop(true),
        ..Default::default()
    };

    eframe::run_native(
        "載運報價查詢",
        options,
        Box::new(move |cc| {
            ui::fonts::install_cjk_font(&cc.egui_ctx);
            Ok(Box::new(QuoteLookupApp::new(state)))
        }),
    )
    .map_err(|e| anyhow!("running window: {e}"))
}
