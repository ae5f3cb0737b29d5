use anyhow::Context;
use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};
use egui_extras::{Column, TableBuilder};

use crate::data::filter::ResultSet;
use crate::state::{AppState, QueryView};

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Upload…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
            if ui.button("Reload latest").clicked() {
                state.load_latest();
                ui.close_menu();
            }
        });

        ui.separator();

        if let Some(source) = &state.source {
            let encoding = source
                .encoding
                .map(|e| format!(", {e}"))
                .unwrap_or_default();
            let caption = ui.label(format!(
                "📄 使用報價檔案：{}  ({} rows{encoding})",
                source.source_name,
                source.table.len()
            ));
            if let Some(path) = &source.path {
                caption.on_hover_text(path.display().to_string());
            }
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// Central panel – keyword box and results
// ---------------------------------------------------------------------------

pub fn query_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("🚚 載運米數報價查詢");
    ui.add_space(4.0);

    if state.source.is_none() {
        ui.label("No price list loaded. Put a 新報價 file in the folder, then use File → Reload latest, or File → Upload….");
        return;
    }

    if state.source.as_ref().is_some_and(|s| s.table.is_empty()) {
        ui.label(
            RichText::new("⚠ 報價檔案沒有任何資料列")
                .color(Color32::from_rgb(200, 120, 0)),
        );
    }

    let mut keyword = state.keyword.clone();
    let response = ui.add(
        egui::TextEdit::singleline(&mut keyword)
            .hint_text("🔍 請輸入地點關鍵字（例：宜蘭市）")
            .desired_width(320.0),
    );
    if response.changed() {
        state.set_keyword(keyword);
    }
    ui.separator();

    let mut save_clicked = false;
    match &state.view {
        QueryView::Prompt => {
            ui.label("請輸入地點關鍵字以查詢對應載運報價");
        }
        QueryView::NoMatch(_) => {
            ui.label(RichText::new("❌ 查無符合的地點").color(Color32::from_rgb(200, 120, 0)));
        }
        QueryView::Matches(query, result) => {
            ui.horizontal(|ui: &mut Ui| {
                ui.label(
                    RichText::new(format!(
                        "✅ 找到 {} 筆符合「{}」的報價",
                        result.len(),
                        query.keyword()
                    ))
                    .color(Color32::from_rgb(0, 140, 60)),
                );
                save_clicked = ui.button("⬇ 下載結果 CSV").clicked();
            });
            ui.add_space(4.0);
            result_table(ui, result);
            single_record(ui, result);
        }
    }

    if save_clicked {
        save_result_dialog(state);
    }
}

fn result_table(ui: &mut Ui, result: &ResultSet) {
    let extra_columns = result.columns().len().saturating_sub(1);
    TableBuilder::new(ui)
        .striped(true)
        .resizable(true)
        .max_scroll_height(360.0)
        .cell_layout(egui::Layout::left_to_right(egui::Align::Center))
        .column(Column::auto().at_least(140.0))
        .columns(Column::auto().at_least(56.0), extra_columns)
        .header(22.0, |mut header| {
            for col in result.columns() {
                header.col(|ui: &mut Ui| {
                    ui.strong(col.to_string());
                });
            }
        })
        .body(|mut body| {
            for row in result.rows() {
                body.row(20.0, |mut table_row| {
                    for cell in row {
                        table_row.col(|ui: &mut Ui| {
                            ui.label(cell.to_string());
                        });
                    }
                });
            }
        });
}

/// One match: show it as a `{column: value}` record for copying.
fn single_record(ui: &mut Ui, result: &ResultSet) {
    let Some(record) = result.single_record() else {
        return;
    };
    let text = serde_json::to_string_pretty(&record).unwrap_or_default();
    ui.add_space(8.0);
    ui.horizontal(|ui: &mut Ui| {
        ui.strong("Record");
        if ui.small_button("📋 Copy").clicked() {
            ui.ctx().copy_text(text.clone());
        }
    });
    ScrollArea::vertical()
        .id_salt("single_record")
        .max_height(240.0)
        .show(ui, |ui: &mut Ui| {
            ui.label(RichText::new(&text).monospace());
        });
}

// ---------------------------------------------------------------------------
// Footer
// ---------------------------------------------------------------------------

pub fn footer(ui: &mut Ui) {
    ui.label("📌 使用說明：將新報價202X.csv 放入本資料夾，或使用上傳功能進行查詢。");
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Upload price list")
        .add_filter("Supported files", &["csv", "xlsx", "xlsm", "xls", "parquet", "pq"])
        .add_filter("CSV", &["csv"])
        .add_filter("Spreadsheet", &["xlsx", "xlsm", "xls"])
        .add_filter("Parquet", &["parquet", "pq"])
        .pick_file();

    if let Some(path) = file {
        state.upload(&path);
    }
}

pub fn save_result_dialog(state: &mut AppState) {
    let export = match state.export() {
        Ok(Some(export)) => export,
        Ok(None) => return,
        Err(e) => {
            log::error!("Failed to serialize result: {e:#}");
            state.status_message = Some(format!("Error: {e:#}"));
            return;
        }
    };

    let Some(path) = rfd::FileDialog::new()
        .set_title("Save query result")
        .set_file_name(export.file_name.as_str())
        .add_filter("CSV", &["csv"])
        .save_file()
    else {
        return;
    };

    match std::fs::write(&path, &export.bytes)
        .with_context(|| format!("writing {}", path.display()))
    {
        Ok(()) => log::info!("Saved result to {}", path.display()),
        Err(e) => {
            log::error!("Failed to save result: {e:#}");
            state.status_message = Some(format!("Error: {e:#}"));
        }
    }
}
