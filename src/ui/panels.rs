use std::path::PathBuf;

use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};
use egui_extras::{Column, TableBuilder};
use vibroscan::color::{named_colour, ColorMap};
use vibroscan::data::{Channel, Unit};
use vibroscan::export::png::{write_png, PlotOptions};
use vibroscan::export::{hxml::write_hxml, table::load_curve_table};

use crate::state::{AppState, Status, View};

// ---------------------------------------------------------------------------
// Left side panel – plane, channel and review widgets
// ---------------------------------------------------------------------------

/// Render the left review panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Planes");
    ui.separator();

    if state.planes.is_empty() {
        ui.label("No scan loaded.");
        return;
    }

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            plane_list(ui, state);
            ui.separator();
            channel_selector(ui, state);
            ui.separator();
            view_selector(ui, state);
            ui.separator();

            match state.view {
                View::ScanPoints => anomaly_page(ui, state),
                View::Bands | View::Layout => band_editor(ui, state),
                _ => {}
            }

            ui.separator();
            egui::CollapsingHeader::new(RichText::new("Point table").strong())
                .default_open(false)
                .show(ui, |ui: &mut Ui| point_table(ui, state));
        });
}

fn plane_list(ui: &mut Ui, state: &mut AppState) {
    let names: Vec<String> = state.planes.iter().map(|p| p.scan_name().to_string()).collect();
    let mut clicked = None;
    for (i, name) in names.iter().enumerate() {
        if ui.selectable_label(state.selected == Some(i), name).clicked() {
            clicked = Some(i);
        }
    }
    if let Some(i) = clicked {
        state.select(i);
    }
    if ui.small_button("Close plane").clicked() {
        state.remove_selected();
    }
}

fn channel_selector(ui: &mut Ui, state: &mut AppState) {
    ui.strong("Channel");
    let before = state.key();
    egui::ComboBox::from_id_salt("channel")
        .selected_text(state.channel.description())
        .show_ui(ui, |ui: &mut Ui| {
            for channel in Channel::ALL {
                ui.selectable_value(&mut state.channel, channel, channel.description());
            }
        });
    ui.horizontal(|ui: &mut Ui| {
        ui.radio_value(&mut state.unit, Unit::Decibel, "dB");
        ui.radio_value(&mut state.unit, Unit::Linear, "Linear");
    });
    if state.key() != before {
        state.refresh();
    }
}

fn view_selector(ui: &mut Ui, state: &mut AppState) {
    ui.strong("View");
    let before = state.view;
    for view in View::ALL {
        ui.selectable_value(&mut state.view, view, view.label());
    }
    if state.view != before {
        state.refresh();
    }
}

/// Two points per page, each with an "anomalous" checkbox.
fn anomaly_page(ui: &mut Ui, state: &mut AppState) {
    let pages = state.page_count();
    ui.horizontal(|ui: &mut Ui| {
        if ui.small_button("◀").clicked() && state.page > 0 {
            state.set_page(state.page - 1);
        }
        ui.label(format!("Page {} of {pages}", state.page + 1));
        if ui.small_button("▶").clicked() && state.page + 1 < pages {
            state.set_page(state.page + 1);
        }
    });

    let flags: Vec<(u32, bool)> = match state.plane() {
        Some(plane) => state
            .page_points()
            .into_iter()
            .map(|n| (n, plane.anomalous_points().contains(&n)))
            .collect(),
        None => return,
    };
    for (point, was) in flags {
        let mut checked = was;
        if ui
            .checkbox(&mut checked, format!("Point {point} anomalous"))
            .changed()
        {
            state.set_anomalous(point, checked);
        }
    }

    if let Some(plane) = state.plane() {
        let excluded = plane.anomalous_points();
        if !excluded.is_empty() {
            let list: Vec<String> = excluded.iter().map(u32::to_string).collect();
            ui.label(format!("Excluded: {}", list.join(", ")));
        }
    }
    if ui.small_button("Clear anomalies").clicked() {
        state.clear_anomalies();
    }
}

fn band_editor(ui: &mut Ui, state: &mut AppState) {
    ui.strong("Bands");
    let Some(plane) = state.plane() else {
        return;
    };
    let bands: Vec<(String, String)> = plane
        .bands()
        .iter()
        .enumerate()
        .map(|(i, band)| {
            let points: Vec<String> = band.iter().map(u32::to_string).collect();
            (plane.band_colour(i).to_string(), points.join("-"))
        })
        .collect();
    let unassigned: Vec<String> = plane.unassigned_points().iter().map(u32::to_string).collect();

    for (i, (colour, points)) in bands.iter().enumerate() {
        let [r, g, b] = named_colour(colour).unwrap_or([128, 128, 128]);
        let text = RichText::new(format!("Band {}: {points}", i + 1));
        ui.label(text.color(Color32::from_rgb(r, g, b)));
    }
    if !unassigned.is_empty() {
        ui.label(format!("Unassigned: {}", unassigned.join(", ")));
    }

    ui.horizontal(|ui: &mut Ui| {
        let response = ui.add(
            egui::TextEdit::singleline(&mut state.band_input)
                .hint_text("1-2-3")
                .desired_width(120.0),
        );
        let submitted = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
        if ui.button("Add band").clicked() || submitted {
            state.submit_band();
        }
    });
    if ui.small_button("Clear bands").clicked() {
        state.clear_bands();
    }
}

/// Every point of the selected plane with its coordinates and status.
fn point_table(ui: &mut Ui, state: &AppState) {
    let Some(plane) = state.plane() else {
        return;
    };
    let rows: Vec<(u32, Option<[f64; 3]>, String)> = plane
        .point_numbers()
        .into_iter()
        .map(|n| {
            let status = if plane.anomalous_points().contains(&n) {
                "anomalous".to_string()
            } else {
                plane
                    .bands()
                    .iter()
                    .position(|b| b.contains(&n))
                    .map(|i| format!("band {}", i + 1))
                    .unwrap_or_default()
            };
            (n, plane.coordinates().get(&n).copied(), status)
        })
        .collect();

    TableBuilder::new(ui)
        .striped(true)
        .max_scroll_height(240.0)
        .column(Column::auto())
        .column(Column::auto())
        .column(Column::auto())
        .column(Column::remainder())
        .header(18.0, |mut header| {
            for title in ["Point", "X", "Y", "Status"] {
                header.col(|ui| {
                    ui.strong(title);
                });
            }
        })
        .body(|mut body| {
            for (n, coord, status) in &rows {
                body.row(16.0, |mut row| {
                    row.col(|ui| {
                        ui.label(n.to_string());
                    });
                    row.col(|ui| {
                        ui.label(coord.map(|c| format!("{:.4}", c[0])).unwrap_or_default());
                    });
                    row.col(|ui| {
                        ui.label(coord.map(|c| format!("{:.4}", c[1])).unwrap_or_default());
                    });
                    row.col(|ui| {
                        ui.label(status);
                    });
                });
            }
        });
}

// ---------------------------------------------------------------------------
// Bottom panel – remarks
// ---------------------------------------------------------------------------

pub fn remarks_table(ui: &mut Ui, state: &AppState) {
    let titles: Vec<&str> = state.bundle.curves.iter().map(|c| c.plot_title.as_str()).collect();
    let colours = ColorMap::new(&titles);

    TableBuilder::new(ui)
        .striped(true)
        .column(Column::auto().resizable(true))
        .column(Column::remainder())
        .header(18.0, |mut header| {
            header.col(|ui| {
                ui.strong("Curve");
            });
            header.col(|ui| {
                ui.strong("Remarks");
            });
        })
        .body(|mut body| {
            for (i, curve) in state.bundle.curves.iter().enumerate() {
                body.row(16.0, |mut row| {
                    row.col(|ui| {
                        let [r, g, b] = colours.color_for(&curve.plot_title);
                        let text = RichText::new(&curve.plot_title);
                        ui.label(text.color(Color32::from_rgb(r, g, b)));
                    });
                    row.col(|ui| {
                        ui.label(state.bundle.remark(i).unwrap_or_default());
                    });
                });
            }
        });
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open scans…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
            ui.separator();
            if ui.button("Export view as HXML…").clicked() {
                export_hxml(state);
                ui.close_menu();
            }
            if ui.button("Export view as PNG…").clicked() {
                export_png(state);
                ui.close_menu();
            }
            if ui.button("Export device bundle…").clicked() {
                export_device(state);
                ui.close_menu();
            }
            if ui.button("Convert curve table to HXML…").clicked() {
                convert_curve_table(state);
                ui.close_menu();
            }
        });

        ui.separator();

        if let Some(plane) = state.plane() {
            let header = plane.header();
            ui.label(format!(
                "{}: {} points, {} anomalous, {} band(s)",
                plane.scan_name(),
                plane.len(),
                plane.anomalous_points().len(),
                plane.bands().len()
            ));
            if !header.date_db_created.is_empty() {
                ui.label(format!("recorded {} {}", header.date_db_created, header.time_db_created));
            }
        }

        ui.separator();

        match &state.status {
            Some(Status::Error(msg)) => {
                ui.label(RichText::new(msg).color(Color32::RED));
            }
            Some(Status::Info(msg)) => {
                ui.label(msg);
            }
            None => {}
        }
    });
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let files = rfd::FileDialog::new()
        .set_title("Open scan files")
        .add_filter("Universal File Format", &["uff", "unv"])
        .pick_files();

    if let Some(paths) = files {
        state.load_paths(paths);
    }
}

fn save_dialog(title: &str, file_name: &str, filter: (&str, &[&str])) -> Option<PathBuf> {
    rfd::FileDialog::new()
        .set_title(title)
        .set_file_name(file_name)
        .add_filter(filter.0, filter.1)
        .save_file()
}

fn export_hxml(state: &mut AppState) {
    if state.bundle.is_empty() {
        state.error("Nothing to export in this view");
        return;
    }
    let name = format!("{}.hxml", state.export_stem());
    let Some(path) = save_dialog("Export HXML", &name, ("HXML", &["hxml"])) else {
        return;
    };
    match write_hxml(&path, &state.bundle) {
        Ok(()) => state.info(format!("Wrote {}", path.display())),
        Err(e) => state.error(format!("Export failed: {e:#}")),
    }
}

fn export_png(state: &mut AppState) {
    if state.bundle.is_empty() {
        state.error("Nothing to export in this view");
        return;
    }
    let name = format!("{}.png", state.export_stem());
    let Some(path) = save_dialog("Export PNG", &name, ("PNG", &["png"])) else {
        return;
    };
    match write_png(&path, &state.bundle.curves, &PlotOptions::default()) {
        Ok(()) => state.info(format!("Wrote {}", path.display())),
        Err(e) => state.error(format!("Export failed: {e:#}")),
    }
}

fn export_device(state: &mut AppState) {
    let bundle = match state.device_bundle() {
        Ok(bundle) => bundle,
        Err(e) => {
            state.error(format!("Device export failed: {e}"));
            return;
        }
    };
    let Some(path) = save_dialog("Export device bundle", "device.hxml", ("HXML", &["hxml"])) else {
        return;
    };
    match write_hxml(&path, &bundle) {
        Ok(()) => state.info(format!("Wrote {} curve(s) to {}", bundle.len(), path.display())),
        Err(e) => state.error(format!("Export failed: {e:#}")),
    }
}

fn convert_curve_table(state: &mut AppState) {
    let Some(input) = rfd::FileDialog::new()
        .set_title("Open curve table")
        .add_filter("CSV", &["csv"])
        .pick_file()
    else {
        return;
    };
    let bundle = match load_curve_table(&input) {
        Ok(bundle) => bundle,
        Err(e) => {
            state.error(format!("Failed to read {}: {e:#}", input.display()));
            return;
        }
    };
    let name = input
        .with_extension("hxml")
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "curves.hxml".to_string());
    let Some(path) = save_dialog("Save HXML", &name, ("HXML", &["hxml"])) else {
        return;
    };
    match write_hxml(&path, &bundle) {
        Ok(()) => state.info(format!("Wrote {}", path.display())),
        Err(e) => state.error(format!("Export failed: {e:#}")),
    }
}
