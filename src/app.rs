use eframe::egui;
use vibroscan::AnalysisConfig;

use crate::state::{AppState, View};
use crate::ui::{panels, plot};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct VibroscanApp {
    pub state: AppState,
}

impl VibroscanApp {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            state: AppState::new(config),
        }
    }
}

impl eframe::App for VibroscanApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: plane, channel and review controls ----
        egui::SidePanel::left("review_panel")
            .default_width(260.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Bottom panel: remarks of the shown curves ----
        if !self.state.bundle.is_empty() {
            egui::TopBottomPanel::bottom("remarks_panel")
                .resizable(true)
                .default_height(120.0)
                .show(ctx, |ui| {
                    panels::remarks_table(ui, &self.state);
                });
        }

        // ---- Central panel: plot ----
        egui::CentralPanel::default().show(ctx, |ui| {
            if self.state.view == View::Layout {
                plot::layout_plot(ui, &self.state);
            } else {
                plot::curve_plot(ui, &self.state);
            }
        });
    }
}
