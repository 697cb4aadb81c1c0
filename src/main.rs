mod app;
mod state;
mod ui;

use app::VibroscanApp;
use eframe::egui;
use vibroscan::AnalysisConfig;

fn main() -> eframe::Result {
    env_logger::init();

    let config = match AnalysisConfig::resolve(None) {
        Ok(config) => config,
        Err(e) => {
            log::error!("configuration not usable, falling back to defaults: {e:#}");
            AnalysisConfig::default()
        }
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 820.0])
            .with_min_inner_size([640.0, 420.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Vibroscan – Scan Viewer",
        options,
        Box::new(|_cc| Ok(Box::new(VibroscanApp::new(config)))),
    )
}
