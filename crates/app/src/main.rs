mod state;
mod ui;

use bubblemap_core::config::LayoutConfig;
use eframe::egui;
use state::{AppState, Settings};
use tracing_subscriber::EnvFilter;

struct BubblemapApp {
    state: AppState,
}

impl BubblemapApp {
    fn new(cc: &eframe::CreationContext<'_>, config: LayoutConfig) -> Self {
        let settings: Settings = cc
            .storage
            .and_then(|s| eframe::get_value(s, eframe::APP_KEY))
            .unwrap_or_default();
        let mut state = AppState::new(config, settings);
        if let Some(path) = state.settings.last_dataset.clone() {
            if let Err(e) = state.load_dataset(&path) {
                tracing::warn!(error = %e, "could not reopen last dataset");
                state.settings.last_dataset = None;
            }
        }
        Self { state }
    }
}

impl eframe::App for BubblemapApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ui::draw(&mut self.state, ctx);
    }

    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        eframe::set_value(storage, eframe::APP_KEY, &self.state.settings);
    }
}

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cwd = std::env::current_dir().unwrap_or_default();
    let config = LayoutConfig::resolve(None, &cwd).unwrap_or_else(|e| {
        tracing::error!(error = %e, "invalid config, using defaults");
        LayoutConfig::default()
    });

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1240.0, 980.0])
            .with_title("Problem areas"),
        ..Default::default()
    };
    eframe::run_native(
        "Bubblemap",
        options,
        Box::new(move |cc| Ok(Box::new(BubblemapApp::new(cc, config)))),
    )
}
