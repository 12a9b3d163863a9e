mod backend_bridge;
mod capture;
mod config;
mod controller;
mod ui;

use clap::Parser;
use crossbeam_channel::bounded;
use eframe::egui;

use backend_bridge::commands::BackendCommand;
use backend_bridge::runtime::{start_backend_bridge, BridgeConfig};
use controller::events::UiEvent;
use ui::ScanApp;

#[derive(Debug, Parser)]
#[command(
    name = "scanlens",
    about = "Scan a product photo and stream analysis results from the analyzer backend"
)]
struct Args {
    /// Analyzer endpoint; http(s) URLs are mapped to ws(s).
    #[arg(long)]
    analyzer_url: Option<String>,
    #[arg(long)]
    country: Option<String>,
    #[arg(long)]
    language: Option<String>,
}

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let args = Args::parse();
    let mut settings = config::load_settings();
    if let Some(url) = args.analyzer_url {
        settings.analyzer_url = url;
    }
    if let Some(country) = args.country {
        settings.country = Some(country);
    }
    if let Some(language) = args.language {
        settings.language = Some(language);
    }

    let (cmd_tx, cmd_rx) = bounded::<BackendCommand>(64);
    let (ui_tx, ui_rx) = bounded::<UiEvent>(1024);
    start_backend_bridge(BridgeConfig::from(&settings), cmd_rx, ui_tx);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("ScanLens")
            .with_inner_size([420.0, 820.0])
            .with_min_inner_size([320.0, 560.0]),
        ..Default::default()
    };
    eframe::run_native(
        "ScanLens",
        options,
        Box::new(move |_cc| Ok(Box::new(ScanApp::new(cmd_tx, ui_rx, &settings)))),
    )
}
