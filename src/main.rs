mod common;
mod config;
mod network;
mod ui;

use std::sync::Arc;

use clap::Parser;
use dotenvy::dotenv;
use eframe::egui;
use network::{ChatNetwork, ClientHandle, DataClient, GraphqlClient};
use tokio::sync::mpsc;
use ui::ChatApp;

#[derive(Parser)]
#[command(
    name = "graphql_chat",
    version,
    about = "Real-time chat client for a GraphQL backend"
)]
struct Cli {
    /// Path to JSON config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH, value_name = "FILE")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), eframe::Error> {
    dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    let app_config = config::load_config(&cli.config);

    run_client(app_config).await
}

async fn run_client(app_config: config::AppConfig) -> Result<(), eframe::Error> {
    // UI -> Network
    let (cmd_tx, cmd_rx) = mpsc::channel(100);
    // Network -> UI
    let (event_tx, event_rx) = mpsc::channel(100);

    let client: Arc<dyn DataClient> = Arc::new(GraphqlClient::new(&app_config));
    tokio::spawn(ChatNetwork::new(client, event_tx, cmd_rx).run());

    log::info!("Client started against {}", app_config.ws_endpoint);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([480.0, 640.0]),
        ..Default::default()
    };
    let handle = ClientHandle::new(cmd_tx, event_rx);

    eframe::run_native(
        &app_config.window_title,
        options,
        Box::new(move |cc| Ok(Box::new(ChatApp::new(cc, handle)))),
    )
}
