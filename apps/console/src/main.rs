use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use client_core::{spawn_status_stream, ClientEvent, ControllerClient, HttpControllerApi};
use shared::domain::RobotAddress;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

mod config;

use config::load_settings;

#[derive(Parser, Debug)]
struct Args {
    /// Override the backend api url from controller.toml / environment.
    #[arg(long)]
    api_url: Option<String>,
    /// Override the push-stream url (defaults to the api url with a
    /// websocket scheme).
    #[arg(long)]
    ws_url: Option<String>,
    /// Toggle manual control of this robot once connected.
    #[arg(long)]
    activate: Option<RobotAddress>,
    /// Apply this color to the activated robot, e.g. --color 0,255,64
    #[arg(long, value_delimiter = ',', num_args = 3, value_names = ["R", "G", "B"])]
    color: Option<Vec<u8>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();
    let settings = load_settings(args.api_url.clone(), args.ws_url.clone())?;

    info!("connecting to controller at {}", settings.api_url);
    let api = Arc::new(HttpControllerApi::new(settings.api_url.clone()));
    let client = ControllerClient::new(api);
    let mut events = client.subscribe_events();

    client.refresh_calibration().await;
    let stream = spawn_status_stream(&client, settings.ws_url.clone());

    if let Some(address) = args.activate {
        if let Err(err) = client.toggle_active(address).await {
            warn!("activation failed: {err}");
        } else if let Some(rgb) = args.color {
            client
                .preview_color(shared::domain::RgbLed::new(rgb[0], rgb[1], rgb[2]))
                .await;
            if let Err(err) = client.apply_color().await {
                warn!("color apply failed: {err}");
            }
        }
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(event) => render_event(&client, event).await,
                Err(RecvError::Lagged(skipped)) => warn!("dropped {skipped} events"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    stream.abort();
    Ok(())
}

async fn render_event(client: &Arc<ControllerClient>, event: ClientEvent) {
    match event {
        ClientEvent::RegistryReplaced => print_robots(client).await,
        ClientEvent::ActiveChanged(address) => {
            if address.is_inactive() {
                println!("no robot active");
            } else {
                println!("active robot: {address}");
            }
        }
        ClientEvent::PositionUpdated { address, position } => {
            println!("{address}  x={:.3} y={:.3}", position.x, position.y);
        }
        ClientEvent::PendingColorChanged(color) => {
            println!(
                "pending color: ({}, {}, {})",
                color.red, color.green, color.blue
            );
        }
        ClientEvent::CalibrationChanged(state) => println!("calibration: {state:?}"),
        ClientEvent::StreamConnected => println!("status stream connected"),
        ClientEvent::StreamClosed => println!("status stream closed, reconnecting"),
        ClientEvent::Error(message) => warn!("{message}"),
    }
}

async fn print_robots(client: &Arc<ControllerClient>) {
    let active = client.active_address().await;
    let robots = client.robots().await;
    println!("available dotbots ({}):", robots.len());
    for robot in robots {
        let marker = if robot.address == active { "*" } else { " " };
        let led = robot
            .rgb_led
            .map(|c| format!("({}, {}, {})", c.red, c.green, c.blue))
            .unwrap_or_else(|| "-".to_string());
        let position = robot
            .lh2_position
            .map(|p| format!("x={:.3} y={:.3}", p.x, p.y))
            .unwrap_or_else(|| "-".to_string());
        println!("{marker} {}  led={led}  {position}", robot.address);
    }
}
