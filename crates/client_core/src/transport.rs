use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::StreamExt;
use rand::Rng;
use reqwest::Client;
use shared::{
    domain::{CalibrationState, DotBot, RgbLed, RobotAddress},
    protocol::{ActiveAddress, CalibrationStatus, RgbLedUpdate, StatusUpdate, STATUS_STREAM_PATH},
};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{info, warn};

use crate::{ClientEvent, ControllerApi, ControllerClient};

const RECONNECT_BASE_DELAY_MS: u64 = 250;
const RECONNECT_MAX_DELAY_MS: u64 = 10_000;

pub struct HttpControllerApi {
    http: Client,
    api_url: String,
}

impl HttpControllerApi {
    pub fn new(api_url: impl Into<String>) -> Self {
        let api_url: String = api_url.into();
        let api_url = api_url.trim_end_matches('/').to_string();
        Self {
            http: Client::new(),
            api_url,
        }
    }
}

#[async_trait]
impl ControllerApi for HttpControllerApi {
    async fn fetch_dotbots(&self) -> Result<Vec<DotBot>> {
        let robots = self
            .http
            .get(format!("{}/controller/dotbots", self.api_url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(robots)
    }

    async fn fetch_active_address(&self) -> Result<RobotAddress> {
        let body: ActiveAddress = self
            .http
            .get(format!("{}/controller/dotbot_address", self.api_url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(body.address)
    }

    async fn set_active_address(&self, address: &RobotAddress) -> Result<()> {
        self.http
            .put(format!("{}/controller/dotbot_address", self.api_url))
            .json(&ActiveAddress {
                address: address.clone(),
            })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn set_rgb_led(&self, address: &RobotAddress, color: RgbLed) -> Result<()> {
        self.http
            .put(format!(
                "{}/controller/dotbots/{address}/rgb_led",
                self.api_url
            ))
            .json(&RgbLedUpdate {
                red: color.red,
                green: color.green,
                blue: color.blue,
            })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn fetch_calibration_state(&self) -> Result<CalibrationState> {
        let body: CalibrationStatus = self
            .http
            .get(format!("{}/controller/lh2/calibration", self.api_url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(body.state)
    }

    async fn add_calibration_point(&self, index: usize) -> Result<()> {
        self.http
            .post(format!(
                "{}/controller/lh2/calibration/{index}",
                self.api_url
            ))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn apply_calibration(&self) -> Result<()> {
        self.http
            .put(format!("{}/controller/lh2/calibration", self.api_url))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

pub fn http_to_ws_url(server_url: &str) -> Result<String> {
    if server_url.starts_with("https://") {
        Ok(server_url.replacen("https://", "wss://", 1))
    } else if server_url.starts_with("http://") {
        Ok(server_url.replacen("http://", "ws://", 1))
    } else {
        Err(anyhow!("server url must start with http:// or https://"))
    }
}

fn reconnect_delay_ms(attempt: u32) -> u64 {
    let multiplier = 2_u64.saturating_pow(attempt.min(6));
    let delay = RECONNECT_BASE_DELAY_MS
        .saturating_mul(multiplier)
        .min(RECONNECT_MAX_DELAY_MS);
    delay + rand::thread_rng().gen_range(0..RECONNECT_BASE_DELAY_MS)
}

/// One task owns the push subscription for the life of the client.
/// Every (re)open runs a full `refresh`, since state may have diverged
/// while disconnected; drops reconnect with bounded backoff plus jitter.
pub fn spawn_status_stream(
    client: &Arc<ControllerClient>,
    ws_base_url: impl Into<String>,
) -> JoinHandle<()> {
    let client = Arc::clone(client);
    let ws_base_url: String = ws_base_url.into();
    let stream_url = format!("{}{STATUS_STREAM_PATH}", ws_base_url.trim_end_matches('/'));
    tokio::spawn(async move {
        let mut attempt: u32 = 0;
        loop {
            match connect_async(&stream_url).await {
                Ok((stream, _)) => {
                    attempt = 0;
                    info!("status stream connected: {stream_url}");
                    client.emit(ClientEvent::StreamConnected);
                    if let Err(err) = client.refresh().await {
                        warn!("refresh after stream open failed: {err}");
                        client.emit(ClientEvent::Error(err.to_string()));
                    }
                    let (_, mut reader) = stream.split();
                    while let Some(frame) = reader.next().await {
                        match frame {
                            Ok(Message::Text(text)) => {
                                match serde_json::from_str::<StatusUpdate>(&text) {
                                    Ok(update) => client.handle_status_update(update).await,
                                    Err(err) => warn!("dropping malformed status frame: {err}"),
                                }
                            }
                            Ok(Message::Close(_)) => break,
                            Ok(_) => {}
                            Err(err) => {
                                warn!("status stream receive failed: {err}");
                                break;
                            }
                        }
                    }
                    client.emit(ClientEvent::StreamClosed);
                    info!("status stream closed: {stream_url}");
                }
                Err(err) => warn!("status stream connect failed: {err}"),
            }
            attempt = attempt.saturating_add(1);
            tokio::time::sleep(Duration::from_millis(reconnect_delay_ms(attempt))).await;
        }
    })
}
