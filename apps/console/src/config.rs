use std::{collections::HashMap, fs};

use anyhow::{Context, Result};
use client_core::transport::http_to_ws_url;
use url::Url;

const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_url: String,
    pub ws_url: String,
}

/// Layer settings: coded defaults, then `controller.toml`, then the
/// environment, then explicit CLI overrides. The websocket url defaults
/// to the api url with the scheme swapped.
pub fn load_settings(
    api_override: Option<String>,
    ws_override: Option<String>,
) -> Result<Settings> {
    let mut api_url = DEFAULT_API_URL.to_string();
    let mut ws_url: Option<String> = None;

    if let Ok(raw) = fs::read_to_string("controller.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            if let Some(v) = file_cfg.get("api_url") {
                api_url = v.clone();
            }
            if let Some(v) = file_cfg.get("ws_url") {
                ws_url = Some(v.clone());
            }
        }
    }

    if let Ok(v) = std::env::var("CONTROLLER_API_URL") {
        api_url = v;
    }
    if let Ok(v) = std::env::var("APP__API_URL") {
        api_url = v;
    }

    if let Ok(v) = std::env::var("CONTROLLER_WS_URL") {
        ws_url = Some(v);
    }
    if let Ok(v) = std::env::var("APP__WS_URL") {
        ws_url = Some(v);
    }

    if let Some(v) = api_override {
        api_url = v;
    }
    if let Some(v) = ws_override {
        ws_url = Some(v);
    }

    build_settings(api_url, ws_url)
}

fn build_settings(api_url: String, ws_url: Option<String>) -> Result<Settings> {
    Url::parse(&api_url).with_context(|| format!("invalid api url '{api_url}'"))?;
    let api_url = api_url.trim_end_matches('/').to_string();

    let ws_url = match ws_url {
        Some(ws_url) => {
            Url::parse(&ws_url).with_context(|| format!("invalid websocket url '{ws_url}'"))?;
            ws_url.trim_end_matches('/').to_string()
        }
        None => http_to_ws_url(&api_url)?,
    };

    Ok(Settings { api_url, ws_url })
}
