//! settings-sync demo binary.
//!
//! Wires two foreground contexts and a background hub over an in-process
//! channel, then walks through a local save, a malformed remote message and
//! a reset, logging what each side observes.
//!
//! # Environment Variables
//!
//! - `SETTINGS_SYNC_CONFIG`: full store config as JSON (overrides the two below)
//! - `SETTINGS_SYNC_STRICT`: `1`/`true` to validate local saves
//! - `SETTINGS_SYNC_WIRE`: `raw` (default) or `enveloped`
//! - `RUST_LOG`: log filter (default: "info,settings_sync=debug")
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin sync-demo
//! SETTINGS_SYNC_WIRE=enveloped cargo run --bin sync-demo
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde_json::{json, Value};

use settings_sync::schema::settings::BUGZILLA_API_KEY;
use settings_sync::store::{OutboundPump, StoreConfig, StoreRegistry, WireFormat};
use settings_sync::toast::{NewToast, ToastLog, ToastStyle};
use settings_sync::{Channel, MemoryChannel, SettingsValue};

fn load_config() -> anyhow::Result<StoreConfig> {
    if let Ok(text) = std::env::var("SETTINGS_SYNC_CONFIG") {
        return StoreConfig::from_json(&text).context("SETTINGS_SYNC_CONFIG");
    }

    let mut config = StoreConfig::default();
    if matches!(
        std::env::var("SETTINGS_SYNC_STRICT").as_deref(),
        Ok("1") | Ok("true")
    ) {
        config = config.strict();
    }
    match std::env::var("SETTINGS_SYNC_WIRE").as_deref() {
        Ok("enveloped") => config = config.wire_format(WireFormat::Enveloped),
        Ok("raw") | Err(_) => {}
        Ok(other) => anyhow::bail!("unknown SETTINGS_SYNC_WIRE value: {other}"),
    }
    Ok(config)
}

/// Give the pumps a chance to run.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info,settings_sync=debug"),
    )
    .init();

    let config = load_config()?;
    log::info!(
        "store {} (local validation: {:?}, wire: {:?})",
        config.key,
        config.local_validation,
        config.wire_format
    );

    let hub = Arc::new(MemoryChannel::new());
    hub.listen(
        &config.key,
        Arc::new(|value: Value| log::info!("[background] received {value}")),
    );

    let tab_a = StoreRegistry::new(hub.client());
    let tab_b = StoreRegistry::new(hub.client());
    let store_a = tab_a.get_or_create(config.clone());
    let store_b = tab_b.get_or_create(config.clone());
    store_b.subscribe(|v: &SettingsValue| log::info!("[tab b] settings now {:?}", v));

    let _pumps = [
        OutboundPump::spawn(store_a.clone()),
        OutboundPump::spawn(store_b.clone()),
    ];
    let mut toasts = ToastLog::new();

    store_a
        .save(SettingsValue::empty().with(BUGZILLA_API_KEY, "0123456789abcdef0123456789abcdef"))
        .context("saving settings in tab a")?;
    settle().await;
    toasts.add(NewToast::new("Settings saved").css(ToastStyle::Success).timeout_ms(5_000));

    hub.put(&config.key, json!({ BUGZILLA_API_KEY: 123 }))
        .context("publishing malformed value")?;
    settle().await;
    log::info!("[tab b] after malformed message: {:?}", store_b.current());

    store_b.reset();
    settle().await;
    toasts.add(NewToast::new("Settings cleared").css(ToastStyle::Info));

    log::info!("[tab a] final settings {:?}", store_a.current());
    log::info!(
        "hub saw {} value(s) under {}",
        hub.put_count(&config.key),
        config.key
    );
    for toast in toasts.toasts() {
        log::info!("toast #{}: {}", toast.id, toast.toast.body);
    }
    Ok(())
}
