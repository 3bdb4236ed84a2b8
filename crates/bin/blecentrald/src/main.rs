//! # blecentrald: BLE central daemon
//!
//! Composition root that wires all adapters together and serves the host.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars)
//! - Initialize tracing on stderr (stdout carries host frames)
//! - Open the btleplug platform on the configured adapter
//! - Construct the connection manager, GATT executor and request dispatcher
//! - Serve host frames on stdin/stdout until end of stream or Ctrl-C
//! - Disconnect every device before exiting
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no domain logic belongs here.

mod config;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use blecentral_adapter_btleplug::BtleplugPlatform;
use blecentral_adapter_wire::{FrameCodec, RequestDispatcher, bridge};
use blecentral_app::event_bus::InProcessEventBus;
use blecentral_app::services::connection_manager::ConnectionManager;
use blecentral_app::services::gatt_executor::GattExecutor;

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .with_writer(std::io::stderr)
        .init();

    // Platform
    let platform = BtleplugPlatform::new(&config.bluetooth.adapter).await?;

    // Event bus
    let event_bus = InProcessEventBus::new(config.events.capacity);

    // Services
    let manager = ConnectionManager::new(platform, event_bus.clone());
    let executor = GattExecutor::new(manager.clone(), config.bluetooth.notify_policy);

    // Host bridge
    let (outbound, events) = mpsc::channel(config.events.capacity);
    let codec = FrameCodec::new(config.bridge.max_frame_len);
    let dispatcher = Arc::new(
        RequestDispatcher::new(executor, event_bus, outbound)
            .with_payload_limit(codec.payload_limit()),
    );

    tracing::info!(
        notify_policy = ?config.bluetooth.notify_policy,
        max_frame_len = config.bridge.max_frame_len,
        "blecentrald serving on stdio"
    );

    let served = tokio::select! {
        result = bridge::serve(
            Arc::clone(&dispatcher),
            events,
            tokio::io::stdin(),
            tokio::io::stdout(),
            codec,
        ) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted");
            Ok(())
        }
    };

    dispatcher.detach();
    manager.disconnect_all().await;
    tracing::info!("blecentrald stopped");

    served?;
    Ok(())
}
