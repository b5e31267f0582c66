//! # picolinkd: picolink daemon
//!
//! Composition root that wires the controller to the virtual home.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars)
//! - Initialize logging
//! - Build the devices and the virtual home they control
//! - Feed stdin events through the in-process bus into the controller
//! - Shut down on end of input or Ctrl-C, then print the applied calls
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no domain logic belongs here.

use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use picolink_adapter_virtual::VirtualHome;
use picolink_app::controller::PicoController;
use picolink_app::event_bus::InProcessEventBus;
use picolinkd::config::Config;
use picolinkd::input;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Configuration
    let config = Config::load().context("loading configuration")?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .with_writer(std::io::stderr)
        .init();
    let runtime = config.into_runtime()?;

    // Virtual home
    let home = Arc::new(VirtualHome::from_devices(&runtime.devices));
    if let Some(spec) = &runtime.globals.middle_button {
        home.register_targets(spec);
    }

    // Controller
    let controller = PicoController::start(
        runtime.devices,
        runtime.globals,
        Arc::clone(&home),
        Arc::clone(&home),
    );

    // Input
    let event_bus = InProcessEventBus::new(256);
    let events = event_bus.subscribe();
    let reader = tokio::spawn(async move {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        input::pump(stdin, &event_bus).await
    });

    tokio::select! {
        () = controller.run(events) => tracing::info!("input exhausted"),
        result = tokio::signal::ctrl_c() => {
            result.context("listening for ctrl-c")?;
            tracing::info!("interrupted");
        }
    }
    controller.flush().await;
    controller.shutdown().await;

    if reader.is_finished() {
        let stats = reader.await??;
        tracing::info!(published = stats.published, skipped = stats.skipped, "input closed");
    } else {
        reader.abort();
    }

    let history = home.history();
    let mut stdout = std::io::stdout().lock();
    for call in &history {
        writeln!(stdout, "{}", serde_json::to_string(call)?)?;
    }
    tracing::info!(calls = history.len(), "picolinkd stopped");
    Ok(())
}
