//! Library root for `herald-bot`.
//!
//! Herald-bot is a small Discord bot designed to:
//! - Roll dice on `!roll NdS[+/-K]`
//! - Acknowledge `!ping`
//! - Keep a per-guild log of voice channel activity for users who opt in
//!
//! Gateway events are resolved through a TTL-cached entity resolver and fanned
//! out to independent listeners. The architecture is built around narrow
//! traits so that the platform can be swapped out (or mocked) underneath.

pub mod base;
pub mod behaviour;
pub mod interaction;
pub mod runtime;
pub mod service;

use base::{config::Config, types::Void};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Public async entry for the binary crate.
///
/// Sets up the runtime and runs it until `shutdown` fires:
/// - Creates the runtime context with the Discord platform client
/// - Registers the stock behaviours
/// - Starts the main event loop
pub async fn start(config: Config, shutdown: CancellationToken) -> Void {
    info!("Starting herald-bot ...");

    // Initialize the runtime.
    let runtime = runtime::Runtime::new(config);
    runtime.register_default_listeners()?;

    // Start the runtime.
    runtime.start(shutdown).await?;

    info!("Herald-bot stopped.");

    Ok(())
}
