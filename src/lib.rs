//! Schema-driven UDP telemetry relay for racing dashboards.
//!
//! The game streams fixed-layout binary packets over UDP. This crate decodes
//! each packet against a field table and pushes the result, as a JSON object, to
//! every connected WebSocket client.
//!
//! # Features
//!
//! - **Declarative schema**: the built-in Forza Horizon "Dash" table, or any
//!   layout loaded from YAML
//! - **Strict decoding**: short packets are rejected whole, never half-decoded
//! - **Isolated fan-out**: a slow or broken subscriber never delays the others
//! - **Clean shutdown**: every task hangs off one cancellation token
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use telemetry_relay::{Relay, RelayConfig};
//!
//! #[tokio::main]
//! async fn main() -> telemetry_relay::Result<()> {
//!     let relay = Relay::start(RelayConfig::default()).await?;
//!     println!("UDP {} -> WebSocket {}", relay.udp_addr(), relay.ws_addr());
//!
//!     tokio::signal::ctrl_c().await.ok();
//!     relay.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Decoding without the network
//!
//! ```rust
//! use telemetry_relay::decoder::decode;
//! use telemetry_relay::schema::dash_schema;
//!
//! let schema = dash_schema()?;
//! let packet = vec![0u8; schema.packet_len()];
//! let reading = decode(&packet, &schema)?;
//! assert_eq!(reading.len(), schema.len());
//! # Ok::<(), telemetry_relay::RelayError>(())
//! ```

// Core types and error handling
pub mod config;
mod error;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Decoding
pub mod decoder;
pub mod schema;

// Delivery
pub mod hub;
pub mod relay;
pub mod source;
pub mod transport;

// Core exports
pub use error::*;
pub use types::*;

// Main API exports
pub use config::RelayConfig;
pub use hub::BroadcastHub;
pub use relay::{Relay, RelayHandle};
pub use schema::TelemetrySchema;
