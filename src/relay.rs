//! Relay composition: schema + UDP pipeline + WebSocket endpoint.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::RelayConfig;
use crate::hub::BroadcastHub;
use crate::schema::TelemetrySchema;
use crate::source::{Pipeline, PipelineCounts, PipelineHandle, UdpPacketSource};
use crate::transport::WebSocketEndpoint;
use crate::Result;

/// Entry point for running a relay
pub struct Relay;

impl Relay {
    /// Build the configured schema, bind both listeners and start forwarding.
    ///
    /// Every error returned here is fatal: nothing is left running on failure.
    pub async fn start(config: RelayConfig) -> Result<RelayHandle> {
        config.validate()?;
        let schema = config.build_schema()?;
        Self::start_with_schema(&config, schema).await
    }

    /// Start with an explicit schema, ignoring `config.schema`.
    pub async fn start_with_schema(config: &RelayConfig, schema: TelemetrySchema) -> Result<RelayHandle> {
        config.validate()?;
        let schema = Arc::new(schema);

        let source = UdpPacketSource::bind(config.udp_bind).await?;
        let udp_addr = source.local_addr()?;
        let endpoint = WebSocketEndpoint::bind(config.ws_bind).await?;
        let ws_addr = endpoint.local_addr();

        let hub = Arc::new(BroadcastHub::new());
        let cancel = CancellationToken::new();

        let pipeline = Pipeline::spawn(source, Arc::clone(&schema), Arc::clone(&hub), cancel.child_token());
        let endpoint =
            tokio::spawn(endpoint.run(Arc::clone(&hub), config.connection_options(), cancel.child_token()));

        info!(%udp_addr, %ws_addr, fields = schema.len(), "Telemetry relay started");
        let advertised = advertised_addr(udp_addr, lan_ipv4().await);
        info!("Send telemetry data to: {}", advertised);

        Ok(RelayHandle { udp_addr, ws_addr, schema, hub, pipeline: Some(pipeline), endpoint: Some(endpoint), cancel })
    }
}

/// Address a game on the local network should send to.
///
/// A wildcard bind is replaced by `lan` (or loopback when there is none).
fn advertised_addr(bound: SocketAddr, lan: Option<IpAddr>) -> SocketAddr {
    if bound.ip().is_unspecified() {
        SocketAddr::new(lan.unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST)), bound.port())
    } else {
        bound
    }
}

/// First non-loopback IPv4 address of this host, taken from the route table.
///
/// Connecting a UDP socket only selects a source address; nothing is sent.
async fn lan_ipv4() -> Option<IpAddr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await.ok()?;
    socket.connect((Ipv4Addr::new(192, 0, 2, 1), 9)).await.ok()?;
    let ip = socket.local_addr().ok()?.ip();
    (!ip.is_loopback() && !ip.is_unspecified()).then_some(ip)
}

/// A running relay. Dropping it stops all tasks.
#[derive(Debug)]
pub struct RelayHandle {
    udp_addr: SocketAddr,
    ws_addr: SocketAddr,
    schema: Arc<TelemetrySchema>,
    hub: Arc<BroadcastHub>,
    pipeline: Option<PipelineHandle>,
    endpoint: Option<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl RelayHandle {
    /// Bound telemetry address (resolves port 0).
    pub fn udp_addr(&self) -> SocketAddr {
        self.udp_addr
    }

    /// Bound subscriber address (resolves port 0).
    pub fn ws_addr(&self) -> SocketAddr {
        self.ws_addr
    }

    pub fn schema(&self) -> &TelemetrySchema {
        &self.schema
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    pub fn stats(&self) -> PipelineCounts {
        self.pipeline.as_ref().map(PipelineHandle::stats).unwrap_or_default()
    }

    /// Token that stops the relay when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop accepting, close every subscriber and wait for the tasks to finish.
    pub async fn shutdown(mut self) {
        info!("Shutting down telemetry relay");
        self.cancel.cancel();

        if let Some(pipeline) = self.pipeline.take() {
            pipeline.join().await;
        }
        if let Some(endpoint) = self.endpoint.take() {
            if let Err(e) = endpoint.await {
                warn!(error = %e, "WebSocket endpoint task failed");
            }
        }
    }
}

impl Drop for RelayHandle {
    fn drop(&mut self) {
        debug!("Dropping relay handle");
        self.cancel.cancel();
    }
}
