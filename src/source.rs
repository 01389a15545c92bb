//! Packet sources and the decode → publish pipeline.
//!
//! A [`PacketSource`] yields raw datagrams; the [`Pipeline`] task owns it and,
//! for each datagram, decodes against the schema and publishes the reading to
//! the [`BroadcastHub`]. Packets are processed strictly one at a time, with no
//! sequencing, reassembly or deduplication. A packet that fails to decode is
//! logged and dropped; it never ends the loop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::decoder::decode;
use crate::hub::BroadcastHub;
use crate::schema::TelemetrySchema;
use crate::{RelayError, Result};

/// Largest UDP payload over IPv4, so no datagram is ever truncated.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Log every Nth dropped packet after the first.
const DROP_LOG_INTERVAL: u64 = 100;

/// One received datagram.
#[derive(Debug, Clone)]
pub struct Datagram {
    pub payload: Vec<u8>,
    pub peer: Option<SocketAddr>,
}

/// Trait for raw packet sources
///
/// Mirrors the transport: every call yields at most one complete datagram.
#[async_trait::async_trait]
pub trait PacketSource: Send + 'static {
    /// Wait for the next datagram
    ///
    /// Returns:
    /// - `Ok(Some(datagram))` - a datagram arrived
    /// - `Ok(None)` - the source is exhausted (normal termination)
    /// - `Err(e)` - a transient receive error; the caller may keep reading
    async fn next_datagram(&mut self) -> Result<Option<Datagram>>;
}

/// UDP listener for game telemetry.
#[derive(Debug)]
pub struct UdpPacketSource {
    socket: UdpSocket,
    buf: Vec<u8>,
}

impl UdpPacketSource {
    /// Bind the telemetry port. Failure is fatal for the relay.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let socket =
            UdpSocket::bind(addr).await.map_err(|e| RelayError::bind_failed("UDP", addr, e))?;
        let local = socket.local_addr().unwrap_or(addr);
        info!(%local, "Listening for telemetry datagrams");
        Ok(Self { socket, buf: vec![0u8; MAX_DATAGRAM_SIZE] })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr().map_err(|e| RelayError::io("reading UDP local address", e))
    }
}

#[async_trait::async_trait]
impl PacketSource for UdpPacketSource {
    async fn next_datagram(&mut self) -> Result<Option<Datagram>> {
        let (len, peer) = self
            .socket
            .recv_from(&mut self.buf)
            .await
            .map_err(|e| RelayError::io("receiving telemetry datagram", e))?;

        Ok(Some(Datagram { payload: self.buf[..len].to_vec(), peer: Some(peer) }))
    }
}

/// Running counters for the pipeline.
#[derive(Debug, Default)]
pub struct PipelineStats {
    received: AtomicU64,
    decoded: AtomicU64,
    dropped: AtomicU64,
    delivered: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PipelineCounts {
    /// Datagrams received
    pub received: u64,
    /// Datagrams decoded into a reading
    pub decoded: u64,
    /// Datagrams dropped as undecodable
    pub dropped: u64,
    /// Messages handed to subscribers, summed over all readings
    pub delivered: u64,
}

impl PipelineStats {
    pub fn snapshot(&self) -> PipelineCounts {
        PipelineCounts {
            received: self.received.load(Ordering::Relaxed),
            decoded: self.decoded.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
        }
    }
}

/// Handle to a spawned pipeline task.
#[derive(Debug)]
pub struct PipelineHandle {
    stats: Arc<PipelineStats>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PipelineHandle {
    pub fn stats(&self) -> PipelineCounts {
        self.stats.snapshot()
    }

    /// Ask the pipeline to stop after the current packet.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the pipeline task to finish.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            warn!(error = %e, "Pipeline task panicked or was aborted");
        }
    }
}

/// Spawns the decode → publish task
pub struct Pipeline;

impl Pipeline {
    /// Spawn the pipeline for `source`.
    ///
    /// The task stops when `cancel` fires or the source reports it is exhausted.
    pub fn spawn<S>(
        source: S,
        schema: Arc<TelemetrySchema>,
        hub: Arc<BroadcastHub>,
        cancel: CancellationToken,
    ) -> PipelineHandle
    where
        S: PacketSource,
    {
        let stats = Arc::new(PipelineStats::default());
        let task = tokio::spawn(Self::run(source, schema, hub, Arc::clone(&stats), cancel.clone()));
        PipelineHandle { stats, cancel, task }
    }

    async fn run<S>(
        mut source: S,
        schema: Arc<TelemetrySchema>,
        hub: Arc<BroadcastHub>,
        stats: Arc<PipelineStats>,
        cancel: CancellationToken,
    ) where
        S: PacketSource,
    {
        info!(fields = schema.len(), packet_len = schema.packet_len(), "Telemetry pipeline started");
        let mut error_count = 0u32;

        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Telemetry pipeline cancelled");
                    break;
                }
                result = source.next_datagram() => result,
            };

            let datagram = match result {
                Ok(Some(datagram)) => {
                    error_count = 0;
                    datagram
                }
                Ok(None) => {
                    info!("Packet source ended");
                    break;
                }
                Err(e) => {
                    // Receive errors are transient (e.g. ICMP port unreachable on Windows)
                    error_count = error_count.saturating_add(1);
                    warn!(error = %e, error_count, "Failed to receive datagram");
                    let backoff = Duration::from_millis(10 * (1 << error_count.min(5)));
                    tokio::time::sleep(backoff).await;
                    continue;
                }
            };

            stats.received.fetch_add(1, Ordering::Relaxed);

            match decode(&datagram.payload, &schema) {
                Ok(reading) => {
                    stats.decoded.fetch_add(1, Ordering::Relaxed);
                    let report = hub.publish(&reading);
                    stats.delivered.fetch_add(report.delivered as u64, Ordering::Relaxed);
                    trace!(
                        bytes = datagram.payload.len(),
                        delivered = report.delivered,
                        "Reading published"
                    );
                }
                Err(e) => {
                    let dropped = stats.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    if dropped == 1 || dropped % DROP_LOG_INTERVAL == 0 {
                        warn!(error = %e, peer = ?datagram.peer, dropped, "Dropping undecodable packet");
                    } else {
                        debug!(error = %e, peer = ?datagram.peer, "Dropping undecodable packet");
                    }
                }
            }
        }

        let counts = stats.snapshot();
        info!(
            received = counts.received,
            decoded = counts.decoded,
            dropped = counts.dropped,
            "Telemetry pipeline stopped"
        );
    }
}
