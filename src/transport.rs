//! WebSocket subscriber endpoint.
//!
//! Every accepted TCP connection gets its own task. The task performs the
//! WebSocket handshake, registers a [`ChannelSink`] with the hub and then
//! services the connection in a single `select!` loop: queued readings go out as
//! text frames, inbound frames are only inspected for close or error. Whatever
//! ends the loop, the subscriber is deregistered before the task exits.

use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::hub::{BroadcastHub, ChannelSink, OutboundMessage, SubscriberConnection, SubscriberId};
use crate::{RelayError, Result};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Per-connection limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Readings buffered for one subscriber before new ones are dropped (default: 16)
    pub queue_capacity: usize,
    /// Longest a single frame write may take before the subscriber is closed (default: 1s)
    pub send_timeout: Duration,
    /// Longest the opening handshake may take (default: 5s)
    pub handshake_timeout: Duration,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            queue_capacity: 16,
            send_timeout: Duration::from_secs(1),
            handshake_timeout: Duration::from_secs(5),
        }
    }
}

/// Listening WebSocket endpoint.
#[derive(Debug)]
pub struct WebSocketEndpoint {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl WebSocketEndpoint {
    /// Bind the subscriber port. Failure is fatal for the relay.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener =
            TcpListener::bind(addr).await.map_err(|e| RelayError::bind_failed("WebSocket", addr, e))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| RelayError::io("reading WebSocket local address", e))?;
        info!(local = %local_addr, "Listening for WebSocket subscribers");
        Ok(Self { listener, local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept subscribers until `cancel` fires.
    ///
    /// Connection tasks receive a child token and wind down with the endpoint.
    pub async fn run(self, hub: Arc<BroadcastHub>, options: ConnectionOptions, cancel: CancellationToken) {
        loop {
            let (stream, peer) = tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(error = %e, "Failed to accept connection");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                        continue;
                    }
                },
            };

            if let Err(e) = stream.set_nodelay(true) {
                trace!(%peer, error = %e, "Could not disable Nagle");
            }

            let hub = Arc::clone(&hub);
            let cancel = cancel.child_token();
            tokio::spawn(async move {
                if let Err(e) = serve_connection(stream, peer, hub, options, cancel).await {
                    debug!(%peer, error = %e, "Subscriber connection ended with error");
                }
            });
        }

        info!(local = %self.local_addr, "WebSocket endpoint stopped");
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    hub: Arc<BroadcastHub>,
    options: ConnectionOptions,
    cancel: CancellationToken,
) -> Result<()> {
    let mut ws = match tokio::time::timeout(options.handshake_timeout, accept_async(stream)).await {
        Ok(Ok(ws)) => ws,
        Ok(Err(e)) => {
            return Err(RelayError::transport_with_source(format!("handshake with {peer}"), Box::new(e)));
        }
        Err(_) => return Err(RelayError::Timeout { duration: options.handshake_timeout }),
    };

    let id = hub.next_subscriber_id();
    let (sink, outbound) = ChannelSink::channel(options.queue_capacity);
    hub.register(SubscriberConnection::new(id, Arc::new(sink)));
    info!(subscriber = %id, %peer, "WebSocket subscriber connected");

    let result = pump(&mut ws, outbound, id, options.send_timeout, &cancel).await;

    hub.deregister(id);
    info!(subscriber = %id, %peer, "WebSocket subscriber disconnected");
    result
}

/// Service one open connection until it closes, fails or is cancelled.
async fn pump(
    ws: &mut WebSocketStream<TcpStream>,
    mut outbound: mpsc::Receiver<OutboundMessage>,
    id: SubscriberId,
    send_timeout: Duration,
    cancel: &CancellationToken,
) -> Result<()> {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                if let Err(e) = ws.close(None).await {
                    trace!(subscriber = %id, error = %e, "Close on shutdown failed");
                }
                return Ok(());
            }

            message = outbound.recv() => {
                // None: the hub dropped this subscriber
                let Some(message) = message else { return Ok(()) };
                let frame = Message::text(message.as_str().to_owned());
                match tokio::time::timeout(send_timeout, ws.send(frame)).await {
                    Ok(Ok(())) => trace!(subscriber = %id, "Frame sent"),
                    Ok(Err(e)) => return Err(e.into()),
                    Err(_) => {
                        warn!(subscriber = %id, timeout = ?send_timeout, "Subscriber too slow, closing");
                        return Err(RelayError::Timeout { duration: send_timeout });
                    }
                }
            }

            incoming = ws.next() => match incoming {
                Some(Ok(Message::Close(frame))) => {
                    debug!(subscriber = %id, ?frame, "Client closed connection");
                    return Ok(());
                }
                Some(Ok(_)) => trace!(subscriber = %id, "Ignoring inbound frame"),
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Reading, Value};
    use tokio_tungstenite::connect_async;

    fn speed_reading(speed: f32) -> Reading {
        [(Arc::<str>::from("Speed"), Value::Float32(speed))].into_iter().collect()
    }

    async fn wait_for_subscribers(hub: &BroadcastHub, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while hub.subscriber_count() != count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("subscriber count should settle");
    }

    async fn start_endpoint() -> (SocketAddr, Arc<BroadcastHub>, CancellationToken) {
        let endpoint = WebSocketEndpoint::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = endpoint.local_addr();
        let hub = Arc::new(BroadcastHub::new());
        let cancel = CancellationToken::new();
        tokio::spawn(endpoint.run(Arc::clone(&hub), ConnectionOptions::default(), cancel.clone()));
        (addr, hub, cancel)
    }

    #[tokio::test]
    async fn subscriber_receives_published_readings() {
        let (addr, hub, cancel) = start_endpoint().await;
        let (mut client, _) = connect_async(format!("ws://{addr}")).await.unwrap();
        wait_for_subscribers(&hub, 1).await;

        hub.publish(&speed_reading(27.5));

        let message = tokio::time::timeout(Duration::from_secs(2), client.next())
            .await
            .expect("reading should arrive")
            .unwrap()
            .unwrap();
        assert_eq!(message.to_text().unwrap(), r#"{"Speed":27.5}"#);
        cancel.cancel();
    }

    #[tokio::test]
    async fn closing_client_is_deregistered() {
        let (addr, hub, cancel) = start_endpoint().await;
        let (mut client, _) = connect_async(format!("ws://{addr}")).await.unwrap();
        wait_for_subscribers(&hub, 1).await;

        client.close(None).await.unwrap();
        wait_for_subscribers(&hub, 0).await;

        // Nobody left to deliver to
        assert_eq!(hub.publish(&speed_reading(1.0)).recipients, 0);
        cancel.cancel();
    }

    #[tokio::test]
    async fn stalled_handshake_never_registers() {
        let endpoint = WebSocketEndpoint::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = endpoint.local_addr();
        let hub = Arc::new(BroadcastHub::new());
        let cancel = CancellationToken::new();
        let options =
            ConnectionOptions { handshake_timeout: Duration::from_millis(50), ..Default::default() };
        tokio::spawn(endpoint.run(Arc::clone(&hub), options, cancel.clone()));

        // Raw TCP, no upgrade request
        let _idle = TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(hub.subscriber_count(), 0);

        // The endpoint keeps accepting after the timeout
        let (_client, _) = connect_async(format!("ws://{addr}")).await.unwrap();
        wait_for_subscribers(&hub, 1).await;
        cancel.cancel();
    }

    #[tokio::test]
    async fn stalled_subscriber_is_closed_after_send_timeout() {
        let _ = tracing_subscriber::fmt::try_init();
        let endpoint = WebSocketEndpoint::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = endpoint.local_addr();
        let hub = Arc::new(BroadcastHub::new());
        let cancel = CancellationToken::new();
        let options = ConnectionOptions { send_timeout: Duration::from_millis(200), ..Default::default() };
        tokio::spawn(endpoint.run(Arc::clone(&hub), options, cancel.clone()));

        // Upgrades, then never reads
        let (_stalled, _) = connect_async(format!("ws://{addr}")).await.unwrap();
        wait_for_subscribers(&hub, 1).await;

        let (mut reader, _) = connect_async(format!("ws://{addr}")).await.unwrap();
        wait_for_subscribers(&hub, 2).await;
        let (small_tx, mut small_rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(Ok(message)) = reader.next().await {
                if let Ok(text) = message.to_text() {
                    if text.len() < 64 {
                        let _ = small_tx.send(text.to_owned());
                    }
                }
            }
        });

        let bulk = OutboundMessage::from(format!("\"{}\"", "x".repeat(256 * 1024)));
        tokio::time::timeout(Duration::from_secs(20), async {
            while hub.subscriber_count() > 1 {
                hub.broadcast(&bulk);
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("stalled subscriber should be dropped");

        // The remaining subscriber is the one still reading
        let marker = OutboundMessage::from(r#"{"Speed":1.0}"#.to_string());
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                hub.broadcast(&marker);
                if let Ok(Some(text)) = tokio::time::timeout(Duration::from_millis(100), small_rx.recv()).await {
                    assert_eq!(text, marker.as_str());
                    break;
                }
            }
        })
        .await
        .expect("reading subscriber should keep receiving");

        assert_eq!(hub.subscriber_count(), 1);
        cancel.cancel();
    }

    #[tokio::test]
    async fn websocket_bind_conflict_is_fatal() {
        let first = WebSocketEndpoint::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let err = WebSocketEndpoint::bind(first.local_addr()).await.unwrap_err();
        assert!(matches!(err, RelayError::Bind { role: "WebSocket", .. }));
    }
}
