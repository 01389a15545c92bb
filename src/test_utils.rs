//! Test utilities for composing telemetry packets
//!
//! Shared by unit tests and benches so packets are always laid out the same way
//! the game writes them: little-endian, fixed offsets, zero padding elsewhere.

#![cfg(any(test, feature = "benchmark"))]

use std::sync::Arc;

use crate::hub::{DeliveryError, OutboundMessage, SubscriberSink};

/// Builder for fixed-size little-endian packets.
#[derive(Debug, Clone)]
pub struct PacketBuilder {
    data: Vec<u8>,
}

impl PacketBuilder {
    /// Start from `len` zero bytes.
    pub fn new(len: usize) -> Self {
        Self { data: vec![0u8; len] }
    }

    fn put(mut self, offset: usize, bytes: &[u8]) -> Self {
        let end = offset + bytes.len();
        if self.data.len() < end {
            self.data.resize(end, 0);
        }
        self.data[offset..end].copy_from_slice(bytes);
        self
    }

    pub fn f32(self, offset: usize, value: f32) -> Self {
        self.put(offset, &value.to_le_bytes())
    }

    pub fn u8(self, offset: usize, value: u8) -> Self {
        self.put(offset, &[value])
    }

    pub fn i8(self, offset: usize, value: i8) -> Self {
        self.put(offset, &value.to_le_bytes())
    }

    pub fn u16(self, offset: usize, value: u16) -> Self {
        self.put(offset, &value.to_le_bytes())
    }

    pub fn u32(self, offset: usize, value: u32) -> Self {
        self.put(offset, &value.to_le_bytes())
    }

    pub fn build(self) -> Vec<u8> {
        self.data
    }
}

/// In-memory sink recording every delivered message.
///
/// `fail_with` makes every delivery attempt fail, simulating a broken or
/// saturated subscriber.
#[derive(Debug, Default)]
pub struct RecordingSink {
    received: std::sync::Mutex<Vec<OutboundMessage>>,
    fail_with: Option<DeliveryError>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing(error: DeliveryError) -> Arc<Self> {
        Arc::new(Self { received: Default::default(), fail_with: Some(error) })
    }

    /// Messages delivered so far, as text.
    pub fn messages(&self) -> Vec<String> {
        self.received
            .lock()
            .map(|received| received.iter().map(|m| m.as_str().to_string()).collect())
            .unwrap_or_default()
    }
}

impl SubscriberSink for RecordingSink {
    fn try_deliver(&self, message: &OutboundMessage) -> Result<(), DeliveryError> {
        if let Some(error) = self.fail_with {
            return Err(error);
        }
        if let Ok(mut received) = self.received.lock() {
            received.push(message.clone());
        }
        Ok(())
    }
}
