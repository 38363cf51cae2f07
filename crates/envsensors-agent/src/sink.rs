//! Outbound path for command replies and telemetry.
//!
//! Replies and telemetry samples travel through the same [`TelemetrySink`].
//! The sink decides how to frame and transport them; the socket server uses
//! a bounded channel drained by its connection writer.

use std::future::Future;

use envsensors_core::{Message, ResponseCode, Telemetry};
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Consumer of replies and telemetry envelopes.
///
/// Bounding back-pressure is the sink's job: a sink that never completes
/// `deliver` stalls the caller.
pub trait TelemetrySink: Clone + Send + Sync + 'static {
    /// Deliver one outbound message.
    fn deliver(&self, message: Message) -> impl Future<Output = ()> + Send;
}

impl TelemetrySink for mpsc::Sender<Message> {
    async fn deliver(&self, message: Message) {
        if self.send(message).await.is_err() {
            debug!("Sink channel closed, dropping message");
        }
    }
}

impl TelemetrySink for mpsc::UnboundedSender<Message> {
    async fn deliver(&self, message: Message) {
        if self.send(message).is_err() {
            debug!("Sink channel closed, dropping message");
        }
    }
}

/// Wraps outbound payloads in their envelopes before handing them to the sink.
#[derive(Debug, Clone)]
pub struct TelemetryRelay<S> {
    sink: S,
}

impl<S: TelemetrySink> TelemetryRelay<S> {
    /// Create a relay in front of `sink`.
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    /// Wrap a sample in a telemetry envelope and forward it.
    pub async fn process_sensor_telemetry(&self, telemetry: Telemetry) {
        trace!(device = %telemetry.name, values = ?telemetry.values, "Processing sensor data");
        self.sink.deliver(Message::Telemetry(telemetry)).await;
    }

    /// Send the reply to a handled command.
    pub async fn send_response(&self, response_code: ResponseCode) {
        debug!(response_code = %response_code, "Sending command reply");
        self.sink.deliver(Message::Response(response_code)).await;
    }
}
