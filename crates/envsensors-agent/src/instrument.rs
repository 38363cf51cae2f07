//! Supervisor for one sensor reader.
//!
//! An [`EssInstrument`] owns a reader and, while running, a spawned polling
//! task that reads samples and forwards them through a [`TelemetryRelay`].
//! The task takes ownership of the reader and hands it back when it ends, so
//! the reader is always stopped by [`EssInstrument::stop`], including after a
//! read failure ended the loop early.
//!
//! ```text
//!  IDLE ──start──▶ RUNNING ──stop──▶ IDLE
//! ```

use std::fmt;
use std::panic::AssertUnwindSafe;

use envsensors_hardware::{HardwareError, SensorReader};
use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::sink::{TelemetryRelay, TelemetrySink};

/// Lifecycle state of an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentState {
    /// No polling task.
    Idle,
    /// Polling task spawned and not yet stopped.
    Running,
}

impl fmt::Display for InstrumentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Running => write!(f, "RUNNING"),
        }
    }
}

/// What the polling task returns when it ends.
struct PollOutcome<R> {
    reader: R,
    result: Result<(), HardwareError>,
    samples: u64,
}

struct PollTask<R> {
    cancel: CancellationToken,
    handle: JoinHandle<PollOutcome<R>>,
}

/// Runs a reader in a cancellable polling loop.
///
/// Await [`stop`](Self::stop) before dropping a running instrument. Dropping
/// it only cancels the polling loop; the reader is dropped with the task
/// without being stopped.
pub struct EssInstrument<R, S> {
    name: String,
    reader: Option<R>,
    poll_task: Option<PollTask<R>>,
    relay: TelemetryRelay<S>,
}

impl<R, S> EssInstrument<R, S>
where
    R: SensorReader + 'static,
    S: TelemetrySink,
{
    /// Create an idle instrument.
    pub fn new(name: impl Into<String>, reader: R, relay: TelemetryRelay<S>) -> Self {
        let name = name.into();
        debug!(instrument = %name, reader = %reader.name(), "Created instrument");

        Self {
            name,
            reader: Some(reader),
            poll_task: None,
            relay,
        }
    }

    /// Instrument name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> InstrumentState {
        if self.poll_task.is_some() {
            InstrumentState::Running
        } else {
            InstrumentState::Idle
        }
    }

    /// Check whether the instrument is running.
    pub fn is_running(&self) -> bool {
        self.state() == InstrumentState::Running
    }

    /// Check whether the polling task is still looping.
    ///
    /// Goes false when a read failure ended the loop, even though the
    /// instrument stays `Running` until stopped.
    pub fn is_polling(&self) -> bool {
        self.poll_task
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Start the reader and spawn the polling loop.
    ///
    /// Starting a running instrument is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the reader's error if it fails to start. The instrument then
    /// stays idle.
    pub async fn start(&mut self) -> Result<(), HardwareError> {
        if self.poll_task.is_some() {
            debug!(instrument = %self.name, "Instrument already running");
            return Ok(());
        }

        let mut reader = self.reader.take().ok_or_else(|| {
            HardwareError::other(format!("Reader of {} is no longer available", self.name))
        })?;

        info!(instrument = %self.name, "Starting instrument");
        if let Err(e) = reader.start().await {
            self.reader = Some(reader);
            return Err(e);
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(poll_loop(
            self.name.clone(),
            reader,
            self.relay.clone(),
            cancel.clone(),
        ));
        self.poll_task = Some(PollTask { cancel, handle });

        Ok(())
    }

    /// Cancel the polling loop, wait for it and stop the reader.
    ///
    /// Stopping an idle instrument is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the reader's error if it fails to stop, or an error if the
    /// polling task panicked.
    pub async fn stop(&mut self) -> Result<(), HardwareError> {
        let Some(task) = self.poll_task.take() else {
            debug!(instrument = %self.name, "Instrument not running");
            return Ok(());
        };

        info!(instrument = %self.name, "Stopping instrument");
        task.cancel.cancel();

        let outcome = match task.handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(
                    instrument = %self.name,
                    error = %e,
                    "Polling task failed, reader lost and left unstopped"
                );
                return Err(HardwareError::other(format!(
                    "Polling task of {} failed: {e}",
                    self.name
                )));
            }
        };

        if let Err(e) = &outcome.result {
            warn!(
                instrument = %self.name,
                error = %e,
                samples = outcome.samples,
                "Polling loop had ended with a read error"
            );
        }

        let mut reader = outcome.reader;
        let result = reader.stop().await;
        self.reader = Some(reader);

        debug!(instrument = %self.name, samples = outcome.samples, "Instrument stopped");
        result
    }
}

/// Cancels a running polling loop. The reader is not stopped.
impl<R, S> Drop for EssInstrument<R, S> {
    fn drop(&mut self) {
        if let Some(task) = &self.poll_task {
            task.cancel.cancel();
        }
    }
}

impl<R, S> fmt::Debug for EssInstrument<R, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EssInstrument")
            .field("name", &self.name)
            .field("running", &self.poll_task.is_some())
            .finish()
    }
}

async fn poll_loop<R, S>(
    name: String,
    mut reader: R,
    relay: TelemetryRelay<S>,
    cancel: CancellationToken,
) -> PollOutcome<R>
where
    R: SensorReader,
    S: TelemetrySink,
{
    let mut samples = 0u64;

    let result = loop {
        trace!(instrument = %name, "Reading data");

        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            read = AssertUnwindSafe(reader.read()).catch_unwind() => Some(read.unwrap_or_else(|_| {
                Err(HardwareError::other("Reader panicked during read"))
            })),
        };

        match read {
            None => break Ok(()),
            Some(Err(e)) => {
                error!(instrument = %name, error = %e, "Read failed, polling loop ends");
                break Err(e);
            }
            Some(Ok(())) => {}
        }

        let Some(telemetry) = reader.output().cloned() else {
            continue;
        };

        let delivered = tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = relay.process_sensor_telemetry(telemetry) => true,
        };
        if !delivered {
            break Ok(());
        }
        samples += 1;
    };

    debug!(instrument = %name, samples, "Polling loop finished");
    PollOutcome {
        reader,
        result,
        samples,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use envsensors_core::{Message, Telemetry};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct Counters {
        starts: AtomicUsize,
        reads: AtomicUsize,
        stops: AtomicUsize,
    }

    /// Reader producing one value per read, failing after `fail_after` reads.
    struct FakeReader {
        counters: Arc<Counters>,
        fail_start: bool,
        fail_after: Option<usize>,
        panic_on_read: bool,
        interval: Duration,
        output: Option<Telemetry>,
    }

    impl FakeReader {
        fn new(counters: Arc<Counters>) -> Self {
            Self {
                counters,
                fail_start: false,
                fail_after: None,
                panic_on_read: false,
                interval: Duration::from_millis(100),
                output: None,
            }
        }
    }

    impl SensorReader for FakeReader {
        fn name(&self) -> &str {
            "fake"
        }

        async fn start(&mut self) -> envsensors_hardware::Result<()> {
            self.counters.starts.fetch_add(1, Ordering::SeqCst);
            if self.fail_start {
                return Err(HardwareError::not_found("fake"));
            }
            Ok(())
        }

        async fn read(&mut self) -> envsensors_hardware::Result<()> {
            tokio::time::sleep(self.interval).await;
            let count = self.counters.reads.fetch_add(1, Ordering::SeqCst);
            if self.panic_on_read {
                panic!("reader fault");
            }
            if self.fail_after.is_some_and(|limit| count >= limit) {
                return Err(HardwareError::communication("line dropped"));
            }
            self.output = Some(Telemetry::new("fake", vec![Some(count as f64)]));
            Ok(())
        }

        fn output(&self) -> Option<&Telemetry> {
            self.output.as_ref()
        }

        async fn stop(&mut self) -> envsensors_hardware::Result<()> {
            self.counters.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn instrument(
        reader: FakeReader,
    ) -> (
        EssInstrument<FakeReader, mpsc::UnboundedSender<Message>>,
        mpsc::UnboundedReceiver<Message>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (EssInstrument::new("ess-1", reader, TelemetryRelay::new(tx)), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_publishes_telemetry() {
        let counters = Arc::new(Counters::default());
        let (mut instrument, mut rx) = instrument(FakeReader::new(counters.clone()));
        assert_eq!(instrument.state(), InstrumentState::Idle);

        instrument.start().await.unwrap();
        assert_eq!(instrument.state(), InstrumentState::Running);
        assert_eq!(counters.starts.load(Ordering::SeqCst), 1);

        for expected in 0..3 {
            match rx.recv().await {
                Some(Message::Telemetry(telemetry)) => {
                    assert_eq!(telemetry.name, "fake");
                    assert_eq!(telemetry.values, vec![Some(expected as f64)]);
                }
                other => panic!("Expected telemetry, got {other:?}"),
            }
        }

        instrument.stop().await.unwrap();
        assert_eq!(instrument.state(), InstrumentState::Idle);
        assert_eq!(counters.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_telemetry_after_stop() {
        let counters = Arc::new(Counters::default());
        let (mut instrument, mut rx) = instrument(FakeReader::new(counters.clone()));

        instrument.start().await.unwrap();
        rx.recv().await.unwrap();
        instrument.stop().await.unwrap();

        while rx.try_recv().is_ok() {}
        let reads = counters.reads.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(counters.reads.load(Ordering::SeqCst), reads);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_is_noop() {
        let counters = Arc::new(Counters::default());
        let (mut instrument, _rx) = instrument(FakeReader::new(counters.clone()));

        instrument.start().await.unwrap();
        instrument.start().await.unwrap();
        assert_eq!(counters.starts.load(Ordering::SeqCst), 1);

        instrument.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_noop() {
        let counters = Arc::new(Counters::default());
        let (mut instrument, _rx) = instrument(FakeReader::new(counters.clone()));

        instrument.stop().await.unwrap();
        assert_eq!(counters.stops.load(Ordering::SeqCst), 0);
        assert_eq!(instrument.state(), InstrumentState::Idle);
    }

    #[tokio::test]
    async fn test_start_failure_stays_idle() {
        let counters = Arc::new(Counters::default());
        let mut reader = FakeReader::new(counters.clone());
        reader.fail_start = true;
        let (mut instrument, _rx) = instrument(reader);

        let result = instrument.start().await;
        assert!(matches!(result, Err(HardwareError::NotFound { .. })));
        assert_eq!(instrument.state(), InstrumentState::Idle);
        assert_eq!(counters.reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_failure_ends_loop_and_stop_still_stops_reader() {
        let counters = Arc::new(Counters::default());
        let mut reader = FakeReader::new(counters.clone());
        reader.fail_after = Some(2);
        let (mut instrument, mut rx) = instrument(reader);

        instrument.start().await.unwrap();
        assert!(matches!(rx.recv().await, Some(Message::Telemetry(_))));
        assert!(matches!(rx.recv().await, Some(Message::Telemetry(_))));

        // Loop ended on the third read
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!instrument.is_polling());
        assert!(instrument.is_running());
        assert_eq!(counters.reads.load(Ordering::SeqCst), 3);

        instrument.stop().await.unwrap();
        assert_eq!(counters.stops.load(Ordering::SeqCst), 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_panic_keeps_reader() {
        let counters = Arc::new(Counters::default());
        let mut reader = FakeReader::new(counters.clone());
        reader.panic_on_read = true;
        let (mut instrument, mut rx) = instrument(reader);

        instrument.start().await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!instrument.is_polling());

        instrument.stop().await.unwrap();
        assert_eq!(counters.stops.load(Ordering::SeqCst), 1);
        assert!(rx.try_recv().is_err());

        // Reader came back, so the instrument can start again
        instrument.start().await.unwrap();
        assert_eq!(counters.starts.load(Ordering::SeqCst), 2);
        instrument.stop().await.unwrap();
        assert_eq!(counters.stops.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_stop() {
        let counters = Arc::new(Counters::default());
        let (mut instrument, mut rx) = instrument(FakeReader::new(counters.clone()));

        instrument.start().await.unwrap();
        rx.recv().await.unwrap();
        instrument.stop().await.unwrap();

        instrument.start().await.unwrap();
        assert!(matches!(rx.recv().await, Some(Message::Telemetry(_))));
        instrument.stop().await.unwrap();

        assert_eq!(counters.starts.load(Ordering::SeqCst), 2);
        assert_eq!(counters.stops.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(InstrumentState::Idle.to_string(), "IDLE");
        assert_eq!(InstrumentState::Running.to_string(), "RUNNING");
    }
}
