//! Stop signalling and socket handover for link tasks.
//!
//! A task holds a [`StopSignal`] and sleeps on it between ticks; the owner
//! keeps the matching [`StopHandle`]. Stopping drops the channel sender, which
//! wakes every pending [`StopSignal::sleep`] at once.
//!
//! Stream-owning tasks also register their live socket in a [`SocketSlot`] so
//! the owner can shut it down from outside before signalling stop.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use tracing::debug;

/// Create a connected stop handle / signal pair.
pub fn stop_pair() -> (StopHandle, StopSignal) {
    let (tx, rx) = bounded(0);
    (StopHandle { tx: Some(tx) }, StopSignal { rx })
}

/// Owner side of a stop signal.
#[derive(Debug)]
pub struct StopHandle {
    tx: Option<Sender<()>>,
}

impl StopHandle {
    /// Signal stop. Calling more than once is a no-op.
    pub fn stop(&mut self) {
        self.tx.take();
    }

    pub fn is_stopped(&self) -> bool {
        self.tx.is_none()
    }
}

/// Task side of a stop signal. Cheap to clone.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: Receiver<()>,
}

impl StopSignal {
    /// A signal that is never stopped (for one-off use outside a manager).
    pub fn never() -> Self {
        StopSignal {
            rx: crossbeam_channel::never(),
        }
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Sleep for `duration` or until stopped.
    ///
    /// Returns `true` if the task should keep running.
    pub fn sleep(&self, duration: Duration) -> bool {
        match self.rx.recv_timeout(duration) {
            Err(RecvTimeoutError::Timeout) => true,
            Err(RecvTimeoutError::Disconnected) => false,
            Ok(()) => !self.is_stopped(),
        }
    }
}

/// A stream that can be shut down through a shared handle.
pub trait StreamShutdown: Send {
    fn shutdown_both(&self);
}

impl StreamShutdown for TcpStream {
    fn shutdown_both(&self) {
        roverlink_transport::shutdown_stream(self);
    }
}

/// Byte stream usable by a reconnecting session.
pub trait SessionStream: Read + Write + StreamShutdown + Sized + 'static {
    /// A second handle to the same connection.
    fn try_clone_stream(&self) -> std::io::Result<Self>;
}

impl SessionStream for TcpStream {
    fn try_clone_stream(&self) -> std::io::Result<Self> {
        self.try_clone()
    }
}

/// Shared slot holding the stream a task currently owns.
#[derive(Clone, Default)]
pub struct SocketSlot {
    inner: Arc<Mutex<Option<Box<dyn StreamShutdown>>>>,
}

impl SocketSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, stream: Box<dyn StreamShutdown>) {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner()) = Some(stream);
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).take();
    }

    pub fn is_occupied(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Shut the registered stream down in both directions and release it.
    pub fn shutdown(&self) {
        let stream = self.inner.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(stream) = stream {
            debug!("shutting down registered stream");
            stream.shutdown_both();
        }
    }
}

impl std::fmt::Debug for SocketSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketSlot")
            .field("occupied", &self.is_occupied())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    use super::*;

    #[test]
    fn sleep_runs_full_duration_while_running() {
        let (_handle, signal) = stop_pair();
        let start = Instant::now();
        assert!(signal.sleep(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert!(!signal.is_stopped());
    }

    #[test]
    fn stop_wakes_sleeper_early() {
        let (mut handle, signal) = stop_pair();
        let sleeper = std::thread::spawn(move || {
            let start = Instant::now();
            let running = signal.sleep(Duration::from_secs(10));
            (running, start.elapsed())
        });

        std::thread::sleep(Duration::from_millis(20));
        handle.stop();
        handle.stop();

        let (running, elapsed) = sleeper.join().unwrap();
        assert!(!running);
        assert!(elapsed < Duration::from_secs(5));
        assert!(handle.is_stopped());
    }

    #[test]
    fn clones_observe_stop() {
        let (mut handle, signal) = stop_pair();
        let clone = signal.clone();
        handle.stop();
        assert!(signal.is_stopped());
        assert!(clone.is_stopped());
        assert!(!clone.sleep(Duration::from_secs(1)));
    }

    #[test]
    fn never_signal_keeps_running() {
        let signal = StopSignal::never();
        assert!(!signal.is_stopped());
        assert!(signal.sleep(Duration::from_millis(1)));
    }

    #[derive(Clone)]
    struct CountingStream(Arc<AtomicUsize>);

    impl StreamShutdown for CountingStream {
        fn shutdown_both(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn slot_shutdown_takes_stream_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let slot = SocketSlot::new();
        slot.register(Box::new(CountingStream(Arc::clone(&count))));
        assert!(slot.is_occupied());

        slot.shutdown();
        slot.shutdown();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!slot.is_occupied());
    }

    #[test]
    fn cleared_slot_does_not_shut_down() {
        let count = Arc::new(AtomicUsize::new(0));
        let slot = SocketSlot::new();
        slot.register(Box::new(CountingStream(Arc::clone(&count))));
        slot.clear();
        slot.shutdown();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
