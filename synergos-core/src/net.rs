//! Cooperative socket adapter
//!
//! Adapts a blocking transport to the scheduler's cooperative model: the
//! receive path probes readiness, yields control between probes, and
//! surfaces a distinguishable timeout. The wrapped transport's own
//! configuration is never touched - readiness comes from
//! [`ReadReady`], not from flipping the socket into non-blocking mode.

use core::fmt;

use embassy_futures::yield_now;
use embassy_time::{Duration, Instant, Timer};
use embedded_io::{Read, ReadReady};

use crate::config::SocketConfig;

/// Error from a cooperative receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecvError<E> {
    /// The configured timeout elapsed with no data
    TimedOut,
    /// Transport error
    Io(E),
}

impl<E: fmt::Display> fmt::Display for RecvError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecvError::TimedOut => f.write_str("receive timed out"),
            RecvError::Io(error) => write!(f, "transport error: {}", error),
        }
    }
}

impl<E: embedded_io::Error> embedded_io::Error for RecvError<E> {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            RecvError::TimedOut => embedded_io::ErrorKind::TimedOut,
            RecvError::Io(error) => error.kind(),
        }
    }
}

/// A blocking transport adapted to cooperative polling.
///
/// Between readiness probes the socket suspends for its poll interval
/// (or plain-yields when the interval is zero), so sibling tasks keep
/// running while a receive is outstanding.
pub struct CooperativeSocket<S> {
    inner: S,
    poll_interval: Duration,
    timeout: Option<Duration>,
}

impl<S> CooperativeSocket<S> {
    /// Wrap a transport with the default [`SocketConfig`].
    pub fn new(inner: S) -> Self {
        Self::with_config(inner, SocketConfig::default())
    }

    /// Wrap a transport with explicit tuning.
    pub fn with_config(inner: S, config: SocketConfig) -> Self {
        Self {
            inner,
            poll_interval: Duration::from_millis(config.poll_interval_ms as u64),
            timeout: config
                .timeout_ms
                .map(|ms| Duration::from_millis(ms as u64)),
        }
    }

    /// Interval between readiness probes.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Change the interval between readiness probes.
    pub fn set_poll_interval(&mut self, interval: Duration) {
        self.poll_interval = interval;
    }

    /// Timeout on receive operations; `None` waits indefinitely.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Change the receive timeout.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// The wrapped transport.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// The wrapped transport, mutably.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Unwrap the transport.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Read + ReadReady> CooperativeSocket<S> {
    /// Receive data, yielding to the scheduler between readiness probes.
    ///
    /// Resolves with the number of bytes read, or [`RecvError::TimedOut`]
    /// once the configured timeout elapses with no data.
    pub async fn recv(&mut self, buf: &mut [u8]) -> Result<usize, RecvError<S::Error>> {
        let started = Instant::now();
        loop {
            if self.inner.read_ready().map_err(RecvError::Io)? {
                return self.inner.read(buf).map_err(RecvError::Io);
            }

            if let Some(timeout) = self.timeout {
                if started.elapsed() >= timeout {
                    return Err(RecvError::TimedOut);
                }
            }

            if self.poll_interval.as_ticks() > 0 {
                Timer::after(self.poll_interval).await;
            } else {
                yield_now().await;
            }
        }
    }
}

impl<S: Read + ReadReady> embedded_io::ErrorType for CooperativeSocket<S> {
    type Error = RecvError<S::Error>;
}

impl<S: Read + ReadReady> embedded_io_async::Read for CooperativeSocket<S> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.recv(buf).await
    }
}
