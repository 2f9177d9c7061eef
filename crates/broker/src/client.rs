//! Broker connection lifecycle.
//!
//! The connection is an injected object with explicit states, not a
//! module-level global. `connect()` is idempotent and reconnects with
//! capped exponential backoff until an attempt limit marks the connection
//! fatal.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::BrokerError;

/// Lifecycle state of a broker connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection attempt has been made yet.
    Disconnected,
    /// The connection is established and usable.
    Open,
    /// The connection is down and a reconnect attempt is in progress.
    Reconnecting {
        /// 1-based attempt counter.
        attempt: u32,
    },
    /// The connection gave up; no further attempts will be made.
    Fatal,
}

/// Capped exponential backoff schedule.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
}

impl Backoff {
    /// Creates a schedule that doubles from `base` up to `cap`.
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap }
    }

    /// Returns the delay before the given 1-based attempt's retry.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self.base.saturating_mul(1 << exponent);
        delay.min(self.cap)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            cap: Duration::from_secs(30),
        }
    }
}

/// The transport a connection supervises.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Attempts to establish the underlying connection and channel.
    async fn connect(&self) -> Result<(), BrokerError>;
}

/// Supervises a broker transport's connection lifecycle.
pub struct BrokerConnection<T: Transport> {
    transport: T,
    state: Arc<tokio::sync::RwLock<ConnectionState>>,
    backoff: Backoff,
    max_attempts: u32,
}

impl<T: Transport> BrokerConnection<T> {
    /// Creates a supervisor with the default backoff and attempt limit.
    pub fn new(transport: T) -> Self {
        Self::with_backoff(transport, Backoff::default(), 10)
    }

    /// Creates a supervisor with an explicit backoff schedule and limit.
    pub fn with_backoff(transport: T, backoff: Backoff, max_attempts: u32) -> Self {
        Self {
            transport,
            state: Arc::new(tokio::sync::RwLock::new(ConnectionState::Disconnected)),
            backoff,
            max_attempts,
        }
    }

    /// Returns the current connection state.
    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Establishes the connection, retrying with backoff.
    ///
    /// Idempotent: calling on an already-open connection returns
    /// immediately without touching the transport. Concurrent callers
    /// racing to establish the connection are safe for the same reason.
    pub async fn connect(&self) -> Result<(), BrokerError> {
        if *self.state.read().await == ConnectionState::Open {
            return Ok(());
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            *self.state.write().await = ConnectionState::Reconnecting { attempt };

            match self.transport.connect().await {
                Ok(()) => {
                    *self.state.write().await = ConnectionState::Open;
                    tracing::info!(attempt, "broker connection established");
                    return Ok(());
                }
                Err(err) if attempt >= self.max_attempts => {
                    *self.state.write().await = ConnectionState::Fatal;
                    tracing::error!(attempt, error = %err, "broker connection permanently failed");
                    return Err(BrokerError::ConnectionFatal { attempts: attempt });
                }
                Err(err) => {
                    let delay = self.backoff.delay_for(attempt);
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "broker connection failed, backing off"
                    );
                    metrics::counter!("broker_reconnect_attempts").increment(1);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Marks the connection lost so the next `connect()` re-establishes it.
    pub async fn connection_lost(&self) {
        let mut state = self.state.write().await;
        if *state == ConnectionState::Open {
            *state = ConnectionState::Disconnected;
            tracing::warn!("broker connection lost");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` connect calls, then succeeds.
    struct FlakyTransport {
        failures: u32,
        calls: AtomicU32,
    }

    impl FlakyTransport {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Transport for FlakyTransport {
        async fn connect(&self) -> Result<(), BrokerError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(BrokerError::NotConnected)
            } else {
                Ok(())
            }
        }
    }

    fn fast_backoff() -> Backoff {
        Backoff::new(Duration::from_millis(1), Duration::from_millis(4))
    }

    #[tokio::test]
    async fn connect_opens_on_first_success() {
        let conn = BrokerConnection::with_backoff(FlakyTransport::new(0), fast_backoff(), 3);
        conn.connect().await.unwrap();
        assert_eq!(conn.state().await, ConnectionState::Open);
    }

    #[tokio::test]
    async fn connect_retries_through_transient_failures() {
        let conn = BrokerConnection::with_backoff(FlakyTransport::new(2), fast_backoff(), 5);
        conn.connect().await.unwrap();
        assert_eq!(conn.state().await, ConnectionState::Open);
        assert_eq!(conn.transport.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn connect_is_idempotent_when_open() {
        let conn = BrokerConnection::with_backoff(FlakyTransport::new(0), fast_backoff(), 3);
        conn.connect().await.unwrap();
        conn.connect().await.unwrap();
        // The transport was only touched by the first call.
        assert_eq!(conn.transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn connect_goes_fatal_after_attempt_limit() {
        let conn = BrokerConnection::with_backoff(FlakyTransport::new(u32::MAX), fast_backoff(), 3);
        let result = conn.connect().await;
        assert!(matches!(
            result,
            Err(BrokerError::ConnectionFatal { attempts: 3 })
        ));
        assert_eq!(conn.state().await, ConnectionState::Fatal);
    }

    #[tokio::test]
    async fn connection_lost_allows_reconnect() {
        let conn = BrokerConnection::with_backoff(FlakyTransport::new(0), fast_backoff(), 3);
        conn.connect().await.unwrap();
        conn.connection_lost().await;
        assert_eq!(conn.state().await, ConnectionState::Disconnected);
        conn.connect().await.unwrap();
        assert_eq!(conn.state().await, ConnectionState::Open);
        assert_eq!(conn.transport.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let backoff = Backoff::new(Duration::from_millis(500), Duration::from_secs(4));
        assert_eq!(backoff.delay_for(1), Duration::from_millis(500));
        assert_eq!(backoff.delay_for(2), Duration::from_secs(1));
        assert_eq!(backoff.delay_for(3), Duration::from_secs(2));
        assert_eq!(backoff.delay_for(4), Duration::from_secs(4));
        // Capped from here on.
        assert_eq!(backoff.delay_for(5), Duration::from_secs(4));
        assert_eq!(backoff.delay_for(30), Duration::from_secs(4));
    }
}
