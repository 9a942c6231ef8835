//! Intake loop - feeds received datagrams into the engine.
//!
//! Each cycle waits on the transport for at most the poll timeout, drains
//! every ready socket into the engine, then requests a liveness sweep. A
//! timeout just means an empty cycle. Receive failures are logged and
//! skipped; only a failure to poll ends the loop.

use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::engine::{EngineError, EngineHandle};
use crate::transport::{Readiness, Transport, TransportError};

/// Upper bound on datagrams read from one socket per cycle, so a flooded
/// socket cannot starve the others or the sweep.
const MAX_DATAGRAMS_PER_SOCKET: usize = 64;

#[derive(Debug, Error)]
pub enum IntakeError {
    /// The transport can no longer be polled.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The engine went away while intake was still running.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Counters for one run of the intake loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntakeStats {
    pub cycles: u64,
    pub timeouts: u64,
    pub datagrams: u64,
    pub dropped: u64,
}

/// Runs the intake loop until `cancel_token` fires.
///
/// # Errors
///
/// - `IntakeError::Transport` if waiting for readiness fails, or on any
///   other non-recoverable transport error
/// - `IntakeError::Engine` if the engine actor has stopped
pub async fn run_intake<T>(
    transport: &mut T,
    engine: &EngineHandle,
    poll_timeout: Duration,
    cancel_token: CancellationToken,
) -> Result<IntakeStats, IntakeError>
where
    T: Transport + ?Sized,
{
    let mut stats = IntakeStats::default();
    info!(poll_timeout_secs = poll_timeout.as_secs_f64(), "Intake loop starting");

    loop {
        let readiness = tokio::select! {
            biased;

            _ = cancel_token.cancelled() => {
                info!(
                    cycles = stats.cycles,
                    datagrams = stats.datagrams,
                    dropped = stats.dropped,
                    "Intake loop shutting down"
                );
                return Ok(stats);
            }

            result = transport.poll_readable(poll_timeout) => result?,
        };

        stats.cycles += 1;

        match readiness {
            Readiness::Timeout => {
                stats.timeouts += 1;
                debug!("No datagrams this cycle");
            }
            Readiness::Ready(indices) => {
                for index in indices {
                    drain_socket(transport, engine, index, &mut stats).await?;
                }
            }
        }

        engine.tick().await?;
    }
}

async fn drain_socket<T>(
    transport: &mut T,
    engine: &EngineHandle,
    index: usize,
    stats: &mut IntakeStats,
) -> Result<(), IntakeError>
where
    T: Transport + ?Sized,
{
    for _ in 0..MAX_DATAGRAMS_PER_SOCKET {
        match transport.receive(index).await {
            Ok(datagram) => {
                stats.datagrams += 1;
                engine.ingest(datagram.payload).await?;
            }
            Err(TransportError::NotReady { .. }) => return Ok(()),
            Err(e @ TransportError::Oversized { .. }) => {
                stats.dropped += 1;
                warn!(index, error = %e, "Dropping oversized datagram");
            }
            Err(e @ TransportError::Receive { .. }) => {
                stats.dropped += 1;
                error!(index, error = %e, "Receive failed");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
    }

    debug!(index, "Socket still busy, continuing next cycle");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;

    use async_trait::async_trait;

    use crate::engine::{spawn_engine, EngineConfig};
    use crate::transport::Datagram;

    /// Transport replaying a fixed script of poll results and datagrams.
    struct ScriptedTransport {
        polls: VecDeque<Result<Readiness, TransportError>>,
        datagrams: VecDeque<Result<Datagram, TransportError>>,
    }

    impl ScriptedTransport {
        fn new() -> Self {
            Self {
                polls: VecDeque::new(),
                datagrams: VecDeque::new(),
            }
        }

        fn ready(mut self, lines: &[&str]) -> Self {
            self.polls.push_back(Ok(Readiness::Ready(vec![0])));
            for line in lines {
                self.datagrams.push_back(Ok(Datagram {
                    payload: line.as_bytes().to_vec(),
                    from: "127.0.0.1:9000".parse().unwrap(),
                }));
            }
            self.datagrams
                .push_back(Err(TransportError::NotReady { index: 0 }));
            self
        }

        fn then(mut self, poll: Result<Readiness, TransportError>) -> Self {
            self.polls.push_back(poll);
            self
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn poll_readable(&mut self, _timeout: Duration) -> Result<Readiness, TransportError> {
            match self.polls.pop_front() {
                Some(poll) => poll,
                // Script exhausted: behave like a broken socket
                None => Err(TransportError::Poll {
                    index: 0,
                    source: io::Error::new(io::ErrorKind::Other, "script exhausted"),
                }),
            }
        }

        async fn receive(&mut self, index: usize) -> Result<Datagram, TransportError> {
            self.datagrams
                .pop_front()
                .unwrap_or(Err(TransportError::NotReady { index }))
        }
    }

    #[tokio::test]
    async fn test_datagrams_reach_engine_and_poll_error_ends_loop() {
        let cancel = CancellationToken::new();
        let engine = spawn_engine(EngineConfig::default(), cancel.clone());
        let mut transport = ScriptedTransport::new()
            .ready(&["SESSION2|roomA|m1|m2", "MACHINESTATUS|m1|2.0|30"])
            .then(Ok(Readiness::Timeout));

        let result = run_intake(&mut transport, &engine, Duration::from_millis(10), cancel.clone()).await;
        assert!(matches!(
            result,
            Err(IntakeError::Transport(TransportError::Poll { .. }))
        ));

        let snapshot = engine.snapshot().await.unwrap();
        let m1 = snapshot.machine("m1").unwrap();
        assert!(m1.status.is_some());
        assert_eq!(engine.session("roomA").await.map(|r| r.len()), Some(2));

        cancel.cancel();
    }

    #[tokio::test]
    async fn test_oversized_datagram_is_skipped() {
        let cancel = CancellationToken::new();
        let engine = spawn_engine(EngineConfig::default(), cancel.clone());

        let mut transport = ScriptedTransport::new();
        transport.polls.push_back(Ok(Readiness::Ready(vec![0])));
        transport.datagrams.push_back(Err(TransportError::Oversized {
            from: "127.0.0.1:9000".parse().unwrap(),
            limit: 200,
        }));
        transport.datagrams.push_back(Ok(Datagram {
            payload: b"MACHINE|m2|roomA".to_vec(),
            from: "127.0.0.1:9000".parse().unwrap(),
        }));

        let result = run_intake(&mut transport, &engine, Duration::from_millis(10), cancel.clone()).await;
        assert!(result.is_err());

        assert!(engine.machine("m2").await.unwrap().is_online());
        cancel.cancel();
    }

    #[tokio::test]
    async fn test_cancel_stops_loop_with_stats() {
        let cancel = CancellationToken::new();
        let engine = spawn_engine(EngineConfig::default(), cancel.clone());
        let mut transport = ScriptedTransport::new();
        cancel.cancel();

        let stats = run_intake(&mut transport, &engine, Duration::from_millis(10), cancel)
            .await
            .unwrap();
        assert_eq!(stats, IntakeStats::default());
    }

    #[tokio::test]
    async fn test_engine_gone_is_an_error() {
        let cancel = CancellationToken::new();
        let engine = spawn_engine(EngineConfig::default(), cancel.clone());
        engine.shutdown().await.unwrap();

        let mut transport = ScriptedTransport::new().then(Ok(Readiness::Timeout));
        let result = run_intake(&mut transport, &engine, Duration::from_millis(10), cancel.clone()).await;
        assert!(matches!(result, Err(IntakeError::Engine(EngineError::ChannelClosed))));
        cancel.cancel();
    }
}
