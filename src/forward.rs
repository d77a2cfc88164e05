//! Background task that feeds force readings to a relay connection.
//!
//! The decode loop never waits on the relay: readings go through a bounded
//! queue and are dropped with a warning once it is full.

use i4_lib::{ForceReading, ForceRelay, I4Error};
use std::io;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::warn;

/// Readings buffered for a slow relay server before new ones are dropped
pub const RELAY_BACKLOG: usize = 1024;

pub struct RelayForwarder {
    tx: mpsc::Sender<ForceReading>,
    handle: JoinHandle<Result<u64, I4Error>>,
}

impl RelayForwarder {
    pub fn spawn<W>(writer: W, backlog: usize) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<ForceReading>(backlog);
        let handle = tokio::spawn(async move {
            let mut relay = ForceRelay::new(writer);
            while let Some(reading) = rx.recv().await {
                relay.send(&reading).await?;
            }
            relay.flush().await?;
            Ok(relay.sent())
        });

        Self { tx, handle }
    }

    /// Queue a reading without waiting. `false` if it was dropped.
    pub fn offer(&self, reading: ForceReading) -> bool {
        match self.tx.try_send(reading) {
            Ok(()) => true,
            Err(TrySendError::Full(reading)) => {
                warn!("Relay backlog full, dropping reading for {}", reading.id);
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!("Relay task has stopped, dropping reading");
                false
            }
        }
    }

    /// Close the queue, wait for the backlog to drain and return the frames sent.
    pub async fn finish(self) -> Result<u64, I4Error> {
        drop(self.tx);
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(I4Error::Transport(io::Error::other(e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use i4_lib::{SensorId, read_force_frame};

    fn reading(sensor: u8, force_mn: f64) -> ForceReading {
        ForceReading {
            id: SensorId::new(0, 0, sensor),
            reference_wavelength_m: 1534.63e-9,
            measured_wavelength_m: 1534.63e-9,
            force_mn,
        }
    }

    #[tokio::test]
    async fn test_full_backlog_drops_instead_of_growing() {
        let (writer, mut reader) = tokio::io::duplex(64);
        let forwarder = RelayForwarder::spawn(writer, 1);

        // The relay task has not been polled yet, so the single slot stays taken
        assert!(forwarder.offer(reading(0, 1.0)));
        assert!(!forwarder.offer(reading(1, 2.0)));
        assert!(!forwarder.offer(reading(2, 3.0)));

        assert_eq!(forwarder.finish().await.unwrap(), 1);
        let frame = read_force_frame(&mut reader).await.unwrap();
        assert_eq!(frame.id, SensorId::new(0, 0, 0));
        assert_eq!(frame.force_mn, 1.0);
    }

    #[tokio::test]
    async fn test_closed_relay_reports_error() {
        let (writer, reader) = tokio::io::duplex(64);
        drop(reader);

        let forwarder = RelayForwarder::spawn(writer, RELAY_BACKLOG);
        assert!(forwarder.offer(reading(0, 1.0)));
        assert!(matches!(forwarder.finish().await, Err(I4Error::Transport(_))));
    }
}
