//! Downstream relay of computed forces.
//!
//! Each reading is forwarded as an 11-byte frame to a logging server:
//!
//! ```text
//! ┌─────────┬───────┬────────┬──────────────────────┐
//! │ channel │ fiber │ sensor │ force, mN (f64, LE)  │
//! │ u8      │ u8    │ u8     │ 8 bytes              │
//! └─────────┴───────┴────────┴──────────────────────┘
//! ```

use crate::calibration::ForceReading;
use crate::constants::FORCE_FRAME_SIZE;
use crate::error::I4Error;
use crate::ids::SensorId;
use crate::transport::Transport;
use std::fmt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::trace;
use zerocopy::byteorder::little_endian::F64;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct ForceFrameRaw {
    pub channel: u8,
    pub fiber: u8,
    pub sensor: u8,
    pub force_mn: F64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceFrame {
    pub id: SensorId,
    pub force_mn: f64,
}

impl ForceFrame {
    pub fn encode(&self) -> [u8; FORCE_FRAME_SIZE] {
        let raw = ForceFrameRaw {
            channel: self.id.channel,
            fiber: self.id.fiber,
            sensor: self.id.sensor,
            force_mn: F64::new(self.force_mn),
        };
        let mut out = [0u8; FORCE_FRAME_SIZE];
        out.copy_from_slice(raw.as_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, I4Error> {
        let raw = ForceFrameRaw::read_from_bytes(bytes).map_err(|_| I4Error::MalformedForceFrame {
            expected: FORCE_FRAME_SIZE,
            actual: bytes.len(),
        })?;

        Ok(ForceFrame {
            id: SensorId::new(raw.channel, raw.fiber, raw.sensor),
            force_mn: raw.force_mn.get(),
        })
    }
}

impl From<&ForceReading> for ForceFrame {
    fn from(reading: &ForceReading) -> Self {
        ForceFrame {
            id: reading.id,
            force_mn: reading.force_mn,
        }
    }
}

impl fmt::Display for ForceFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\tForce: {:.5} mN", self.id, self.force_mn)
    }
}

/// Writes force frames to a downstream connection
pub struct ForceRelay<W> {
    writer: W,
    sent: u64,
}

impl<W: AsyncWrite + Unpin> ForceRelay<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, sent: 0 }
    }

    pub async fn send(&mut self, reading: &ForceReading) -> Result<(), I4Error> {
        let frame = ForceFrame::from(reading).encode();
        trace!("Relay frame: {}", hex::encode(frame));
        self.writer.write_all(&frame).await?;
        self.sent += 1;
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<(), I4Error> {
        self.writer.flush().await?;
        Ok(())
    }

    /// Frames written so far
    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Read one relayed frame. A clean end of stream is [`I4Error::TransportClosed`].
pub async fn read_force_frame<T: Transport>(transport: &mut T) -> Result<ForceFrame, I4Error> {
    let bytes = transport.read_block(FORCE_FRAME_SIZE).await?;
    ForceFrame::decode(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_layout() {
        let frame = ForceFrame {
            id: SensorId::new(1, 0, 1),
            force_mn: 1.5,
        };
        let bytes = frame.encode();
        assert_eq!(&bytes[..3], &[1, 0, 1]);
        assert_eq!(&bytes[3..], &1.5f64.to_le_bytes());
        assert_eq!(ForceFrame::decode(&bytes).unwrap(), frame);
    }

    #[test]
    fn test_decode_wrong_size() {
        assert!(matches!(
            ForceFrame::decode(&[0u8; 10]),
            Err(I4Error::MalformedForceFrame {
                expected: 11,
                actual: 10
            })
        ));
    }

    #[tokio::test]
    async fn test_relay_to_reader() {
        let readings = [
            ForceReading {
                id: SensorId::new(0, 0, 0),
                reference_wavelength_m: 1534.63e-9,
                measured_wavelength_m: 1534.73e-9,
                force_mn: 1.25,
            },
            ForceReading {
                id: SensorId::new(3, 0, 1),
                reference_wavelength_m: 1549.65e-9,
                measured_wavelength_m: 1549.60e-9,
                force_mn: -0.5,
            },
        ];

        let mut relay = ForceRelay::new(Vec::new());
        for reading in &readings {
            relay.send(reading).await.unwrap();
        }
        assert_eq!(relay.sent(), 2);
        let wire = relay.into_inner();
        assert_eq!(wire.len(), 22);

        let mut src: &[u8] = &wire;
        let first = read_force_frame(&mut src).await.unwrap();
        let second = read_force_frame(&mut src).await.unwrap();
        assert_eq!(first.id, readings[0].id);
        assert_eq!(second.force_mn, -0.5);
        assert!(matches!(read_force_frame(&mut src).await, Err(I4Error::TransportClosed)));
    }
}
