use crate::constants::{HEADER_SIZE, NO_ERROR_DATA_OFFSET, NTP_UNIX_OFFSET_S};
use crate::error::I4Error;
use chrono::{DateTime, Utc};
use modular_bitfield::prelude::*;
use num_enum::{FromPrimitive, IntoPrimitive};
use std::fmt;
use strum_macros::Display;
use zerocopy::byteorder::little_endian::{U16, U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// The `info` word at the start of every header.
#[bitfield(bytes = 2)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacketInfo {
    pub packet_counter: B12,
    pub sweep_type: B3,
    pub external_trigger: bool,
}

/// Acquisition mode selecting the payload record format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum SweepType {
    Peak = 0,
    Spectral = 1,
    TimestampedPeak = 2,

    #[num_enum(catch_all)]
    Reserved(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Default)]
pub enum TriggerMode {
    #[default]
    Internal,
    External,
}

impl From<bool> for TriggerMode {
    fn from(external: bool) -> Self {
        if external {
            TriggerMode::External
        } else {
            TriggerMode::Internal
        }
    }
}

/// Wire layout of the 16-byte header
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct PacketHeaderRaw {
    pub info: U16,
    pub data_offset: U16,
    pub data_length: U32,
    pub timestamp: U64, // NTP-epoch nanoseconds
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// 12-bit wrapping counter
    pub packet_counter: u16,
    pub sweep_type: SweepType,
    pub trigger_mode: TriggerMode,
    /// 16 when no error payload follows, anything else when one does
    pub data_offset: u16,
    /// Payload bytes following the header (and the error payload, if any)
    pub data_length: u32,
    pub device_timestamp: u64,
}

impl From<PacketHeaderRaw> for PacketHeader {
    fn from(raw: PacketHeaderRaw) -> Self {
        let info = PacketInfo::from_bytes(raw.info.get().to_le_bytes());

        Self {
            packet_counter: info.packet_counter(),
            sweep_type: SweepType::from_primitive(info.sweep_type()),
            trigger_mode: TriggerMode::from(info.external_trigger()),
            data_offset: raw.data_offset.get(),
            data_length: raw.data_length.get(),
            device_timestamp: raw.timestamp.get(),
        }
    }
}

impl From<PacketHeader> for PacketHeaderRaw {
    fn from(header: PacketHeader) -> Self {
        let sweep: u8 = header.sweep_type.into();
        let info = PacketInfo::new()
            .with_packet_counter(header.packet_counter & 0x0FFF)
            .with_sweep_type(sweep & 0x07)
            .with_external_trigger(header.trigger_mode == TriggerMode::External);

        PacketHeaderRaw {
            info: U16::new(u16::from_le_bytes(info.into_bytes())),
            data_offset: U16::new(header.data_offset),
            data_length: U32::new(header.data_length),
            timestamp: U64::new(header.device_timestamp),
        }
    }
}

impl PacketHeader {
    /// Decode a header from exactly 16 bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, I4Error> {
        if bytes.len() != HEADER_SIZE {
            return Err(I4Error::MalformedHeader {
                expected: HEADER_SIZE,
                actual: bytes.len(),
            });
        }

        let raw = PacketHeaderRaw::read_from_bytes(bytes).map_err(|_| I4Error::MalformedHeader {
            expected: HEADER_SIZE,
            actual: bytes.len(),
        })?;

        Ok(PacketHeader::from(raw))
    }

    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let raw = PacketHeaderRaw::from(*self);
        let mut out = [0u8; HEADER_SIZE];
        out.copy_from_slice(raw.as_bytes());
        out
    }

    pub fn has_error_payload(&self) -> bool {
        self.data_offset != NO_ERROR_DATA_OFFSET
    }

    /// Total bytes of this packet on the wire as the device accounts for them
    pub fn packet_size(&self) -> u64 {
        u64::from(self.data_offset) + u64::from(self.data_length) + 8
    }

    /// Device clock as wall time. The device counts nanoseconds from the NTP epoch.
    pub fn device_time(&self) -> Option<DateTime<Utc>> {
        let secs = (self.device_timestamp / 1_000_000_000) as i64 - NTP_UNIX_OFFSET_S;
        let nanos = (self.device_timestamp % 1_000_000_000) as u32;
        DateTime::from_timestamp(secs, nanos)
    }
}

impl TryFrom<&[u8]> for PacketHeader {
    type Error = I4Error;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        PacketHeader::decode(bytes)
    }
}

impl fmt::Display for PacketHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Counter: {}, Sweep: {}, Trigger: {}, Offset: {:#06x}, Length: {}",
            self.packet_counter, self.sweep_type, self.trigger_mode, self.data_offset, self.data_length
        )
    }
}
