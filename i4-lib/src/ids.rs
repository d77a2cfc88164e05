//! Field extraction for the packed id + value words of the I4 stream.
//!
//! A peak is carried in two little-endian 32-bit words. The low 16 bits of
//! the first word hold the sensor id, the rest of the 64 bits hold an
//! IEEE-754 double whose least significant mantissa bits were overwritten by
//! that id:
//!
//! ```text
//!  word0 (LSB half)                              word1 (MSB half)
//! ┌────────────────────┬─────────┬───────┬────────┐ ┌───────────────────────┐
//! │ wavelength[31:16]  │ channel │ fiber │ sensor │ │ wavelength[63:32]     │
//! │ 16 bits            │ 4 bits  │ 4 bits│ 8 bits │ │ 32 bits               │
//! └────────────────────┴─────────┴───────┴────────┘ └───────────────────────┘
//! ```

use crate::constants::{PEAK_TIMESTAMP_TICK_S, WAVELENGTH_FILL, WAVELENGTH_WORD_MASK};
use modular_bitfield::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bit layout of the id-carrying word, least significant field first.
#[bitfield(bytes = 4)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakIdWord {
    pub sensor: u8,
    pub fiber: B4,
    pub channel: B4,
    pub wavelength_bits: u16,
}

impl From<u32> for PeakIdWord {
    fn from(word: u32) -> Self {
        PeakIdWord::from_bytes(word.to_le_bytes())
    }
}

impl From<PeakIdWord> for u32 {
    fn from(word: PeakIdWord) -> Self {
        u32::from_le_bytes(word.into_bytes())
    }
}

/// Address of one FBG: interrogator channel, fiber on that channel, grating on that fiber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct SensorId {
    pub channel: u8,
    pub fiber: u8,
    pub sensor: u8,
}

impl SensorId {
    pub const fn new(channel: u8, fiber: u8, sensor: u8) -> Self {
        Self { channel, fiber, sensor }
    }

    /// Whether the id fits the 4-bit channel / 4-bit fiber wire layout
    pub fn is_encodable(&self) -> bool {
        self.channel <= 0x0F && self.fiber <= 0x0F
    }

    /// Low 16 bits of the id word for this sensor
    pub fn to_word_bits(self) -> u32 {
        let word = PeakIdWord::new()
            .with_sensor(self.sensor)
            .with_fiber(self.fiber & 0x0F)
            .with_channel(self.channel & 0x0F)
            .with_wavelength_bits(0);
        u32::from(word)
    }
}

impl From<PeakIdWord> for SensorId {
    fn from(word: PeakIdWord) -> Self {
        Self {
            channel: word.channel(),
            fiber: word.fiber(),
            sensor: word.sensor(),
        }
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Channel#{} Fiber#{} Sensor#{}", self.channel, self.fiber, self.sensor)
    }
}

/// Extract channel (bits 12-15), fiber (bits 8-11) and sensor (bits 0-7) from `word0`.
pub fn decode_id(word0: u32) -> SensorId {
    SensorId::from(PeakIdWord::from(word0))
}

/// Rebuild the wavelength in meters from the two peak words.
///
/// The id bits of `word0` are replaced by `0x7FFF` before the 64-bit pattern
/// `word1:word0` is reinterpreted as a double. Bit-exact by construction.
pub fn decode_wavelength(word0: u32, word1: u32) -> f64 {
    let low = (word0 & WAVELENGTH_WORD_MASK) | WAVELENGTH_FILL;
    f64::from_bits((u64::from(word1) << 32) | u64::from(low))
}

/// Per-peak timestamp in seconds (0.5 ns ticks).
pub fn decode_timestamp(raw: u32) -> f64 {
    f64::from(raw) * PEAK_TIMESTAMP_TICK_S
}

/// Pack an id and a wavelength into the two peak words, as the device does.
///
/// The low 16 bits of the wavelength are lost, so decoding returns the
/// wavelength with those bits set to `0x7FFF`.
pub fn encode_peak_words(id: SensorId, wavelength_m: f64) -> (u32, u32) {
    let bits = wavelength_m.to_bits();
    let word0 = (bits as u32 & WAVELENGTH_WORD_MASK) | id.to_word_bits();
    let word1 = (bits >> 32) as u32;
    (word0, word1)
}
