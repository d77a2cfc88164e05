//! Payload records carried between the header and the trailing flag.
//!
//! Every record has a fixed wire size. Decoding goes through
//! [`PayloadRecord`], implemented by the zero-copy wire structs, so the
//! size check and the byte layout live in one place:
//!
//! | Record          | Size | Layout                                     |
//! |-----------------|------|--------------------------------------------|
//! | Peak            | 8    | `word0:u32, word1:u32`                     |
//! | TimestampedPeak | 12   | `word0:u32, word1:u32, timestamp:u32`      |
//! | SpectralInfo    | 8    | `id_word:u32, point_count:u32`             |
//! | SpectralSample  | 8    | `4 x i16`                                  |
//! | Error           | 8    | `error_id:u32, description:u32`            |
//! | Flag            | 8    | `sweep_counter:u32, reserved:u32`          |

use crate::constants::*;
use crate::error::I4Error;
use crate::ids::{SensorId, decode_id, decode_timestamp, decode_wavelength, encode_peak_words};
use bytes::Bytes;
use std::fmt;
use strum_macros::Display;
use tracing::trace;
use zerocopy::byteorder::little_endian::{I16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RecordKind {
    Peak,
    TimestampedPeak,
    SpectralInfo,
    SpectralSample,
    Error,
    Flag,
}

impl RecordKind {
    /// Wire size in bytes
    pub const fn size(&self) -> usize {
        match self {
            RecordKind::Peak => PEAK_PAYLOAD_SIZE,
            RecordKind::TimestampedPeak => TS_PEAK_PAYLOAD_SIZE,
            RecordKind::SpectralInfo | RecordKind::SpectralSample => SPECTRAL_PAYLOAD_SIZE,
            RecordKind::Error => ERROR_PAYLOAD_SIZE,
            RecordKind::Flag => FLAG_SIZE,
        }
    }
}

/// A fixed-size wire record that can be interpreted into a semantic value.
pub trait PayloadRecord: FromBytes + IntoBytes + KnownLayout + Immutable + Unaligned + Copy {
    const KIND: RecordKind;
    type Output;

    fn interpret(&self) -> Self::Output;
}

/// Decode exactly one record of type `R` from `bytes`.
pub fn decode_record<R: PayloadRecord>(bytes: &[u8]) -> Result<R::Output, I4Error> {
    let malformed = || I4Error::MalformedPayload {
        kind: R::KIND,
        expected: R::KIND.size(),
        actual: bytes.len(),
    };

    if bytes.len() != R::KIND.size() {
        return Err(malformed());
    }
    trace!("{} record: {}", R::KIND, hex::encode(bytes));

    let raw = R::ref_from_bytes(bytes).map_err(|_| malformed())?;
    Ok(raw.interpret())
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct PeakPayloadRaw {
    pub lsb: U32, // id bits + low wavelength bits
    pub msb: U32,
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct TimestampedPeakPayloadRaw {
    pub lsb: U32,
    pub msb: U32,
    pub timestamp: U32, // 0.5 ns ticks
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct SpectralInfoRaw {
    pub id_word: U32,
    pub point_count: U32,
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct SpectralSampleRaw {
    pub amplitudes: [I16; 4],
}

/// Error payload. The description word carries the sensor id in the same
/// position the peak LSB word does.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct ErrorPayloadRaw {
    pub error_id: U32,
    pub description: U32,
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct FlagRaw {
    pub sweep_counter: U32,
    pub reserved: U32,
}

/// One detected FBG peak
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakRecord {
    pub id: SensorId,
    pub wavelength_m: f64,
    /// Only present for time-stamped peak sweeps
    pub timestamp_s: Option<f64>,
}

impl PeakRecord {
    pub fn wavelength_nm(&self) -> f64 {
        self.wavelength_m * 1e9
    }

    pub fn kind(&self) -> RecordKind {
        if self.timestamp_s.is_some() {
            RecordKind::TimestampedPeak
        } else {
            RecordKind::Peak
        }
    }

    /// Wire bytes, in the time-stamped layout when a timestamp is present
    pub fn encode(&self) -> Bytes {
        let (word0, word1) = encode_peak_words(self.id, self.wavelength_m);
        match self.timestamp_s {
            Some(ts) => {
                let raw = TimestampedPeakPayloadRaw {
                    lsb: U32::new(word0),
                    msb: U32::new(word1),
                    timestamp: U32::new((ts / PEAK_TIMESTAMP_TICK_S).round() as u32),
                };
                Bytes::copy_from_slice(raw.as_bytes())
            }
            None => {
                let raw = PeakPayloadRaw {
                    lsb: U32::new(word0),
                    msb: U32::new(word1),
                };
                Bytes::copy_from_slice(raw.as_bytes())
            }
        }
    }
}

impl fmt::Display for PeakRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Wavelength: {:.10e} m", self.id, self.wavelength_m)?;
        if let Some(ts) = self.timestamp_s {
            write!(f, " Timestamp: {:.9} s", ts)?;
        }
        Ok(())
    }
}

impl PayloadRecord for PeakPayloadRaw {
    const KIND: RecordKind = RecordKind::Peak;
    type Output = PeakRecord;

    fn interpret(&self) -> PeakRecord {
        PeakRecord {
            id: decode_id(self.lsb.get()),
            wavelength_m: decode_wavelength(self.lsb.get(), self.msb.get()),
            timestamp_s: None,
        }
    }
}

impl PayloadRecord for TimestampedPeakPayloadRaw {
    const KIND: RecordKind = RecordKind::TimestampedPeak;
    type Output = PeakRecord;

    fn interpret(&self) -> PeakRecord {
        PeakRecord {
            id: decode_id(self.lsb.get()),
            wavelength_m: decode_wavelength(self.lsb.get(), self.msb.get()),
            timestamp_s: Some(decode_timestamp(self.timestamp.get())),
        }
    }
}

/// First record of a spectral sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpectralInfoRecord {
    pub id: SensorId,
    pub point_count: u32,
}

impl SpectralInfoRecord {
    pub fn encode(&self) -> Bytes {
        let raw = SpectralInfoRaw {
            id_word: U32::new(self.id.to_word_bits()),
            point_count: U32::new(self.point_count),
        };
        Bytes::copy_from_slice(raw.as_bytes())
    }
}

impl PayloadRecord for SpectralInfoRaw {
    const KIND: RecordKind = RecordKind::SpectralInfo;
    type Output = SpectralInfoRecord;

    fn interpret(&self) -> SpectralInfoRecord {
        SpectralInfoRecord {
            id: decode_id(self.id_word.get()),
            point_count: self.point_count.get(),
        }
    }
}

/// Four consecutive spectrum amplitudes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpectralSampleRecord {
    pub amplitudes: [i16; 4],
}

impl SpectralSampleRecord {
    pub fn encode(&self) -> Bytes {
        let raw = SpectralSampleRaw {
            amplitudes: self.amplitudes.map(I16::new),
        };
        Bytes::copy_from_slice(raw.as_bytes())
    }
}

impl PayloadRecord for SpectralSampleRaw {
    const KIND: RecordKind = RecordKind::SpectralSample;
    type Output = SpectralSampleRecord;

    fn interpret(&self) -> SpectralSampleRecord {
        SpectralSampleRecord {
            amplitudes: self.amplitudes.map(|a| a.get()),
        }
    }
}

/// Device-reported sensor anomaly class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ErrorKind {
    #[strum(to_string = "Missing Peak")]
    MissingPeak,
    #[strum(to_string = "Multiple Peaks")]
    MultiplePeaks,
    #[strum(to_string = "Internal Error")]
    Internal,
}

impl ErrorKind {
    pub fn from_error_id(error_id: u32) -> Self {
        match error_id {
            ERROR_ID_MISSING_PEAK => ErrorKind::MissingPeak,
            ERROR_ID_MULTIPLE_PEAKS => ErrorKind::MultiplePeaks,
            _ => ErrorKind::Internal,
        }
    }

    /// Likely causes, as documented for the interrogator
    pub fn causes(&self) -> &'static [&'static str] {
        match self {
            ErrorKind::MissingPeak => &[
                "Misconfiguration of sensor wavelength range or threshold",
                "Disconnected sensor",
            ],
            ErrorKind::MultiplePeaks => &["Misconfiguration of sensor wavelength range or threshold"],
            ErrorKind::Internal => &[
                "Transient mismatch of configuration and data stream",
                "Internal failure",
            ],
        }
    }
}

/// Sensor-level anomaly reported in-band. Not a protocol error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorRecord {
    pub error_id: u32,
    pub kind: ErrorKind,
    /// Sensor the error refers to; `None` for internal errors
    pub id: Option<SensorId>,
    pub description: u32,
}

impl ErrorRecord {
    pub fn encode(&self) -> Bytes {
        let raw = ErrorPayloadRaw {
            error_id: U32::new(self.error_id),
            description: U32::new(self.description),
        };
        Bytes::copy_from_slice(raw.as_bytes())
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "{} ({}) on {}", self.kind, self.error_id, id),
            None => write!(f, "{} ({})", self.kind, self.error_id),
        }
    }
}

impl PayloadRecord for ErrorPayloadRaw {
    const KIND: RecordKind = RecordKind::Error;
    type Output = ErrorRecord;

    fn interpret(&self) -> ErrorRecord {
        let error_id = self.error_id.get();
        let description = self.description.get();
        let kind = ErrorKind::from_error_id(error_id);
        let id = match kind {
            ErrorKind::Internal => None,
            _ => Some(decode_id(description)),
        };

        ErrorRecord {
            error_id,
            kind,
            id,
            description,
        }
    }
}

/// Trailing record of every packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlagRecord {
    pub sweep_counter: u32,
    pub reserved: u32,
}

impl FlagRecord {
    pub fn encode(&self) -> Bytes {
        let raw = FlagRaw {
            sweep_counter: U32::new(self.sweep_counter),
            reserved: U32::new(self.reserved),
        };
        Bytes::copy_from_slice(raw.as_bytes())
    }
}

impl PayloadRecord for FlagRaw {
    const KIND: RecordKind = RecordKind::Flag;
    type Output = FlagRecord;

    fn interpret(&self) -> FlagRecord {
        FlagRecord {
            sweep_counter: self.sweep_counter.get(),
            reserved: self.reserved.get(),
        }
    }
}

/// Any decoded record, for callers that select the kind at runtime
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Payload {
    Peak(PeakRecord),
    SpectralInfo(SpectralInfoRecord),
    SpectralSample(SpectralSampleRecord),
    Error(ErrorRecord),
    Flag(FlagRecord),
}

/// Decode one record whose kind is only known at runtime.
pub fn decode_payload(kind: RecordKind, bytes: &[u8]) -> Result<Payload, I4Error> {
    Ok(match kind {
        RecordKind::Peak => Payload::Peak(decode_record::<PeakPayloadRaw>(bytes)?),
        RecordKind::TimestampedPeak => Payload::Peak(decode_record::<TimestampedPeakPayloadRaw>(bytes)?),
        RecordKind::SpectralInfo => Payload::SpectralInfo(decode_record::<SpectralInfoRaw>(bytes)?),
        RecordKind::SpectralSample => Payload::SpectralSample(decode_record::<SpectralSampleRaw>(bytes)?),
        RecordKind::Error => Payload::Error(decode_record::<ErrorPayloadRaw>(bytes)?),
        RecordKind::Flag => Payload::Flag(decode_record::<FlagRaw>(bytes)?),
    })
}

/// Spectral sweep: one info record followed by amplitude samples
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumFrame {
    pub info: SpectralInfoRecord,
    pub samples: Vec<SpectralSampleRecord>,
}

impl SpectrumFrame {
    /// All amplitudes in wire order
    pub fn amplitudes(&self) -> impl Iterator<Item = i16> + '_ {
        self.samples.iter().flat_map(|s| s.amplitudes)
    }

    /// Whether the advertised point count matches the samples received
    pub fn is_complete(&self) -> bool {
        self.info.point_count as usize == self.samples.len() * 4
    }
}
