//! One protocol cycle at a time: header, optional error payload, data
//! records, trailing flag.
//!
//! ```text
//! AwaitingHeader ─► AwaitingErrorPayload ─► AwaitingPayloadRecords(n) ─► AwaitingFlag ─┐
//!       ▲             (data_offset != 16)                                             │
//!       └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The stream has no sync marker. Any short read or malformed block leaves
//! the sequencer `Desynchronized` and every later call fails; the caller has
//! to reconnect.

use crate::calibration::{CalibrationEngine, ForceReading};
use crate::constants::{ERROR_PAYLOAD_SIZE, FLAG_SIZE, HEADER_SIZE, PACKET_COUNTER_MODULO, SPECTRAL_PAYLOAD_SIZE};
use crate::error::I4Error;
use crate::header::{PacketHeader, SweepType};
use crate::payload::{
    ErrorPayloadRaw, ErrorRecord, FlagRaw, FlagRecord, PayloadRecord, PeakPayloadRaw, PeakRecord, RecordKind,
    SpectralInfoRaw, SpectralSampleRaw, SpectrumFrame, TimestampedPeakPayloadRaw, decode_record,
};
use crate::transport::Transport;
use strum_macros::Display;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Upper bound on records reserved up front; `data_length` is untrusted until the records arrive
const MAX_PREALLOCATED_RECORDS: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SequencerState {
    AwaitingHeader,
    AwaitingErrorPayload,
    /// Records still to read in the current frame
    AwaitingPayloadRecords(usize),
    AwaitingFlag,
    Desynchronized,
}

/// How the data section of a frame is laid out, derived from the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLayout {
    Peaks { kind: RecordKind, count: usize },
    /// One info record then `samples` sample records
    Spectrum { samples: usize },
}

impl FrameLayout {
    pub fn for_header(header: &PacketHeader) -> Result<Self, I4Error> {
        let data_length = header.data_length;
        let mismatch = |record_size| I4Error::DataLengthMismatch {
            data_length,
            record_size,
        };

        match header.sweep_type {
            SweepType::Peak | SweepType::TimestampedPeak => {
                let kind = if header.sweep_type == SweepType::Peak {
                    RecordKind::Peak
                } else {
                    RecordKind::TimestampedPeak
                };
                let size = kind.size();
                if data_length as usize % size != 0 {
                    return Err(mismatch(size));
                }
                Ok(FrameLayout::Peaks {
                    kind,
                    count: data_length as usize / size,
                })
            }
            SweepType::Spectral => {
                if data_length == 0 || data_length as usize % SPECTRAL_PAYLOAD_SIZE != 0 {
                    return Err(mismatch(SPECTRAL_PAYLOAD_SIZE));
                }
                Ok(FrameLayout::Spectrum {
                    samples: data_length as usize / SPECTRAL_PAYLOAD_SIZE - 1,
                })
            }
            SweepType::Reserved(value) => Err(I4Error::UnknownSweepType(value)),
        }
    }

    /// Number of data records, info record included
    pub fn record_count(&self) -> usize {
        match self {
            FrameLayout::Peaks { count, .. } => *count,
            FrameLayout::Spectrum { samples } => samples + 1,
        }
    }
}

/// A peak together with its force, when the grating has a reference
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub peak: PeakRecord,
    pub force: Option<ForceReading>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameData {
    Peaks(Vec<Measurement>),
    Spectrum(SpectrumFrame),
}

/// Everything decoded from one protocol cycle
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub header: PacketHeader,
    pub error: Option<ErrorRecord>,
    pub data: FrameData,
    pub flag: FlagRecord,
}

impl Frame {
    pub fn measurements(&self) -> &[Measurement] {
        match &self.data {
            FrameData::Peaks(measurements) => measurements,
            FrameData::Spectrum(_) => &[],
        }
    }

    pub fn forces(&self) -> impl Iterator<Item = &ForceReading> + '_ {
        self.measurements().iter().filter_map(|m| m.force.as_ref())
    }
}

pub struct FrameSequencer<T> {
    transport: T,
    calibration: CalibrationEngine,
    state: SequencerState,
    frames: u64,
    dropped_packets: u64,
    last_counter: Option<u16>,
}

impl<T: Transport> FrameSequencer<T> {
    pub fn new(transport: T, calibration: CalibrationEngine) -> Self {
        Self {
            transport,
            calibration,
            state: SequencerState::AwaitingHeader,
            frames: 0,
            dropped_packets: 0,
            last_counter: None,
        }
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    /// Frames decoded so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Packets missing according to the header counter
    pub fn dropped_packets(&self) -> u64 {
        self.dropped_packets
    }

    /// Read and decode one complete frame.
    pub async fn next_frame(&mut self) -> Result<Frame, I4Error> {
        if self.state == SequencerState::Desynchronized {
            return Err(I4Error::Desynchronized);
        }

        match self.read_frame().await {
            Ok(frame) => Ok(frame),
            Err(e) => {
                warn!("Framing lost while {}: {}", self.state, e);
                self.state = SequencerState::Desynchronized;
                Err(e)
            }
        }
    }

    /// Decode frames until `stop` reads `true` or an error occurs.
    ///
    /// `stop` is only checked between frames; a read in progress is never
    /// abandoned. Returns the number of frames handed to `on_frame`.
    pub async fn run<F>(&mut self, stop: &watch::Receiver<bool>, mut on_frame: F) -> Result<u64, I4Error>
    where
        F: FnMut(Frame),
    {
        let mut completed = 0;
        while !*stop.borrow() {
            let frame = self.next_frame().await?;
            on_frame(frame);
            completed += 1;
        }
        debug!("Stop requested after {} frames", completed);
        Ok(completed)
    }

    async fn read_frame(&mut self) -> Result<Frame, I4Error> {
        self.state = SequencerState::AwaitingHeader;
        let header = PacketHeader::decode(&self.transport.read_block(HEADER_SIZE).await?)?;
        debug!("Header: {}", header);
        self.track_counter(header.packet_counter);

        let error = if header.has_error_payload() {
            self.state = SequencerState::AwaitingErrorPayload;
            let bytes = self.transport.read_block(ERROR_PAYLOAD_SIZE).await?;
            let record = decode_record::<ErrorPayloadRaw>(&bytes)?;
            info!("Device reported {}", record);
            Some(record)
        } else {
            None
        };

        let data = match FrameLayout::for_header(&header)? {
            FrameLayout::Peaks {
                kind: RecordKind::TimestampedPeak,
                count,
            } => FrameData::Peaks(self.read_peaks::<TimestampedPeakPayloadRaw>(count).await?),
            FrameLayout::Peaks { count, .. } => FrameData::Peaks(self.read_peaks::<PeakPayloadRaw>(count).await?),
            FrameLayout::Spectrum { samples } => FrameData::Spectrum(self.read_spectrum(samples).await?),
        };

        self.state = SequencerState::AwaitingFlag;
        let flag = decode_record::<FlagRaw>(&self.transport.read_block(FLAG_SIZE).await?)?;
        debug!("Sweep counter: {}", flag.sweep_counter);

        self.state = SequencerState::AwaitingHeader;
        self.frames += 1;

        Ok(Frame {
            header,
            error,
            data,
            flag,
        })
    }

    async fn read_peaks<R>(&mut self, count: usize) -> Result<Vec<Measurement>, I4Error>
    where
        R: PayloadRecord<Output = PeakRecord>,
    {
        let mut measurements = Vec::with_capacity(count.min(MAX_PREALLOCATED_RECORDS));
        for remaining in (1..=count).rev() {
            self.state = SequencerState::AwaitingPayloadRecords(remaining);
            let bytes = self.transport.read_block(R::KIND.size()).await?;
            let peak = decode_record::<R>(&bytes)?;
            let force = self.calibration.force_for(&peak);
            match &force {
                Some(reading) => debug!("{}", reading),
                None => debug!("{}", peak),
            }
            measurements.push(Measurement { peak, force });
        }
        Ok(measurements)
    }

    async fn read_spectrum(&mut self, samples: usize) -> Result<SpectrumFrame, I4Error> {
        self.state = SequencerState::AwaitingPayloadRecords(samples + 1);
        let info = decode_record::<SpectralInfoRaw>(&self.transport.read_block(SPECTRAL_PAYLOAD_SIZE).await?)?;
        debug!("Spectrum of {} points on {}", info.point_count, info.id);

        let mut records = Vec::with_capacity(samples.min(MAX_PREALLOCATED_RECORDS));
        for remaining in (1..=samples).rev() {
            self.state = SequencerState::AwaitingPayloadRecords(remaining);
            let bytes = self.transport.read_block(SPECTRAL_PAYLOAD_SIZE).await?;
            records.push(decode_record::<SpectralSampleRaw>(&bytes)?);
        }

        let spectrum = SpectrumFrame { info, samples: records };
        if !spectrum.is_complete() {
            debug!(
                "Point count {} does not match {} received amplitudes",
                spectrum.info.point_count,
                spectrum.samples.len() * 4
            );
        }
        Ok(spectrum)
    }

    fn track_counter(&mut self, counter: u16) {
        if let Some(last) = self.last_counter {
            let expected = (last + 1) % PACKET_COUNTER_MODULO;
            if counter != expected {
                let gap = (counter + PACKET_COUNTER_MODULO - expected) % PACKET_COUNTER_MODULO;
                self.dropped_packets += u64::from(gap);
                warn!("Packet counter jumped from {} to {} ({} missing)", last, counter, gap);
            }
        }
        self.last_counter = Some(counter);
    }
}
