//! Common test utilities: a synthetic interrogator stream builder

// Shared across test files; not every file uses every helper
#[allow(unused_imports)]
pub use i4_lib::calibration::{CalibrationEngine, ReferenceTable};
#[allow(unused_imports)]
pub use i4_lib::error::I4Error;
#[allow(unused_imports)]
pub use i4_lib::header::{PacketHeader, SweepType, TriggerMode};
#[allow(unused_imports)]
pub use i4_lib::ids::SensorId;
#[allow(unused_imports)]
pub use i4_lib::payload::{ErrorKind, ErrorRecord, FlagRecord, PeakRecord, SpectralInfoRecord, SpectralSampleRecord};
#[allow(unused_imports)]
pub use i4_lib::sequencer::{Frame, FrameData, FrameSequencer, SequencerState};

/// Builds the bytes of one protocol cycle
#[allow(dead_code)]
pub struct FrameBuilder {
    header: PacketHeader,
    error: Option<ErrorRecord>,
    body: Vec<u8>,
    flag: FlagRecord,
}

#[allow(dead_code)]
impl FrameBuilder {
    pub fn new(sweep_type: SweepType, packet_counter: u16) -> Self {
        Self {
            header: PacketHeader {
                packet_counter,
                sweep_type,
                trigger_mode: TriggerMode::Internal,
                data_offset: 16,
                data_length: 0,
                device_timestamp: 3_913_056_000_000_000_000,
            },
            error: None,
            body: Vec::new(),
            flag: FlagRecord {
                sweep_counter: u32::from(packet_counter),
                reserved: 0,
            },
        }
    }

    /// Attach an error payload; the header data offset moves past it
    pub fn error(mut self, error_id: u32, description: u32) -> Self {
        self.header.data_offset = 24;
        self.error = Some(ErrorRecord {
            error_id,
            kind: ErrorKind::from_error_id(error_id),
            id: None,
            description,
        });
        self
    }

    pub fn peak(mut self, peak: PeakRecord) -> Self {
        self.body.extend_from_slice(&peak.encode());
        self
    }

    pub fn spectral_info(mut self, info: SpectralInfoRecord) -> Self {
        self.body.extend_from_slice(&info.encode());
        self
    }

    pub fn spectral_sample(mut self, amplitudes: [i16; 4]) -> Self {
        self.body.extend_from_slice(&SpectralSampleRecord { amplitudes }.encode());
        self
    }

    /// Override the advertised data length (defaults to the body size)
    pub fn data_length(mut self, data_length: u32) -> Self {
        self.header.data_length = data_length;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut header = self.header;
        if header.data_length == 0 {
            header.data_length = self.body.len() as u32;
        }

        let mut out = header.encode().to_vec();
        if let Some(error) = self.error {
            out.extend_from_slice(&error.encode());
        }
        out.extend_from_slice(&self.body);
        out.extend_from_slice(&self.flag.encode());
        out
    }
}

#[allow(dead_code)]
pub fn peak(channel: u8, sensor: u8, wavelength_nm: f64) -> PeakRecord {
    PeakRecord {
        id: SensorId::new(channel, 0, sensor),
        wavelength_m: wavelength_nm / 1e9,
        timestamp_s: None,
    }
}

#[allow(dead_code)]
pub fn timestamped_peak(channel: u8, sensor: u8, wavelength_nm: f64, timestamp_s: f64) -> PeakRecord {
    PeakRecord {
        timestamp_s: Some(timestamp_s),
        ..peak(channel, sensor, wavelength_nm)
    }
}

#[allow(dead_code)]
pub fn sequencer(bytes: &[u8]) -> FrameSequencer<&[u8]> {
    FrameSequencer::new(bytes, CalibrationEngine::default())
}
