pub mod calibration;
pub mod constants;
pub mod error;
pub mod header;
pub mod ids;
pub mod payload;
pub mod relay;
pub mod sequencer;
pub mod transport;

pub use calibration::{CalibrationEngine, ForceReading, ReferenceTable, compute_force};
pub use error::I4Error;
pub use header::{PacketHeader, SweepType, TriggerMode};
pub use ids::{SensorId, decode_id, decode_timestamp, decode_wavelength};
pub use payload::{
    ErrorKind, ErrorRecord, FlagRecord, Payload, PeakRecord, RecordKind, SpectralInfoRecord, SpectralSampleRecord,
    SpectrumFrame, decode_payload,
};
pub use relay::{ForceFrame, ForceRelay, read_force_frame};
pub use sequencer::{Frame, FrameData, FrameSequencer, Measurement, SequencerState};
pub use transport::Transport;
