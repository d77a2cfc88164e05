// Protocol constants for the I4 interrogator stream

/// Size of the packet header (16 bytes)
pub const HEADER_SIZE: usize = 16;

/// Size of the optional error payload (8 bytes)
pub const ERROR_PAYLOAD_SIZE: usize = 8;

/// Size of a peak record (8 bytes)
pub const PEAK_PAYLOAD_SIZE: usize = 8;

/// Size of a time-stamped peak record (12 bytes)
pub const TS_PEAK_PAYLOAD_SIZE: usize = 12;

/// Size of the spectral info record and of each spectral sample record (8 bytes)
pub const SPECTRAL_PAYLOAD_SIZE: usize = 8;

/// Size of the trailing flag record (8 bytes)
pub const FLAG_SIZE: usize = 8;

/// Data offset value meaning "no error payload precedes the data"
pub const NO_ERROR_DATA_OFFSET: u16 = 16;

/// Packet counter is 12 bits wide and wraps at this value
pub const PACKET_COUNTER_MODULO: u16 = 0x1000;

/// Mask keeping the wavelength bits of the peak LSB word
pub const WAVELENGTH_WORD_MASK: u32 = 0xFFFF_0000;

/// Fixed mantissa pattern substituted for the id bits
pub const WAVELENGTH_FILL: u32 = 0x7FFF;

/// Seconds per tick of the per-peak timestamp (0.5 ns)
pub const PEAK_TIMESTAMP_TICK_S: f64 = 5e-10;

/// Seconds between the NTP epoch (1900) and the Unix epoch (1970)
pub const NTP_UNIX_OFFSET_S: i64 = 2_208_988_800;

/// Device error id: no peak where one was expected
pub const ERROR_ID_MISSING_PEAK: u32 = 500;

/// Device error id: more peaks than expected in a sensor range
pub const ERROR_ID_MULTIPLE_PEAKS: u32 = 501;

/// Size of a relayed force frame (3 id bytes + f64)
pub const FORCE_FRAME_SIZE: usize = 11;

/// Default interrogator TCP port for the peak stream
pub const PEAK_STREAM_PORT: u16 = 9931;

/// Default interrogator TCP port for the spectral stream
pub const SPECTRAL_STREAM_PORT: u16 = 9932;

/// Default port of the force relay server
pub const FORCE_RELAY_PORT: u16 = 4578;
