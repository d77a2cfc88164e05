//! Header decoding against hand-assembled bytes

mod common;

use common::*;

#[test]
fn test_header_roundtrip_all_counters() {
    for counter in 0..4096u16 {
        for sweep_type in [SweepType::Peak, SweepType::Spectral, SweepType::TimestampedPeak] {
            for trigger_mode in [TriggerMode::Internal, TriggerMode::External] {
                let header = PacketHeader {
                    packet_counter: counter,
                    sweep_type,
                    trigger_mode,
                    data_offset: 16,
                    data_length: 96,
                    device_timestamp: 3_913_056_123_456_789_000,
                };
                assert_eq!(PacketHeader::decode(&header.encode()).unwrap(), header);
            }
        }
    }
}

#[test]
fn test_header_field_masks() {
    // info 0xFFFF: counter 4095, sweep 7 (reserved), external trigger
    let bytes = hex::decode("ffff1800ffffffff0000000000000000").unwrap();
    let header = PacketHeader::try_from(bytes.as_slice()).unwrap();
    assert_eq!(header.packet_counter, 4095);
    assert_eq!(header.sweep_type, SweepType::Reserved(7));
    assert_eq!(header.trigger_mode, TriggerMode::External);
    assert_eq!(header.data_offset, 24);
    assert_eq!(header.data_length, u32::MAX);
    assert!(header.has_error_payload());
}

#[test]
fn test_header_spectral_internal() {
    // info 0x1abc: counter 0xabc, sweep 1, internal trigger
    let bytes = hex::decode("bc1a100050000000").unwrap();
    let mut full = bytes.clone();
    full.extend_from_slice(&[0u8; 8]);
    let header = PacketHeader::decode(&full).unwrap();
    assert_eq!(header.packet_counter, 0xABC);
    assert_eq!(header.sweep_type, SweepType::Spectral);
    assert_eq!(header.trigger_mode, TriggerMode::Internal);
    assert_eq!(header.data_length, 80);

    assert!(matches!(
        PacketHeader::decode(&bytes),
        Err(I4Error::MalformedHeader { expected: 16, actual: 8 })
    ));
}

#[test]
fn test_header_device_time() {
    let header = PacketHeader {
        packet_counter: 0,
        sweep_type: SweepType::Peak,
        trigger_mode: TriggerMode::Internal,
        data_offset: 16,
        data_length: 0,
        // 2024-01-01T00:00:00Z in NTP-epoch nanoseconds
        device_timestamp: (1_704_067_200 + 2_208_988_800) * 1_000_000_000,
    };
    let time = header.device_time().unwrap();
    assert_eq!(time.to_rfc3339(), "2024-01-01T00:00:00+00:00");
}
