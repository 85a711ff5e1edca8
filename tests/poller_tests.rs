//! Tests for the poll orchestrator: cycle ordering, per-address failure
//! isolation, and bus-fatal propagation.

use pulsar_mbus::mbus::frame::{calculate_checksum, MBusFrame, MBusFrameType};
use pulsar_mbus::mbus::serial_mock::MockTransport;
use pulsar_mbus::{
    MBusError, MeasurementRole, MeterAddress, MeterPoller, RecordMap,
};

fn addresses(list: &[&str]) -> Vec<MeterAddress> {
    list.iter().map(|s| s.parse().unwrap()).collect()
}

/// A complete variable-data response carrying the documented example values:
/// energy counter 1744500, volume 120, flow 0.450, temperatures 62/38.
fn data_response(address: u8) -> MBusFrame {
    let mut data = vec![
        0x78, 0x56, 0x34, 0x12, // ident 12345678
        0x24, 0x40, // manufacturer "PAD"
        0x01, 0x04, 0x01, 0x00, 0x00, 0x00,
    ];
    data.extend_from_slice(&[
        0x0C, 0x03, 0x00, 0x45, 0x74, 0x01, // 0: energy counter
        0x04, 0x6D, 0x1E, 0x0C, 0xEE, 0x25, // 1: timestamp
        0x0C, 0x16, 0x20, 0x01, 0x00, 0x00, // 2: volume
        0x0A, 0x2B, 0x33, 0x03, // 3: power
        0x0B, 0x3B, 0x50, 0x04, 0x00, // 4: flow
        0x0A, 0x5B, 0x62, 0x00, // 5: flow temperature
        0x0A, 0x5F, 0x38, 0x00, // 6: return temperature
    ]);

    let mut frame = MBusFrame {
        frame_type: MBusFrameType::Long,
        control: 0x08,
        address,
        control_information: 0x72,
        data,
        checksum: 0,
    };
    frame.checksum = calculate_checksum(&frame);
    frame
}

/// A full cycle over three meters maps every record position to its role
/// with the documented scaling and rounding.
#[tokio::test(start_paused = true)]
async fn test_poll_all_three_meters() {
    let mut mock = MockTransport::new();
    for addr in [0x79, 0x82, 0x22] {
        mock.push_reply(&[0xE5]);
        mock.push_frame(&data_response(addr));
    }

    let mut poller = MeterPoller::with_default_map(mock, addresses(&["79", "82", "22"]));
    let result = poller.poll_all().await.unwrap();

    assert_eq!(result.len(), 3);
    let reading = &result[&"79".parse::<MeterAddress>().unwrap()];
    assert_eq!(reading.get(MeasurementRole::Energy), Some(1.5));
    assert_eq!(reading.get(MeasurementRole::Volume), Some(120.0));
    assert_eq!(reading.get(MeasurementRole::FlowRate), Some(0.45));
    assert_eq!(reading.get(MeasurementRole::TempIn), Some(62.0));
    assert_eq!(reading.get(MeasurementRole::TempOut), Some(38.0));

    // Three wakeups and three requests, interleaved per address.
    assert_eq!(poller.into_transport().writes().len(), 6);
}

/// One unresponsive meter is logged and omitted; the cycle still delivers
/// the other readings.
#[tokio::test(start_paused = true)]
async fn test_failed_address_is_omitted() {
    let mut mock = MockTransport::new();
    // 0x79 answers.
    mock.push_reply(&[0xE5]);
    mock.push_frame(&data_response(0x79));
    // 0x82 never acknowledges: four silent attempt windows.
    for _ in 0..4 {
        mock.push_timeout();
    }
    // 0x22 answers.
    mock.push_reply(&[0xE5]);
    mock.push_frame(&data_response(0x22));

    let mut poller = MeterPoller::with_default_map(mock, addresses(&["79", "82", "22"]));
    let result = poller.poll_all().await.unwrap();

    assert_eq!(result.len(), 2);
    assert!(result.contains_key(&"79".parse::<MeterAddress>().unwrap()));
    assert!(!result.contains_key(&"82".parse::<MeterAddress>().unwrap()));
    assert!(result.contains_key(&"22".parse::<MeterAddress>().unwrap()));
}

/// A corrupt data frame fails only its own address.
#[tokio::test(start_paused = true)]
async fn test_corrupt_data_frame_is_isolated() {
    let mut corrupt = pack(&data_response(0x79));
    let checksum_pos = corrupt.len() - 2;
    corrupt[checksum_pos] = corrupt[checksum_pos].wrapping_add(1);

    let mut mock = MockTransport::new();
    mock.push_reply(&[0xE5]);
    mock.push_reply(&corrupt);
    mock.push_reply(&[0xE5]);
    mock.push_frame(&data_response(0x82));

    let mut poller = MeterPoller::with_default_map(mock, addresses(&["79", "82"]));
    let result = poller.poll_all().await.unwrap();

    assert_eq!(result.len(), 1);
    assert!(result.contains_key(&"82".parse::<MeterAddress>().unwrap()));
}

/// A dead port aborts the whole cycle; later addresses are never attempted.
#[tokio::test(start_paused = true)]
async fn test_bus_fatal_error_aborts_cycle() {
    let mut mock = MockTransport::new();
    mock.push_reply(&[0xE5]);
    mock.push_frame(&data_response(0x79));
    mock.push_port_error("device unplugged");

    let mut poller = MeterPoller::with_default_map(mock, addresses(&["79", "82", "22"]));
    let err = poller.poll_all().await.unwrap_err();

    assert!(matches!(err, MBusError::SerialPortError(_)));
    // Two wakeups went out (0x79 and 0x82); 0x22 was never reached.
    assert_eq!(poller.into_transport().writes().len(), 3);
}

/// A failed write is bus-fatal and aborts the cycle up front.
#[tokio::test(start_paused = true)]
async fn test_write_failure_aborts_cycle() {
    let mut mock = MockTransport::new();
    mock.fail_writes("device unplugged");

    let mut poller = MeterPoller::with_default_map(mock, addresses(&["79", "82"]));
    let err = poller.poll_all().await.unwrap_err();

    assert!(matches!(err, MBusError::SerialPortError(_)));
}

/// A custom record map changes which positions feed the reading.
#[tokio::test(start_paused = true)]
async fn test_custom_record_map() {
    let map: RecordMap = serde_json::from_str(
        r#"[
            {"index": 3, "role": "energy", "divisor": 1000.0, "decimals": 3},
            {"index": 5, "role": "temp_in"}
        ]"#,
    )
    .unwrap();

    let mut mock = MockTransport::new();
    mock.push_reply(&[0xE5]);
    mock.push_frame(&data_response(0x79));

    let mut poller = MeterPoller::new(mock, addresses(&["79"]), map);
    let result = poller.poll_all().await.unwrap();
    let reading = &result[&"79".parse::<MeterAddress>().unwrap()];

    assert_eq!(reading.get(MeasurementRole::Energy), Some(0.333));
    assert_eq!(reading.get(MeasurementRole::TempIn), Some(62.0));
    assert_eq!(reading.get(MeasurementRole::Volume), None);
}

fn pack(frame: &MBusFrame) -> Vec<u8> {
    pulsar_mbus::mbus::frame::pack_frame(frame)
}
