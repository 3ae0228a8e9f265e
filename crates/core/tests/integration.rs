//! Integration tests: real UDP datagrams in, reassembled frames out.
//!
//! Each test binds a receiver on an OS-chosen localhost port, sends
//! crafted packets from a plain `std::net::UdpSocket`, and collects frames
//! over a channel from the receiver's reader thread.

use std::net::UdpSocket;
use std::sync::mpsc;
use std::time::Duration;

use rtprx::{ReceiverConfig, RtpReceiver, VideoCodec, VideoFrame};

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

fn rtp_packet(pt: u8, ssrc: u32, seq: u16, ts: u32, marker: bool, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(12 + payload.len());
    buf.push(0x80);
    buf.push(((marker as u8) << 7) | (pt & 0x7F));
    buf.extend_from_slice(&seq.to_be_bytes());
    buf.extend_from_slice(&ts.to_be_bytes());
    buf.extend_from_slice(&ssrc.to_be_bytes());
    buf.extend_from_slice(payload);
    buf
}

fn start_receiver(config: ReceiverConfig) -> (RtpReceiver, mpsc::Receiver<VideoFrame>, UdpSocket) {
    let mut receiver = RtpReceiver::new(ReceiverConfig {
        bind_address: "127.0.0.1".to_string(),
        bind_port: 0,
        ..config
    });
    let (tx, rx) = mpsc::channel();
    receiver.on_frame(move |frame: &VideoFrame| {
        tx.send(frame.clone()).ok();
    });
    receiver.start().expect("receiver start");

    let sender = UdpSocket::bind("127.0.0.1:0").expect("bind sender");
    sender
        .connect(receiver.local_addr().expect("local addr"))
        .expect("connect sender");
    (receiver, rx, sender)
}

#[test]
fn h264_fu_a_frame_over_udp() {
    let (mut receiver, rx, sender) = start_receiver(ReceiverConfig::default());

    let ssrc = 0xDECAFBAD;
    sender
        .send(&rtp_packet(96, ssrc, 100, 9000, false, &[0x7C, 0x85, 1, 2, 3]))
        .unwrap();
    sender
        .send(&rtp_packet(96, ssrc, 101, 9000, false, &[0x7C, 0x05, 4, 5, 6]))
        .unwrap();
    sender
        .send(&rtp_packet(96, ssrc, 102, 9000, true, &[0x7C, 0x45, 7, 8, 9]))
        .unwrap();

    let frame = rx.recv_timeout(RECV_TIMEOUT).expect("frame");
    assert_eq!(frame.codec, VideoCodec::H264);
    assert_eq!(frame.timestamp, 9000);
    assert_eq!(frame.data, vec![0, 0, 0, 1, 0x65, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
    assert!(!frame.is_key_frame);

    receiver.close("test done");
}

#[test]
fn h264_key_frame_with_parameter_sets() {
    let (mut receiver, rx, sender) = start_receiver(ReceiverConfig::default());

    let ssrc = 0x1111;
    sender
        .send(&rtp_packet(96, ssrc, 1, 3000, false, &[0x67, 0x42, 0x00, 0x1E]))
        .unwrap();
    sender
        .send(&rtp_packet(96, ssrc, 2, 3000, false, &[0x68, 0xCE, 0x38, 0x80]))
        .unwrap();
    sender
        .send(&rtp_packet(96, ssrc, 3, 3000, true, &[0x65, 0x88, 0x84]))
        .unwrap();

    let frame = rx.recv_timeout(RECV_TIMEOUT).expect("frame");
    assert!(frame.is_key_frame);
    // three Annex-B units: SPS, PPS, IDR slice
    assert_eq!(
        frame.data,
        vec![
            0, 0, 0, 1, 0x67, 0x42, 0x00, 0x1E, //
            0, 0, 0, 1, 0x68, 0xCE, 0x38, 0x80, //
            0, 0, 0, 1, 0x65, 0x88, 0x84,
        ]
    );

    receiver.close("test done");
}

#[test]
fn stap_a_aggregate_over_udp() {
    let (mut receiver, rx, sender) = start_receiver(ReceiverConfig::default());

    // One STAP-A packet carrying NALs of 4, 1500, and 12 bytes.
    let nal_a = vec![0x41; 4];
    let nal_b = vec![0x41; 1500];
    let nal_c = vec![0x41; 12];
    let mut payload = vec![0x18];
    for nal in [&nal_a, &nal_b, &nal_c] {
        payload.extend_from_slice(&(nal.len() as u16).to_be_bytes());
        payload.extend_from_slice(nal);
    }
    sender
        .send(&rtp_packet(96, 0x7777, 40, 3000, true, &payload))
        .unwrap();

    let frame = rx.recv_timeout(RECV_TIMEOUT).expect("frame");
    // Three Annex-B units with the original sizes.
    assert_eq!(frame.data.len(), (4 + 4) + (4 + 1500) + (4 + 12));
    assert_eq!(&frame.data[..4], &[0, 0, 0, 1]);
    assert_eq!(&frame.data[8..12], &[0, 0, 0, 1]);
    assert_eq!(&frame.data[1512..1516], &[0, 0, 0, 1]);

    receiver.close("test done");
}

#[test]
fn vp8_single_packet_frame_over_udp() {
    let config = ReceiverConfig {
        payload_types: vec![(96, VideoCodec::Vp8)],
        ..ReceiverConfig::default()
    };
    let (mut receiver, rx, sender) = start_receiver(config);

    sender
        .send(&rtp_packet(96, 0x2222, 500, 12_000, true, &[0x10, 0x9D, 0x01, 0x2A, 0x77]))
        .unwrap();

    let frame = rx.recv_timeout(RECV_TIMEOUT).expect("frame");
    assert_eq!(frame.codec, VideoCodec::Vp8);
    assert_eq!(frame.data, vec![0x9D, 0x01, 0x2A, 0x77]);

    receiver.close("test done");
}

#[test]
fn frames_arrive_in_marker_order() {
    let (mut receiver, rx, sender) = start_receiver(ReceiverConfig::default());

    let ssrc = 0x3333;
    for i in 0u32..5 {
        let ts = 3000 + i * 3000;
        let seq = (10 + i) as u16;
        sender
            .send(&rtp_packet(96, ssrc, seq, ts, true, &[0x41, i as u8]))
            .unwrap();
    }

    for i in 0u32..5 {
        let frame = rx.recv_timeout(RECV_TIMEOUT).expect("frame");
        assert_eq!(frame.timestamp, 3000 + i * 3000);
        assert_eq!(frame.data, vec![0, 0, 0, 1, 0x41, i as u8]);
    }

    receiver.close("test done");
}

#[test]
fn rtcp_bye_resets_stream() {
    let (mut receiver, rx, sender) = start_receiver(ReceiverConfig::default());
    let (bye_tx, bye_rx) = mpsc::channel();
    receiver.on_bye(move |ssrc, reason| {
        bye_tx.send((ssrc, reason.map(str::to_owned))).ok();
    });

    let ssrc = 0x4444;
    sender
        .send(&rtp_packet(96, ssrc, 10, 3000, true, &[0x41, 0x01]))
        .unwrap();
    rx.recv_timeout(RECV_TIMEOUT).expect("first frame");

    // compound: empty RR + BYE with reason "bye"
    let mut rtcp = vec![0x80, 201, 0x00, 0x01];
    rtcp.extend_from_slice(&0x0Fu32.to_be_bytes());
    rtcp.extend_from_slice(&[0x81, 203, 0x00, 0x02]);
    rtcp.extend_from_slice(&ssrc.to_be_bytes());
    rtcp.extend_from_slice(&[3, b'b', b'y', b'e']);
    sender.send(&rtcp).unwrap();

    let (bye_ssrc, reason) = bye_rx.recv_timeout(RECV_TIMEOUT).expect("bye event");
    assert_eq!(bye_ssrc, ssrc);
    assert_eq!(reason.as_deref(), Some("bye"));

    // The SSRC starts a fresh stream afterwards.
    sender
        .send(&rtp_packet(96, ssrc, 20, 9000, true, &[0x41, 0x02]))
        .unwrap();
    let frame = rx.recv_timeout(RECV_TIMEOUT).expect("fresh frame");
    assert_eq!(frame.data, vec![0, 0, 0, 1, 0x41, 0x02]);
    assert_eq!(frame.stream_index, 1);

    receiver.close("test done");
}

#[test]
fn close_fires_callback_and_stops_delivery() {
    let (mut receiver, rx, sender) = start_receiver(ReceiverConfig::default());
    let (closed_tx, closed_rx) = mpsc::channel();
    receiver.on_closed(move |reason: &str| {
        closed_tx.send(reason.to_owned()).ok();
    });

    sender
        .send(&rtp_packet(96, 0x5555, 1, 3000, true, &[0x41, 0x01]))
        .unwrap();
    rx.recv_timeout(RECV_TIMEOUT).expect("frame before close");

    receiver.close("shutting down");
    receiver.close("again");
    assert_eq!(closed_rx.recv_timeout(RECV_TIMEOUT).unwrap(), "shutting down");
    assert!(closed_rx.try_recv().is_err());

    // Frames after close never arrive.
    sender
        .send(&rtp_packet(96, 0x5555, 2, 6000, true, &[0x41, 0x02]))
        .unwrap();
    assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
}
