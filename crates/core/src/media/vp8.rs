use super::{Depacketizer, DepacketizerDiag, FrameData, VideoCodec};

/// Parsed VP8 payload descriptor (RFC 7741 §4.2).
///
/// ```text
///       0 1 2 3 4 5 6 7
///      +-+-+-+-+-+-+-+-+
///      |X|R|N|S|R| PID | (REQUIRED)
///      +-+-+-+-+-+-+-+-+
/// X:   |I|L|T|K| RSV   | (OPTIONAL)
///      +-+-+-+-+-+-+-+-+
/// I:   |M| PictureID   | (OPTIONAL, 7 or 15 bits by M)
///      +-+-+-+-+-+-+-+-+
/// L:   |   TL0PICIDX   | (OPTIONAL)
///      +-+-+-+-+-+-+-+-+
/// T/K: |TID|Y| KEYIDX  | (OPTIONAL, one byte shared)
///      +-+-+-+-+-+-+-+-+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PayloadDescriptor {
    /// S bit: this payload begins a VP8 partition.
    start_of_partition: bool,
    /// Partition index, 0 for the first partition of a frame.
    partition_index: u8,
    /// Total descriptor length; frame bytes start here.
    len: usize,
}

/// Parse the descriptor, skipping the optional extension fields.
///
/// `None` when the descriptor claims more bytes than the payload carries.
fn parse_descriptor(payload: &[u8]) -> Option<PayloadDescriptor> {
    let b0 = *payload.first()?;
    let extended = b0 & 0x80 != 0;
    let start_of_partition = b0 & 0x10 != 0;
    let partition_index = b0 & 0x0F;

    let mut len = 1;
    if extended {
        let x = *payload.get(1)?;
        len = 2;
        if x & 0x80 != 0 {
            // PictureID: one byte, two when the M bit is set
            let pid = *payload.get(len)?;
            len += if pid & 0x80 != 0 { 2 } else { 1 };
        }
        if x & 0x40 != 0 {
            len += 1; // TL0PICIDX
        }
        if x & 0x30 != 0 {
            len += 1; // TID / KEYIDX share one byte
        }
    }
    if payload.len() < len {
        return None;
    }
    Some(PayloadDescriptor {
        start_of_partition,
        partition_index,
        len,
    })
}

/// VP8 RTP depacketizer (RFC 7741).
///
/// Strips each packet's payload descriptor and concatenates the remaining
/// bytes into the raw frame, in packet order. The first accepted packet of
/// a frame must carry the S bit; packets before a start are discarded.
///
/// The key-frame flag comes from the inverted P bit of the first frame
/// byte — a VP8 frame tag with P=0 is a key frame (RFC 7741 §4.3).
#[derive(Debug)]
pub struct Vp8Depacketizer {
    max_frame_size: usize,
    diag: DepacketizerDiag,
}

impl Vp8Depacketizer {
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            max_frame_size,
            diag: DepacketizerDiag::default(),
        }
    }
}

impl Depacketizer for Vp8Depacketizer {
    fn codec(&self) -> VideoCodec {
        VideoCodec::Vp8
    }

    /// A frame opens with the S bit on partition 0.
    fn is_frame_start(&self, payload: &[u8]) -> bool {
        parse_descriptor(payload).is_some_and(|d| d.start_of_partition && d.partition_index == 0)
    }

    fn reassemble(&mut self, payloads: &[&[u8]]) -> Option<FrameData> {
        let mut out: Vec<u8> = Vec::new();
        let mut is_key_frame = false;
        let mut started = false;

        for &payload in payloads {
            let Some(descriptor) = parse_descriptor(payload) else {
                self.diag.fragments_dropped += 1;
                tracing::warn!("malformed VP8 payload descriptor, packet dropped");
                continue;
            };

            if !started {
                if !descriptor.start_of_partition {
                    self.diag.fragments_dropped += 1;
                    tracing::warn!(
                        partition_index = descriptor.partition_index,
                        "VP8 packet before frame start dropped"
                    );
                    continue;
                }
                started = true;
                if descriptor.partition_index == 0 {
                    if let Some(&tag) = payload.get(descriptor.len) {
                        is_key_frame = tag & 0x01 == 0;
                    }
                }
            }

            let data = &payload[descriptor.len..];
            if out.len() + data.len() > self.max_frame_size {
                self.diag.oversize_frames += 1;
                tracing::warn!(max = self.max_frame_size, "oversize VP8 frame discarded");
                return None;
            }
            out.extend_from_slice(data);
        }

        if !started || out.is_empty() {
            return None;
        }
        Some(FrameData {
            data: out,
            is_key_frame,
        })
    }

    fn diagnostics(&self) -> DepacketizerDiag {
        self.diag
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_depacketizer() -> Vp8Depacketizer {
        Vp8Depacketizer::new(1_048_576)
    }

    // --- Descriptor parsing ---

    #[test]
    fn minimal_descriptor() {
        let d = parse_descriptor(&[0x10, 0xAA]).unwrap();
        assert!(d.start_of_partition);
        assert_eq!(d.partition_index, 0);
        assert_eq!(d.len, 1);
    }

    #[test]
    fn descriptor_without_start_bit() {
        let d = parse_descriptor(&[0x00, 0xAA]).unwrap();
        assert!(!d.start_of_partition);
    }

    #[test]
    fn descriptor_partition_index() {
        let d = parse_descriptor(&[0x03, 0xAA]).unwrap();
        assert_eq!(d.partition_index, 3);
    }

    #[test]
    fn extended_short_picture_id() {
        // X set; I set; 7-bit PictureID
        let d = parse_descriptor(&[0x90, 0x80, 0x12, 0xAA]).unwrap();
        assert_eq!(d.len, 3);
    }

    #[test]
    fn extended_long_picture_id() {
        // X set; I set; M bit makes PictureID 15-bit
        let d = parse_descriptor(&[0x90, 0x80, 0x81, 0x23, 0xAA]).unwrap();
        assert_eq!(d.len, 4);
    }

    #[test]
    fn extended_all_fields() {
        // X; I (15-bit) + L + T + K
        let d = parse_descriptor(&[0x90, 0xF0, 0x81, 0x23, 0x07, 0x42, 0xAA]).unwrap();
        assert_eq!(d.len, 6);
    }

    #[test]
    fn tid_and_keyidx_share_one_byte() {
        let with_t = parse_descriptor(&[0x90, 0x20, 0x42, 0xAA]).unwrap();
        let with_k = parse_descriptor(&[0x90, 0x10, 0x42, 0xAA]).unwrap();
        let with_both = parse_descriptor(&[0x90, 0x30, 0x42, 0xAA]).unwrap();
        assert_eq!(with_t.len, 3);
        assert_eq!(with_k.len, 3);
        assert_eq!(with_both.len, 3);
    }

    #[test]
    fn descriptor_overrunning_payload_rejected() {
        // claims an X byte that is not there
        assert!(parse_descriptor(&[0x80]).is_none());
        // claims a 15-bit PictureID with one byte missing
        assert!(parse_descriptor(&[0x90, 0x80, 0x81]).is_none());
        assert!(parse_descriptor(&[]).is_none());
    }

    // --- Frame reassembly ---

    #[test]
    fn single_packet_frame() {
        let payload = [0x10, 0x9D, 0x01, 0x2A, 0x44];
        let mut d = make_depacketizer();
        let frame = d.reassemble(&[&payload]).unwrap();
        assert_eq!(frame.data, &[0x9D, 0x01, 0x2A, 0x44]);
    }

    #[test]
    fn multi_packet_concat_strips_descriptors() {
        let p1 = [0x10, 0x01, 0x02];
        let p2 = [0x01, 0x03, 0x04]; // partition 1, no S needed once started
        let p3 = [0x01, 0x05];
        let mut d = make_depacketizer();
        let frame = d.reassemble(&[&p1, &p2, &p3]).unwrap();
        assert_eq!(frame.data, &[0x01, 0x02, 0x03, 0x04, 0x05]);
    }

    #[test]
    fn extended_descriptors_stripped() {
        let p1 = [0x90, 0x80, 0x11, 0xF0, 0x0D];
        let p2 = [0x81, 0x80, 0x12, 0x0E];
        let mut d = make_depacketizer();
        let frame = d.reassemble(&[&p1, &p2]).unwrap();
        assert_eq!(frame.data, &[0xF0, 0x0D, 0x0E]);
    }

    #[test]
    fn packets_before_start_dropped() {
        let stray = [0x00, 0xEE];
        let p1 = [0x10, 0x01];
        let mut d = make_depacketizer();
        let frame = d.reassemble(&[&stray, &p1]).unwrap();
        assert_eq!(frame.data, &[0x01]);
        assert_eq!(d.diagnostics().fragments_dropped, 1);
    }

    #[test]
    fn frame_without_start_discarded() {
        let mut d = make_depacketizer();
        assert!(d.reassemble(&[&[0x00, 0x01], &[0x00, 0x02]]).is_none());
        assert_eq!(d.diagnostics().fragments_dropped, 2);
    }

    // --- Key-frame flag ---

    #[test]
    fn key_frame_by_inverted_p_bit() {
        let key = [0x10, 0x00, 0x9D, 0x01, 0x2A];
        let mut d = make_depacketizer();
        assert!(d.reassemble(&[&key]).unwrap().is_key_frame);

        let inter = [0x10, 0x11, 0x22];
        assert!(!d.reassemble(&[&inter]).unwrap().is_key_frame);
    }

    #[test]
    fn later_partition_does_not_set_key_flag() {
        // S set but PartID != 0: not a frame start tag
        let p = [0x11, 0x00, 0x01];
        let mut d = make_depacketizer();
        let frame = d.reassemble(&[&p]).unwrap();
        assert!(!frame.is_key_frame);
    }

    // --- Frame-start detection ---

    #[test]
    fn frame_start_requires_s_bit_and_partition_zero() {
        let d = make_depacketizer();
        assert!(d.is_frame_start(&[0x10, 0x00]));
        assert!(!d.is_frame_start(&[0x00, 0x00])); // no S bit
        assert!(!d.is_frame_start(&[0x11, 0x00])); // partition 1
        assert!(!d.is_frame_start(&[0x80])); // malformed descriptor
    }

    // --- Size bound ---

    #[test]
    fn oversize_frame_dropped() {
        let mut d = Vp8Depacketizer::new(4);
        let p = [0x10, 0x01, 0x02, 0x03, 0x04, 0x05];
        assert!(d.reassemble(&[&p]).is_none());
        assert_eq!(d.diagnostics().oversize_frames, 1);
    }

    #[test]
    fn malformed_descriptor_mid_frame_skipped() {
        let p1 = [0x10, 0x01];
        let bad = [0x80]; // X set, no X byte
        let p3 = [0x01, 0x02];
        let mut d = make_depacketizer();
        let frame = d.reassemble(&[&p1, &bad, &p3]).unwrap();
        assert_eq!(frame.data, &[0x01, 0x02]);
        assert_eq!(d.diagnostics().fragments_dropped, 1);
    }
}
