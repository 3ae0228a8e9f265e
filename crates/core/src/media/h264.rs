use super::{Depacketizer, DepacketizerDiag, FrameData, VideoCodec};
use crate::protocol::be_u16;

/// Annex-B start code prepended to every reconstructed NAL unit.
const START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

/// NAL unit types from RFC 6184 §5.2 and H.264 table 7-1.
const NAL_SLICE_IDR: u8 = 5;
const NAL_SPS: u8 = 7;
const NAL_PPS: u8 = 8;
const NAL_STAP_A: u8 = 24;
const NAL_STAP_B: u8 = 25;
const NAL_MTAP16: u8 = 26;
const NAL_MTAP24: u8 = 27;
const NAL_FU_A: u8 = 28;
const NAL_FU_B: u8 = 29;

/// H.264 RTP depacketizer (RFC 6184).
///
/// Reconstructs an Annex-B NAL unit stream from the RTP payloads of one
/// access unit. Three packetization modes are reassembled:
///
/// - **Single NAL Unit** (§5.6): the payload is one NAL unit, emitted
///   as-is behind a start code.
///
/// - **STAP-A** (§5.7.1): from offset 1, a sequence of 16-bit big-endian
///   sizes each followed by one NAL unit. A size that overruns the payload
///   terminates the packet without error.
///
/// - **FU-A** (§5.8): one NAL unit split across packets. Each fragment
///   carries a 2-byte prefix:
///
///   ```text
///   FU indicator:  [F|NRI|Type=28]     (1 byte)
///   FU header:     [S|E|R|NAL_Type]    (1 byte)
///   Fragment data: [...]
///   ```
///
///   The start fragment opens an accumulator seeded with the NAL header
///   reconstructed as `(F<<7) | (NRI<<5) | NAL_Type`; the end fragment
///   closes it. A continuation without a start discards the packet —
///   losing a middle fragment costs that one NAL, never the rest of the
///   stream.
///
/// STAP-B, MTAP16, MTAP24, and FU-B (interleaved mode) are counted and
/// dropped.
///
/// ## Key-frame flag
///
/// A frame containing an SPS (7) or PPS (8) is a key frame, and stays one
/// even when slices follow. A type-5 slice with no parameter set before it
/// marks the frame non-key. Frames with no decisive NAL are non-key.
#[derive(Debug)]
pub struct H264Depacketizer {
    max_frame_size: usize,
    diag: DepacketizerDiag,
}

/// Per-frame output under construction.
struct FrameAssembly {
    out: Vec<u8>,
    key: Option<bool>,
    max: usize,
    overflow: bool,
}

impl FrameAssembly {
    fn new(max: usize) -> Self {
        Self {
            out: Vec::new(),
            key: None,
            max,
            overflow: false,
        }
    }

    /// Append one complete NAL unit behind a start code. Empty units are
    /// elided; an oversize append poisons the whole frame.
    fn push_nal(&mut self, nal: &[u8]) {
        if nal.is_empty() {
            return;
        }
        if self.out.len() + START_CODE.len() + nal.len() > self.max {
            self.overflow = true;
            return;
        }
        self.out.extend_from_slice(&START_CODE);
        self.out.extend_from_slice(nal);

        match nal[0] & 0x1F {
            NAL_SPS | NAL_PPS => self.key = Some(true),
            NAL_SLICE_IDR => {
                if self.key != Some(true) {
                    self.key = Some(false);
                }
            }
            _ => {}
        }
    }
}

impl H264Depacketizer {
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            max_frame_size,
            diag: DepacketizerDiag::default(),
        }
    }

    /// Unpack a STAP-A aggregation payload (RFC 6184 §5.7.1).
    fn unpack_stap_a(&mut self, assembly: &mut FrameAssembly, payload: &[u8]) {
        let mut offset = 1;
        while let Some(size) = be_u16(payload, offset) {
            let size = size as usize;
            match payload.get(offset + 2..offset + 2 + size) {
                Some(nal) => {
                    assembly.push_nal(nal);
                    offset += 2 + size;
                }
                // Truncated aggregate: keep the units already unpacked.
                None => break,
            }
            if assembly.overflow {
                break;
            }
        }
    }

    /// Feed one FU-A fragment into `fragment` (RFC 6184 §5.8).
    fn push_fu_a(&mut self, assembly: &mut FrameAssembly, fragment: &mut Vec<u8>, payload: &[u8]) {
        let Some(&fu_header) = payload.get(1) else {
            self.diag.fragments_dropped += 1;
            return;
        };
        let start = fu_header & 0x80 != 0;
        let end = fu_header & 0x40 != 0;
        let nal_type = fu_header & 0x1F;

        if start {
            let f_nri = payload[0] & 0xE0;
            fragment.clear();
            fragment.push(f_nri | nal_type);
            fragment.extend_from_slice(&payload[2..]);
        } else {
            if fragment.is_empty() {
                self.diag.fragments_dropped += 1;
                tracing::warn!(nal_type, end, "FU-A fragment without start dropped");
                return;
            }
            fragment.extend_from_slice(&payload[2..]);
        }

        if end {
            assembly.push_nal(fragment);
            fragment.clear();
        }
    }
}

impl Depacketizer for H264Depacketizer {
    fn codec(&self) -> VideoCodec {
        VideoCodec::H264
    }

    /// Everything but an FU-A/FU-B continuation fragment can open a frame.
    fn is_frame_start(&self, payload: &[u8]) -> bool {
        match payload.first() {
            Some(&indicator) => match indicator & 0x1F {
                NAL_FU_A | NAL_FU_B => payload.get(1).is_some_and(|h| h & 0x80 != 0),
                _ => true,
            },
            None => false,
        }
    }

    fn reassemble(&mut self, payloads: &[&[u8]]) -> Option<FrameData> {
        let mut assembly = FrameAssembly::new(self.max_frame_size);
        // FU-A accumulator; an unterminated fragment dies with the frame.
        let mut fragment: Vec<u8> = Vec::new();

        for &payload in payloads {
            let Some(&indicator) = payload.first() else {
                continue;
            };
            match indicator & 0x1F {
                1..=23 => assembly.push_nal(payload),
                NAL_STAP_A => self.unpack_stap_a(&mut assembly, payload),
                NAL_FU_A => self.push_fu_a(&mut assembly, &mut fragment, payload),
                nal_type @ (NAL_STAP_B | NAL_MTAP16 | NAL_MTAP24 | NAL_FU_B) => {
                    self.diag.unsupported_dropped += 1;
                    tracing::debug!(nal_type, "unsupported packetization mode dropped");
                }
                nal_type => {
                    self.diag.unsupported_dropped += 1;
                    tracing::debug!(nal_type, "reserved NAL type dropped");
                }
            }
            if assembly.overflow {
                break;
            }
        }

        if assembly.overflow {
            self.diag.oversize_frames += 1;
            tracing::warn!(max = self.max_frame_size, "oversize H.264 frame discarded");
            return None;
        }
        if !fragment.is_empty() {
            // Marker arrived before the FU-A end fragment.
            self.diag.fragments_dropped += 1;
        }
        if assembly.out.is_empty() {
            return None;
        }
        Some(FrameData {
            data: assembly.out,
            is_key_frame: assembly.key.unwrap_or(false),
        })
    }

    fn diagnostics(&self) -> DepacketizerDiag {
        self.diag
    }
}
