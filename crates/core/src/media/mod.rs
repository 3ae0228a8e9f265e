//! Video codecs and RTP depacketization.
//!
//! This module provides the [`Depacketizer`] trait and codec-specific
//! implementations that reconstruct encoded video frames from RTP payload
//! fragments.
//!
//! ## Frame reassembly (RFC 3550)
//!
//! An encoded video frame arrives as one or more RTP packets sharing a
//! timestamp; the marker bit flags the last packet of the frame. The
//! [router](crate::router) buffers a frame's packets, orders them by
//! sequence number, and hands the payload list to the depacketizer, which
//! undoes the codec's packetization:
//!
//! - Splitting markers (H.264 FU-A fragments) are merged back into whole
//!   NAL units.
//! - Aggregation markers (H.264 STAP-A) are unpacked into several units.
//! - Per-packet descriptors (VP8) are stripped.
//!
//! ## Supported codecs
//!
//! | Codec | Module | RFC | Output |
//! |-------|--------|-----|--------|
//! | H.264 | [`h264`] | [RFC 6184](https://tools.ietf.org/html/rfc6184) | Annex-B NAL unit stream |
//! | VP8 | [`vp8`] | [RFC 7741](https://tools.ietf.org/html/rfc7741) | Raw frame payload |

pub mod h264;
pub mod vp8;

/// Video codec identifier for a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VideoCodec {
    H264,
    Vp8,
}

impl VideoCodec {
    /// Codec name as used in SDP `a=rtpmap` attributes.
    pub fn name(&self) -> &'static str {
        match self {
            Self::H264 => "H264",
            Self::Vp8 => "VP8",
        }
    }

    /// RTP clock rate in Hz — 90 kHz for video per RFC 3551 §4.
    pub fn clock_rate(&self) -> u32 {
        90_000
    }
}

impl std::fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A reassembled frame produced by a depacketizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameData {
    /// Encoded frame bytes in the codec's output format.
    pub data: Vec<u8>,
    /// Whether the frame decodes without reference to prior frames.
    pub is_key_frame: bool,
}

/// Drop counters a depacketizer accumulates across frames.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DepacketizerDiag {
    /// FU-A continuations without a start, or packets rejected before a
    /// frame start.
    pub fragments_dropped: u64,
    /// Packets using packetization modes this crate does not reassemble.
    pub unsupported_dropped: u64,
    /// Frames discarded because output exceeded the size bound.
    pub oversize_frames: u64,
}

/// Codec-specific RTP depacketizer.
///
/// The inverse of an RTP packetizer: where a packetizer splits an encoded
/// frame into payloads, `reassemble` merges one frame's payloads back into
/// the frame.
///
/// ## Implementing a new codec
///
/// 1. Create a new module (e.g. `media/h265.rs`)
/// 2. Implement `Depacketizer` for your type
/// 3. Map its payload type in [`ReceiverConfig`](crate::ReceiverConfig)
pub trait Depacketizer: Send {
    /// The codec this depacketizer reconstructs.
    fn codec(&self) -> VideoCodec;

    /// Whether this payload can open a frame.
    ///
    /// The router uses this to decide when a buffered frame is complete:
    /// packets may arrive in any order, so the marker packet alone does not
    /// close a frame — the buffered run must also begin with a payload that
    /// starts one (an H.264 non-fragment or FU-A start, a VP8 first
    /// partition with the S bit).
    fn is_frame_start(&self, payload: &[u8]) -> bool;

    /// Reassemble one frame from its RTP payloads.
    ///
    /// `payloads` holds every payload of a single RTP timestamp, already
    /// sorted into sequence-number order, the marker-bit packet last.
    /// Returns `None` when nothing usable could be reconstructed (all
    /// packets unsupported, reassembly incomplete, or the frame exceeded
    /// the size bound) — the drop is recorded in [`diagnostics`](Self::diagnostics).
    fn reassemble(&mut self, payloads: &[&[u8]]) -> Option<FrameData>;

    /// Cumulative drop counters.
    fn diagnostics(&self) -> DepacketizerDiag;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_metadata() {
        assert_eq!(VideoCodec::H264.name(), "H264");
        assert_eq!(VideoCodec::Vp8.name(), "VP8");
        assert_eq!(VideoCodec::H264.clock_rate(), 90_000);
        assert_eq!(VideoCodec::Vp8.clock_rate(), 90_000);
    }

    #[test]
    fn codec_display_matches_name() {
        assert_eq!(VideoCodec::Vp8.to_string(), "VP8");
    }
}
