use std::cmp::Ordering;
use std::net::{IpAddr, SocketAddr};

use crate::media::h264::H264Depacketizer;
use crate::media::vp8::Vp8Depacketizer;
use crate::media::{Depacketizer, DepacketizerDiag, FrameData, VideoCodec};

/// Wraparound-aware `a < b` on 16-bit sequence numbers.
///
/// `a` precedes `b` when `(b - a) mod 2^16` is below half the ring; the
/// tie at exactly half is broken by numeric order so that any two distinct
/// values are strictly ordered.
pub fn seq_lt(a: u16, b: u16) -> bool {
    let delta = b.wrapping_sub(a);
    delta != 0 && (delta < 0x8000 || (delta == 0x8000 && a < b))
}

/// Total order over the sequence-number ring, for sorting a frame's packets.
pub fn seq_cmp(a: u16, b: u16) -> Ordering {
    if a == b {
        Ordering::Equal
    } else if seq_lt(a, b) {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

/// Whether `ip` is a private, loopback, or link-local address.
///
/// Drives the NAT traversal heuristic: a stream bound to a private
/// endpoint may rebind once to a public one.
pub(crate) fn is_private_addr(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let o = v4.octets();
            v4.is_loopback()
                || o[0] == 10
                || (o[0] == 172 && (16..=31).contains(&o[1]))
                || (o[0] == 192 && o[1] == 168)
                || (o[0] == 169 && o[1] == 254)
        }
        IpAddr::V6(v6) => {
            let seg0 = v6.segments()[0];
            v6.is_loopback() || (seg0 & 0xFE00) == 0xFC00 || (seg0 & 0xFFC0) == 0xFE80
        }
    }
}

/// What happened to a packet pushed into a stream's reassembly buffer.
#[derive(Debug, Default)]
pub(crate) struct PushOutcome {
    /// Completed frame with its RTP timestamp, when the push closed one.
    pub frame: Option<(u32, FrameData)>,
    /// An unfinished frame was thrown away because a new timestamp arrived.
    pub discarded_previous: bool,
    /// The in-progress frame exceeded the size budget and was reset.
    pub overflowed: bool,
    /// A complete frame closed but the depacketizer produced nothing.
    pub discarded_on_close: bool,
}

/// Per-SSRC receive state: codec, endpoint binding, sequence tracking, and
/// the reassembly buffer of the in-progress frame.
///
/// A stream is created lazily by the router on the first RTP packet whose
/// payload type maps to a codec, and destroyed on RTCP BYE or router close.
/// All mutation happens on the router's datagram thread.
pub(crate) struct VideoStream {
    index: usize,
    ssrc: u32,
    codec: VideoCodec,
    depacketizer: Box<dyn Depacketizer>,
    remote: SocketAddr,
    nat_rebound: bool,
    last_seq: Option<u16>,
    /// Timestamp of the frame being assembled.
    frame_timestamp: Option<u32>,
    /// Sequence number of the marker packet, once seen.
    marker_seq: Option<u16>,
    /// Buffered `(sequence, payload)` pairs of the in-progress frame.
    packets: Vec<(u16, Vec<u8>)>,
    buffered_bytes: usize,
    overflowed: bool,
    max_frame_size: usize,
}

impl VideoStream {
    pub fn new(
        index: usize,
        ssrc: u32,
        codec: VideoCodec,
        remote: SocketAddr,
        max_frame_size: usize,
    ) -> Self {
        let depacketizer: Box<dyn Depacketizer> = match codec {
            VideoCodec::H264 => Box::new(H264Depacketizer::new(max_frame_size)),
            VideoCodec::Vp8 => Box::new(Vp8Depacketizer::new(max_frame_size)),
        };
        Self {
            index,
            ssrc,
            codec,
            depacketizer,
            remote,
            nat_rebound: false,
            last_seq: None,
            frame_timestamp: None,
            marker_seq: None,
            packets: Vec::new(),
            buffered_bytes: 0,
            overflowed: false,
            max_frame_size,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn codec(&self) -> VideoCodec {
        self.codec
    }

    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    pub fn diagnostics(&self) -> DepacketizerDiag {
        self.depacketizer.diagnostics()
    }

    /// Decide whether a packet from `observed` belongs to this stream,
    /// rebinding the endpoint when accepted from a new address.
    ///
    /// Without `accept_any`, a changed endpoint is accepted exactly once,
    /// and only for the private-to-public transition NATs produce.
    pub fn accept_endpoint(&mut self, observed: SocketAddr, accept_any: bool) -> bool {
        if observed == self.remote {
            return true;
        }
        if accept_any {
            tracing::debug!(
                ssrc = format_args!("{:#010X}", self.ssrc),
                old = %self.remote,
                new = %observed,
                "stream endpoint rebound"
            );
            self.remote = observed;
            return true;
        }
        if !self.nat_rebound
            && is_private_addr(self.remote.ip())
            && !is_private_addr(observed.ip())
        {
            tracing::info!(
                ssrc = format_args!("{:#010X}", self.ssrc),
                old = %self.remote,
                new = %observed,
                "stream endpoint rebound to public address"
            );
            self.remote = observed;
            self.nat_rebound = true;
            return true;
        }
        false
    }

    /// Record an arriving sequence number; returns the expected value when
    /// the packet does not directly follow its predecessor.
    pub fn note_sequence(&mut self, seq: u16) -> Option<u16> {
        let jump = match self.last_seq {
            Some(last) => {
                let expected = last.wrapping_add(1);
                (seq != expected).then_some(expected)
            }
            None => None,
        };
        self.last_seq = Some(seq);
        jump
    }

    /// Buffer one packet of the stream, closing the in-progress frame when
    /// it becomes complete.
    ///
    /// A frame is complete once its marker packet has been seen and the
    /// buffered sequence numbers run contiguously from a frame-start
    /// payload up to the marker — so packets may arrive in any order, the
    /// marker first included. A frame still missing packets when the next
    /// timestamp arrives is discarded.
    pub fn push(&mut self, seq: u16, timestamp: u32, marker: bool, payload: &[u8]) -> PushOutcome {
        let mut outcome = PushOutcome::default();

        if self.frame_timestamp != Some(timestamp) {
            if self.frame_timestamp.is_some() && !self.packets.is_empty() {
                outcome.discarded_previous = true;
            }
            self.begin_frame(timestamp);
        }

        if self.overflowed {
            // Rest of an oversize frame: swallow until the timestamp moves on.
            return outcome;
        }

        if self.buffered_bytes + payload.len() > self.max_frame_size {
            self.packets.clear();
            self.buffered_bytes = 0;
            self.overflowed = true;
            outcome.overflowed = true;
            return outcome;
        }

        if marker {
            self.marker_seq = Some(seq);
        }
        if self.packets.iter().any(|(s, _)| *s == seq) {
            // Duplicate delivery; the first copy stands.
            return outcome;
        }
        self.buffered_bytes += payload.len();
        self.packets.push((seq, payload.to_vec()));

        if self.frame_complete() {
            self.packets.sort_by(|a, b| seq_cmp(a.0, b.0));
            let payloads: Vec<&[u8]> = self.packets.iter().map(|(_, p)| p.as_slice()).collect();
            match self.depacketizer.reassemble(&payloads) {
                Some(frame) => outcome.frame = Some((timestamp, frame)),
                None => outcome.discarded_on_close = true,
            }
            self.reset_frame();
        }

        outcome
    }

    fn begin_frame(&mut self, timestamp: u32) {
        self.reset_frame();
        self.frame_timestamp = Some(timestamp);
    }

    fn reset_frame(&mut self) {
        self.packets.clear();
        self.buffered_bytes = 0;
        self.marker_seq = None;
        self.overflowed = false;
    }

    fn frame_complete(&self) -> bool {
        let Some(marker_seq) = self.marker_seq else {
            return false;
        };
        let Some(first_seq) = self.packets.iter().map(|(s, _)| *s).min_by(|a, b| seq_cmp(*a, *b))
        else {
            return false;
        };
        let span = marker_seq.wrapping_sub(first_seq) as usize + 1;
        if self.packets.len() != span {
            return false;
        }
        self.packets
            .iter()
            .find(|(s, _)| *s == first_seq)
            .is_some_and(|(_, p)| self.depacketizer.is_frame_start(p))
    }
}
