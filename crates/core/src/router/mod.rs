//! Per-SSRC stream routing and frame emission.
//!
//! The [`RtpRouter`] is the synchronous heart of the receiver: every UDP
//! datagram is classified, parsed, and dispatched here on the thread that
//! delivered it. It owns the only shared mutable structure in the crate —
//! the SSRC → `VideoStream` map — and raises frame-ready events through a
//! single registered callback.
//!
//! ## Stream lifecycle
//!
//! ```text
//! first RTP packet with a mapped payload type -> stream created
//! RTCP BYE for the SSRC                       -> stream destroyed
//! close(reason)                               -> all streams destroyed
//! ```
//!
//! ## Frame boundary
//!
//! Packets are buffered per in-progress timestamp. A frame closes once its
//! marker packet has been seen and the buffered sequence numbers run
//! contiguously from a frame-start payload to the marker; the buffered
//! list is then sorted with the wraparound-aware comparator and handed to
//! the codec depacketizer. A new timestamp arriving first discards the
//! unfinished frame.

pub(crate) mod stream;

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::media::VideoCodec;
use crate::protocol::rtcp::{CompoundPacket, RtcpPacket};
use crate::protocol::rtp::RtpPacket;
use crate::protocol::{PacketClass, classify};
use crate::receiver::ReceiverConfig;
use crate::stats::ReceiverStats;
use stream::VideoStream;

/// Interval for the rate-limited unclassifiable-datagram warning.
const MALFORMED_WARN_INTERVAL: Duration = Duration::from_secs(60);

/// A reassembled video frame delivered to the frame handler.
///
/// The struct is borrowed for the duration of the callback; listeners that
/// keep the bytes longer must copy them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    /// Router-assigned index of the emitting stream, stable for its lifetime.
    pub stream_index: usize,
    /// Remote endpoint the stream is currently bound to.
    pub remote: SocketAddr,
    /// RTP timestamp shared by the frame's packets.
    pub timestamp: u32,
    pub codec: VideoCodec,
    /// H.264: Annex-B NAL unit stream. VP8: raw frame payload.
    pub data: Vec<u8>,
    pub is_key_frame: bool,
}

/// Callback invoked for every reassembled frame.
pub type FrameHandler = Box<dyn FnMut(&VideoFrame) + Send>;

/// Diagnostic callback for RTCP BYE on a known stream: `(ssrc, reason)`.
pub type ByeHandler = Box<dyn FnMut(u32, Option<&str>) + Send>;

/// Callback invoked once when the router shuts down.
pub type ClosedHandler = Box<dyn FnMut(&str) + Send>;

/// Routes datagrams to per-SSRC streams and emits reassembled frames.
///
/// Single-threaded: all state mutation happens on the thread calling
/// [`on_datagram`](Self::on_datagram). Wire errors are recovered locally —
/// bad packets are dropped and counted in [`ReceiverStats`], never
/// propagated.
pub struct RtpRouter {
    streams: HashMap<u32, VideoStream>,
    payload_types: HashMap<u8, VideoCodec>,
    max_frame_size: usize,
    accept_rtp_from_any: bool,
    next_index: usize,
    /// SSRCs already warned about an unmapped payload type.
    warned_ssrcs: HashSet<u32>,
    frame_handler: Option<FrameHandler>,
    bye_handler: Option<ByeHandler>,
    closed_handler: Option<ClosedHandler>,
    stats: ReceiverStats,
    closed: bool,
    last_malformed_warn: Option<Instant>,
}

impl RtpRouter {
    pub fn new(config: &ReceiverConfig) -> Self {
        Self {
            streams: HashMap::new(),
            payload_types: config.payload_types.iter().copied().collect(),
            max_frame_size: config.max_reconstructed_frame_size,
            accept_rtp_from_any: config.accept_rtp_from_any,
            next_index: 0,
            warned_ssrcs: HashSet::new(),
            frame_handler: None,
            bye_handler: None,
            closed_handler: None,
            stats: ReceiverStats::default(),
            closed: false,
            last_malformed_warn: None,
        }
    }

    /// Register the frame-ready callback. Exactly one handler per router;
    /// registering again replaces the previous one.
    pub fn set_frame_handler(&mut self, handler: impl FnMut(&VideoFrame) + Send + 'static) {
        self.frame_handler = Some(Box::new(handler));
    }

    /// Register the optional RTCP BYE diagnostic callback.
    pub fn set_bye_handler(&mut self, handler: impl FnMut(u32, Option<&str>) + Send + 'static) {
        self.bye_handler = Some(Box::new(handler));
    }

    /// Register the shutdown callback, invoked once from [`close`](Self::close).
    pub fn set_closed_handler(&mut self, handler: impl FnMut(&str) + Send + 'static) {
        self.closed_handler = Some(Box::new(handler));
    }

    /// Synchronous entry point: classify and dispatch one UDP datagram.
    ///
    /// The bytes are owned by the caller until the call returns; whatever
    /// the router keeps is copied into the stream's reassembly buffer.
    pub fn on_datagram(&mut self, local_port: u16, remote: SocketAddr, datagram: &[u8]) {
        if self.closed {
            return;
        }
        match classify(datagram) {
            Some(PacketClass::Rtp) => self.on_rtp(local_port, remote, datagram),
            Some(PacketClass::Rtcp) => self.on_rtcp(remote, datagram),
            None => self.note_malformed(),
        }
    }

    /// Number of live streams.
    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    /// Snapshot of the router's counters, depacketizer drops included.
    pub fn stats(&self) -> ReceiverStats {
        let mut stats = self.stats.clone();
        for stream in self.streams.values() {
            stats.absorb(stream.diagnostics());
        }
        stats
    }

    /// Shut down: destroy all streams, clear the handlers, drop subsequent
    /// datagrams. Idempotent; the closed callback fires on the first call.
    pub fn close(&mut self, reason: &str) {
        if self.closed {
            return;
        }
        self.closed = true;
        for (_, stream) in self.streams.drain() {
            self.stats.absorb(stream.diagnostics());
        }
        self.frame_handler = None;
        self.bye_handler = None;
        tracing::info!(reason, "router closed");
        if let Some(mut handler) = self.closed_handler.take() {
            handler(reason);
        }
    }

    fn on_rtp(&mut self, local_port: u16, remote: SocketAddr, datagram: &[u8]) {
        let packet = match RtpPacket::parse(datagram) {
            Ok(packet) => packet,
            Err(error) => {
                tracing::trace!(%error, %remote, "undecodable RTP datagram");
                self.note_malformed();
                return;
            }
        };
        self.stats.packets_rtp += 1;

        let header = &packet.header;
        let ssrc = header.ssrc;
        let mapped_codec = self.payload_types.get(&header.payload_type).copied();

        let stream = match self.streams.entry(ssrc) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let Some(codec) = mapped_codec else {
                    self.stats.unknown_payload_type += 1;
                    if self.warned_ssrcs.insert(ssrc) {
                        tracing::warn!(
                            ssrc = format_args!("{ssrc:#010X}"),
                            payload_type = header.payload_type,
                            "unknown payload type, dropping packets for SSRC"
                        );
                    }
                    return;
                };
                let index = self.next_index;
                self.next_index += 1;
                tracing::info!(
                    index,
                    ssrc = format_args!("{ssrc:#010X}"),
                    %codec,
                    %remote,
                    local_port,
                    "video stream created"
                );
                entry.insert(VideoStream::new(
                    index,
                    ssrc,
                    codec,
                    remote,
                    self.max_frame_size,
                ))
            }
        };

        // A packet whose payload type stopped mapping to the stream's codec
        // cannot be fed to its depacketizer.
        if mapped_codec != Some(stream.codec()) {
            self.stats.unknown_payload_type += 1;
            if self.warned_ssrcs.insert(ssrc) {
                tracing::warn!(
                    ssrc = format_args!("{ssrc:#010X}"),
                    payload_type = header.payload_type,
                    expected = %stream.codec(),
                    "payload type does not match stream codec"
                );
            }
            return;
        }

        if !stream.accept_endpoint(remote, self.accept_rtp_from_any) {
            self.stats.endpoint_mismatches += 1;
            tracing::warn!(
                ssrc = format_args!("{ssrc:#010X}"),
                expected = %stream.remote(),
                observed = %remote,
                "endpoint mismatch, packet dropped"
            );
            return;
        }

        if let Some(expected) = stream.note_sequence(header.sequence_number) {
            self.stats.sequence_jumps += 1;
            tracing::warn!(
                ssrc = format_args!("{ssrc:#010X}"),
                expected,
                got = header.sequence_number,
                "sequence jump"
            );
        }

        let outcome = stream.push(
            header.sequence_number,
            header.timestamp,
            header.marker,
            packet.payload,
        );

        if outcome.discarded_previous {
            self.stats.frames_discarded += 1;
            tracing::trace!(
                ssrc = format_args!("{ssrc:#010X}"),
                "incomplete frame discarded on timestamp change"
            );
        }
        if outcome.overflowed {
            self.stats.oversize_frames += 1;
            tracing::warn!(
                ssrc = format_args!("{ssrc:#010X}"),
                max = self.max_frame_size,
                "frame exceeded size budget, buffer reset"
            );
        }
        if outcome.discarded_on_close {
            self.stats.frames_discarded += 1;
        }
        if let Some((timestamp, frame)) = outcome.frame {
            self.stats.frames_emitted += 1;
            let event = VideoFrame {
                stream_index: stream.index(),
                remote: stream.remote(),
                timestamp,
                codec: stream.codec(),
                data: frame.data,
                is_key_frame: frame.is_key_frame,
            };
            tracing::debug!(
                stream_index = event.stream_index,
                timestamp,
                bytes = event.data.len(),
                key = event.is_key_frame,
                "frame reassembled"
            );
            if let Some(handler) = self.frame_handler.as_mut() {
                handler(&event);
            }
        }
    }

    fn on_rtcp(&mut self, remote: SocketAddr, datagram: &[u8]) {
        let compound = match CompoundPacket::parse(datagram) {
            Ok(compound) => compound,
            Err(error) => {
                tracing::trace!(%error, %remote, "undecodable RTCP datagram");
                self.note_malformed();
                return;
            }
        };
        self.stats.packets_rtcp += 1;

        for packet in &compound.packets {
            match packet {
                RtcpPacket::Bye(bye) => {
                    for ssrc in &bye.ssrcs {
                        let Some(stream) = self.streams.remove(ssrc) else {
                            continue;
                        };
                        self.stats.byes_received += 1;
                        self.stats.absorb(stream.diagnostics());
                        tracing::info!(
                            ssrc = format_args!("{ssrc:#010X}"),
                            stream_index = stream.index(),
                            reason = bye.reason.as_deref().unwrap_or(""),
                            "stream removed by RTCP BYE"
                        );
                        if let Some(handler) = self.bye_handler.as_mut() {
                            handler(*ssrc, bye.reason.as_deref());
                        }
                    }
                }
                RtcpPacket::SenderReport(sr) => {
                    tracing::trace!(
                        ssrc = format_args!("{:#010X}", sr.ssrc),
                        rtp_timestamp = sr.info.rtp_timestamp,
                        packets = sr.info.packet_count,
                        "sender report"
                    );
                }
                _ => {}
            }
        }
    }

    fn note_malformed(&mut self) {
        self.stats.malformed_dropped += 1;
        let now = Instant::now();
        let due = self
            .last_malformed_warn
            .is_none_or(|last| now.duration_since(last) >= MALFORMED_WARN_INTERVAL);
        if due {
            tracing::warn!(
                total = self.stats.malformed_dropped,
                "dropping unclassifiable datagrams"
            );
            self.last_malformed_warn = Some(now);
        }
    }
}
