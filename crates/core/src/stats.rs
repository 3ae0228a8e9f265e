//! Receive-path diagnostics counters.

use crate::media::DepacketizerDiag;

/// Counters accumulated by one [`RtpRouter`](crate::router::RtpRouter).
///
/// Every error the receive path recovers from locally lands here instead
/// of propagating — the embedder polls a snapshot via
/// [`RtpReceiver::stats`](crate::RtpReceiver::stats). Counters are owned
/// per router instance; nothing is process-global.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReceiverStats {
    /// RTP datagrams that parsed successfully.
    pub packets_rtp: u64,
    /// RTCP compound datagrams that parsed successfully.
    pub packets_rtcp: u64,
    /// Datagrams dropped by the classifier or the wire parsers.
    pub malformed_dropped: u64,
    /// RTP packets dropped for lacking a payload-type → codec mapping.
    pub unknown_payload_type: u64,
    /// Arrivals that did not directly follow their predecessor.
    pub sequence_jumps: u64,
    /// Packets dropped because the remote endpoint did not match the
    /// stream binding and no rebind rule applied.
    pub endpoint_mismatches: u64,
    /// Frames delivered to the frame handler.
    pub frames_emitted: u64,
    /// Frames discarded incomplete (timestamp moved on) or empty.
    pub frames_discarded: u64,
    /// Frames dropped for exceeding the reconstruction size bound.
    pub oversize_frames: u64,
    /// FU-A fragments or VP8 packets dropped during reassembly.
    pub fragments_dropped: u64,
    /// H.264 packets in packetization modes this crate does not support.
    pub unsupported_nal_dropped: u64,
    /// RTCP BYE packets that removed a known stream.
    pub byes_received: u64,
}

impl ReceiverStats {
    /// Fold a depacketizer's drop counters into the snapshot.
    pub(crate) fn absorb(&mut self, diag: DepacketizerDiag) {
        self.fragments_dropped += diag.fragments_dropped;
        self.unsupported_nal_dropped += diag.unsupported_dropped;
        self.oversize_frames += diag.oversize_frames;
    }
}
