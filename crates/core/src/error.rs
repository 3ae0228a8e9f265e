//! Error types for the RTP receiver library.

use std::fmt;

/// Errors that can occur in the RTP receiver library.
///
/// Media-path variants are recovered locally by the
/// [`RtpRouter`](crate::router::RtpRouter) — a bad packet is dropped and
/// counted, never propagated to the embedder:
///
/// - **Wire**: [`MalformedHeader`](Self::MalformedHeader),
///   [`MalformedRtcp`](Self::MalformedRtcp).
/// - **Routing**: [`UnknownPayloadType`](Self::UnknownPayloadType),
///   [`EndpointMismatch`](Self::EndpointMismatch).
/// - **Reassembly**: [`FragmentOutOfOrder`](Self::FragmentOutOfOrder),
///   [`OversizeFrame`](Self::OversizeFrame).
///
/// Only the lifecycle variants surface through the public API:
/// [`Io`](Self::Io), [`NotStarted`](Self::NotStarted),
/// [`AlreadyRunning`](Self::AlreadyRunning).
#[derive(Debug, thiserror::Error)]
pub enum RtpError {
    /// Underlying I/O or socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Datagram failed RTP fixed-header validation (RFC 3550 §5.1).
    #[error("malformed RTP header: {kind}")]
    MalformedHeader { kind: HeaderErrorKind },

    /// Datagram failed RTCP common-header or compound validation (RFC 3550 §6).
    #[error("malformed RTCP packet: {kind}")]
    MalformedRtcp { kind: RtcpErrorKind },

    /// RTP payload type has no codec mapping in the receiver configuration.
    #[error("no codec mapped to payload type {0}")]
    UnknownPayloadType(u8),

    /// FU-A continuation or end fragment arrived without a start fragment.
    #[error("FU-A fragment without a preceding start fragment")]
    FragmentOutOfOrder,

    /// Reassembly would exceed the configured frame-size bound.
    #[error("reassembled frame of {size} bytes exceeds limit of {max}")]
    OversizeFrame { size: usize, max: usize },

    /// Packet for a bound SSRC arrived from an unexpected remote endpoint.
    #[error("packet from unexpected endpoint for a bound SSRC")]
    EndpointMismatch,

    /// [`RtpReceiver::start`](crate::RtpReceiver::start) has not been called yet.
    #[error("receiver not started")]
    NotStarted,

    /// [`RtpReceiver::start`](crate::RtpReceiver::start) was called while already running.
    #[error("receiver already running")]
    AlreadyRunning,
}

/// Specific kind of RTP header parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderErrorKind {
    /// Datagram shorter than the 12-byte fixed header.
    Truncated,
    /// Version field was not 2.
    BadVersion,
    /// CSRC count claims more identifiers than the datagram carries.
    TruncatedCsrcList,
    /// Extension length claims more words than the datagram carries.
    TruncatedExtension,
    /// Padding flag set but the trailing count is zero or exceeds the payload.
    BadPadding,
}

impl fmt::Display for HeaderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "shorter than fixed header"),
            Self::BadVersion => write!(f, "version is not 2"),
            Self::TruncatedCsrcList => write!(f, "truncated CSRC list"),
            Self::TruncatedExtension => write!(f, "truncated extension block"),
            Self::BadPadding => write!(f, "invalid trailing padding"),
        }
    }
}

/// Specific kind of RTCP parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtcpErrorKind {
    /// Buffer shorter than the 4-byte common header.
    Truncated,
    /// Version field was not 2.
    BadVersion,
    /// A chunk's word length runs past the end of the datagram.
    BadLength,
}

impl fmt::Display for RtcpErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "shorter than common header"),
            Self::BadVersion => write!(f, "version is not 2"),
            Self::BadLength => write!(f, "chunk length exceeds datagram"),
        }
    }
}

/// Convenience alias for `Result<T, RtpError>`.
pub type Result<T> = std::result::Result<T, RtpError>;
