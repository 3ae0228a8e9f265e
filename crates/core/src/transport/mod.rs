//! Network transport layer for inbound RTP/RTCP datagrams.
//!
//! The core itself is transport-agnostic — [`RtpRouter`](crate::router::RtpRouter)
//! consumes raw datagrams through `on_datagram` and never touches a
//! socket. This module supplies the built-in collaborator:
//!
//! - **UDP** ([`udp`]): one bound socket, one reader thread, every
//!   received datagram delivered to a callback. Delivery is serialized by
//!   construction (a single thread reads the socket), which is what the
//!   router's single-threaded model requires.
//!
//! Embedders that own their socket handling can skip this module entirely
//! and feed [`RtpReceiver::on_datagram`](crate::RtpReceiver::on_datagram)
//! directly.

pub mod udp;

pub use udp::UdpInbound;
