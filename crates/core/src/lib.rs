//! # rtprx — RTP video receiver library
//!
//! A Rust library for receiving RTP video over UDP and reassembling the
//! encoded frames — H.264 and VP8 — from lossy, potentially reordered
//! datagrams.
//!
//! ## Protocol references
//!
//! | RFC | Topic | How this crate uses it |
//! |-----|-------|----------------------|
//! | [RFC 3550](https://tools.ietf.org/html/rfc3550) | RTP/RTCP | Header parsing, sequence/timestamp semantics, compound RTCP, BYE |
//! | [RFC 5761](https://tools.ietf.org/html/rfc5761) | RTP/RTCP multiplexing | Classifying datagrams on a shared port |
//! | [RFC 6184](https://tools.ietf.org/html/rfc6184) | H.264 RTP payload | Single NAL, STAP-A unpacking, FU-A reassembly, Annex-B output |
//! | [RFC 7741](https://tools.ietf.org/html/rfc7741) | VP8 RTP payload | Payload descriptor parsing, frame reassembly |
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │  Receiver   — public API, orchestrator   │
//! ├──────────────────────────────────────────┤
//! │  Transport  — UDP inbound, reader thread │
//! ├──────────────────────────────────────────┤
//! │  Protocol   — RTP/RTCP parsing, demux    │
//! │  Router     — per-SSRC streams, events   │
//! ├──────────────────────────────────────────┤
//! │  Media      — H.264 / VP8 depacketizers  │
//! └──────────────────────────────────────────┘
//! ```
//!
//! Datagram flow: socket → classifier → router → depacketizer → frame
//! callback. Everything past the socket runs synchronously on the thread
//! that delivered the datagram.
//!
//! ## Quick start
//!
//! ```no_run
//! use rtprx::{ReceiverConfig, RtpReceiver};
//!
//! let mut receiver = RtpReceiver::new(ReceiverConfig {
//!     bind_port: 5004,
//!     ..ReceiverConfig::default()
//! });
//!
//! receiver.on_frame(|frame| {
//!     println!(
//!         "{} frame: {} bytes{}",
//!         frame.codec,
//!         frame.data.len(),
//!         if frame.is_key_frame { " (key)" } else { "" },
//!     );
//! });
//!
//! receiver.start().unwrap();
//! ```
//!
//! ## Crate layout
//!
//! - [`receiver`] — High-level [`RtpReceiver`] orchestrator and [`ReceiverConfig`].
//! - [`router`] — [`RtpRouter`]: SSRC map, frame boundary logic, event dispatch.
//! - [`protocol`] — RTP/RTCP wire parsing and the RFC 5761 classifier.
//! - [`media`] — [`Depacketizer`] trait, H.264 and VP8 implementations.
//! - [`transport`] — Inbound UDP socket and reader loop.
//! - [`stats`] — [`ReceiverStats`] diagnostics counters.
//! - [`error`] — [`RtpError`] enum and [`Result`] alias.

pub mod error;
pub mod media;
pub mod protocol;
pub mod receiver;
pub mod router;
pub mod stats;
pub mod transport;

pub use error::{Result, RtpError};
pub use media::{Depacketizer, FrameData, VideoCodec};
pub use receiver::{DEFAULT_MAX_FRAME_SIZE, ReceiverConfig, RtpReceiver};
pub use router::{RtpRouter, VideoFrame};
pub use stats::ReceiverStats;
