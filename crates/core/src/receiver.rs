use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use parking_lot::Mutex;

use crate::error::{Result, RtpError};
use crate::media::VideoCodec;
use crate::router::{RtpRouter, VideoFrame};
use crate::stats::ReceiverStats;
use crate::transport::UdpInbound;

/// Default bound on a single reconstructed frame, in bytes.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1_048_576;

/// Receiver configuration.
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Local IP the UDP socket binds.
    pub bind_address: String,
    /// Local UDP port; 0 = OS-chosen.
    pub bind_port: u16,
    /// Upper bound on a single reassembled frame.
    pub max_reconstructed_frame_size: usize,
    /// Allow a stream's remote endpoint to change without the NAT
    /// private-to-public heuristic.
    pub accept_rtp_from_any: bool,
    /// Payload-type → codec table. Defaults to H.264 on the conventional
    /// dynamic types 96 and 97; remap for VP8 as negotiated.
    pub payload_types: Vec<(u8, VideoCodec)>,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            bind_port: 0,
            max_reconstructed_frame_size: DEFAULT_MAX_FRAME_SIZE,
            accept_rtp_from_any: false,
            payload_types: vec![(96, VideoCodec::H264), (97, VideoCodec::H264)],
        }
    }
}

/// High-level RTP receiver orchestrator.
///
/// Owns the [`RtpRouter`] and the inbound UDP socket. [`start`](Self::start)
/// binds the socket and spawns one reader thread; every datagram is routed
/// on that thread, and frame callbacks run inline on it — embedders that
/// need frames elsewhere post the work themselves.
///
/// Embedders that own their socket layer can skip `start` and feed
/// [`on_datagram`](Self::on_datagram) directly.
pub struct RtpReceiver {
    config: ReceiverConfig,
    router: Arc<Mutex<RtpRouter>>,
    running: Arc<AtomicBool>,
    local_addr: Option<SocketAddr>,
}

impl RtpReceiver {
    pub fn new(config: ReceiverConfig) -> Self {
        let router = RtpRouter::new(&config);
        Self {
            config,
            router: Arc::new(Mutex::new(router)),
            running: Arc::new(AtomicBool::new(false)),
            local_addr: None,
        }
    }

    /// Register the frame-ready callback; replaces any previous one.
    pub fn on_frame(&self, handler: impl FnMut(&VideoFrame) + Send + 'static) {
        self.router.lock().set_frame_handler(handler);
    }

    /// Register the optional RTCP BYE diagnostic callback.
    pub fn on_bye(&self, handler: impl FnMut(u32, Option<&str>) + Send + 'static) {
        self.router.lock().set_bye_handler(handler);
    }

    /// Register the shutdown callback.
    pub fn on_closed(&self, handler: impl FnMut(&str) + Send + 'static) {
        self.router.lock().set_closed_handler(handler);
    }

    /// Bind the configured address and start the reader thread.
    pub fn start(&mut self) -> Result<()> {
        if self.running.load(Ordering::SeqCst) {
            return Err(RtpError::AlreadyRunning);
        }

        let inbound = UdpInbound::bind(&self.config.bind_address, self.config.bind_port)?;
        self.local_addr = Some(inbound.local_addr());
        self.running.store(true, Ordering::SeqCst);

        let router = self.router.clone();
        let running = self.running.clone();

        tracing::info!(addr = %inbound.local_addr(), "RTP receiver listening");

        thread::spawn(move || {
            inbound.run(running, move |local_port, remote, bytes| {
                router.lock().on_datagram(local_port, remote, bytes);
            });
        });

        Ok(())
    }

    /// Inbound adapter for embedder-owned sockets: route one datagram.
    ///
    /// `bytes` is only borrowed for the call; the core copies what it
    /// retains.
    pub fn on_datagram(&self, local_port: u16, remote: SocketAddr, bytes: &[u8]) {
        self.router.lock().on_datagram(local_port, remote, bytes);
    }

    /// The bound local address, once [`start`](Self::start) succeeded.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Snapshot of the receive-path counters.
    pub fn stats(&self) -> ReceiverStats {
        self.router.lock().stats()
    }

    /// Shut down: stop the reader thread, destroy all streams, clear the
    /// callbacks. Idempotent.
    pub fn close(&mut self, reason: &str) {
        self.running.store(false, Ordering::SeqCst);
        self.router.lock().close(reason);
    }
}
