use clap::{Parser, ValueEnum};
use rtprx::{ReceiverConfig, RtpReceiver, VideoCodec};
use std::io;

#[derive(Clone, Copy, ValueEnum)]
enum CodecArg {
    H264,
    Vp8,
}

impl From<CodecArg> for VideoCodec {
    fn from(arg: CodecArg) -> Self {
        match arg {
            CodecArg::H264 => VideoCodec::H264,
            CodecArg::Vp8 => VideoCodec::Vp8,
        }
    }
}

#[derive(Parser)]
#[command(
    name = "rtp-receiver",
    about = "Receive an RTP video stream and log reassembled frames"
)]
struct Args {
    /// Bind address
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    /// UDP port (0 = OS-chosen)
    #[arg(long, short, default_value_t = 5004)]
    port: u16,

    /// Codec for the dynamic payload types
    #[arg(long, value_enum, default_value_t = CodecArg::H264)]
    codec: CodecArg,

    /// Payload types mapped to the codec
    #[arg(long, default_values_t = [96u8, 97])]
    payload_type: Vec<u8>,

    /// Accept RTP from any remote endpoint
    #[arg(long)]
    accept_any: bool,
}

fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let codec: VideoCodec = args.codec.into();

    let mut receiver = RtpReceiver::new(ReceiverConfig {
        bind_address: args.bind.clone(),
        bind_port: args.port,
        accept_rtp_from_any: args.accept_any,
        payload_types: args.payload_type.iter().map(|pt| (*pt, codec)).collect(),
        ..ReceiverConfig::default()
    });

    receiver.on_frame(|frame| {
        println!(
            "stream {} {} ts={} {} bytes{} from {}",
            frame.stream_index,
            frame.codec,
            frame.timestamp,
            frame.data.len(),
            if frame.is_key_frame { " [key]" } else { "" },
            frame.remote,
        );
    });

    if let Err(e) = receiver.start() {
        eprintln!("Failed to start receiver: {}", e);
        return;
    }

    println!(
        "RTP receiver on {} — press Enter to stop",
        receiver
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|| format!("{}:{}", args.bind, args.port))
    );
    let mut input = String::new();
    io::stdin().read_line(&mut input).unwrap();

    receiver.close("operator stop");

    let stats = receiver.stats();
    println!(
        "frames: {} emitted, {} discarded; packets: {} RTP, {} RTCP, {} malformed",
        stats.frames_emitted,
        stats.frames_discarded,
        stats.packets_rtp,
        stats.packets_rtcp,
        stats.malformed_dropped,
    );
}
