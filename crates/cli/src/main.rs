use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::Instant;

use clap::Parser;
use rtp_jpeg::{FrameSource, MjpegPacketizer, Packetizer, StillImageSource, StreamConfig, UdpTransport};

#[derive(Parser)]
#[command(
    name = "rtp-jpeg-streamer",
    about = "Stream a JPEG image as RTP/JPEG (RFC 2435) over UDP"
)]
struct Args {
    /// JPEG file sent on every tick
    #[arg(long)]
    jpeg: PathBuf,

    /// Frames per second
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    fps: u32,

    /// Destination address (host:port)
    #[arg(long, default_value = "127.0.0.1:16384")]
    dest: String,

    /// Largest RTP payload in bytes, excluding the RTP header
    #[arg(long, default_value_t = 1400)]
    max_payload: usize,

    /// Number of ticks to run; 0 runs until killed
    #[arg(long, default_value_t = 0)]
    frames: u64,
}

fn resolve(dest: &str) -> rtp_jpeg::Result<SocketAddr> {
    dest.to_socket_addrs()?.next().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{dest} did not resolve to an address"),
        )
        .into()
    })
}

fn run(args: Args) -> rtp_jpeg::Result<()> {
    let config = StreamConfig {
        max_payload_size: args.max_payload,
        frame_rate: args.fps,
        ..StreamConfig::default()
    };
    let mut packetizer = MjpegPacketizer::from_config(&config)?;
    let mut source = StillImageSource::from_path(&args.jpeg)?;
    let transport = UdpTransport::bind()?;
    let dest = resolve(&args.dest)?;

    for line in packetizer.sdp_attributes() {
        tracing::info!(%line, "SDP");
    }
    tracing::info!(%dest, fps = args.fps, ssrc = format_args!("{:#010X}", packetizer.ssrc()), "streaming");

    let interval = config.frame_interval();
    let increment = config.timestamp_increment();
    let mut next_tick = Instant::now();
    let mut tick = 0u64;

    while args.frames == 0 || tick < args.frames {
        let Some(frame) = source.next_frame()? else {
            break;
        };
        let packets = packetizer.packetize(frame, increment);
        if let Err(e) = transport.send_all(&packets, dest) {
            tracing::warn!(error = %e, tick, "send failed");
        }
        tick += 1;

        next_tick += interval;
        match next_tick.checked_duration_since(Instant::now()) {
            Some(wait) => thread::sleep(wait),
            None => {
                tracing::debug!(tick, "tick overran its interval");
                next_tick = Instant::now();
            }
        }
    }

    tracing::info!(ticks = tick, "stream finished");
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Failed to stream: {}", e);
            ExitCode::FAILURE
        }
    }
}
