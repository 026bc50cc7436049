//! voxlink CLI binary.
//!
//! Device-side voice link tooling.
//!
//! # Commands
//!
//! - `negotiate` - Run the provisioning exchange and print the result
//! - `connect` - Open a session, stream audio, print inbound traffic
//! - `serve` - Start the loopback provisioning/streaming server
//! - `frame` - Encode or decode a single binary frame

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use voxlink::{
    codec::{FrameCodec, ProtocolVersion},
    provision::{Negotiator, OtaNegotiator},
    server::{self, ServerConfig},
    Config, ControlMessage, EventHandler, Session, SessionEvent, SessionState, VERSION,
};

/// How long `connect` waits for the hello exchange
const CONNECT_WAIT: Duration = Duration::from_secs(15);

#[derive(Parser)]
#[command(name = "voxlink")]
#[command(version = VERSION)]
#[command(about = "voxlink - Voice device connection protocol", long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/voxlink/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run provisioning and print the connection parameters
    Negotiate {
        /// Provisioning URL (overrides config)
        #[arg(short, long)]
        url: Option<String>,
    },

    /// Open a streaming session
    Connect {
        /// Provisioning URL (overrides config)
        #[arg(short, long)]
        url: Option<String>,

        /// File of raw audio payloads to stream
        #[arg(short, long)]
        audio: Option<PathBuf>,

        /// Payload size when splitting the audio file
        #[arg(long, default_value = "320")]
        chunk: usize,

        /// Control message (JSON) to send once streaming
        #[arg(long)]
        send: Option<String>,

        /// Seconds to stay connected (default: until Ctrl-C)
        #[arg(short, long)]
        duration: Option<u64>,
    },

    /// Start the loopback server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8002")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Bind to all interfaces (0.0.0.0)
        #[arg(long)]
        bind_all: bool,

        /// Protocol version to hand out (1, 2 or 3)
        #[arg(long, default_value = "1")]
        protocol: ProtocolVersion,

        /// Credential to hand out and require
        #[arg(long)]
        token: Option<String>,

        /// Activation code to return with provisioning
        #[arg(long)]
        activation: Option<String>,

        /// Do not echo audio
        #[arg(long)]
        no_echo: bool,
    },

    /// Frame utilities
    Frame {
        #[command(subcommand)]
        action: FrameAction,
    },
}

#[derive(Subcommand)]
enum FrameAction {
    /// Wrap a hex payload in a frame
    Encode {
        /// Protocol version (1, 2 or 3)
        #[arg(short, long, default_value = "3")]
        protocol: ProtocolVersion,

        /// Timestamp for v2 frames (default: wall clock)
        #[arg(short, long)]
        timestamp: Option<u32>,

        /// Payload as hex
        payload: String,
    },

    /// Extract the payload from a hex frame
    Decode {
        /// Protocol version (1, 2 or 3)
        #[arg(short, long, default_value = "3")]
        protocol: ProtocolVersion,

        /// Frame as hex
        frame: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if !matches!(cli.command, Commands::Frame { .. }) {
        init_logging(&cli.log_level, cli.json_logs);
    }

    match cli.command {
        Commands::Negotiate { url } => cmd_negotiate(cli.config, url),

        Commands::Connect {
            url,
            audio,
            chunk,
            send,
            duration,
        } => cmd_connect(cli.config, url, audio, chunk, send, duration),

        Commands::Serve {
            port,
            host,
            bind_all,
            protocol,
            token,
            activation,
            no_echo,
        } => cmd_serve(cli.config, port, host, bind_all, protocol, token, activation, no_echo),

        Commands::Frame { action } => cmd_frame(action),
    }
}

fn init_logging(log_level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn load_config(path: Option<PathBuf>, url: Option<String>) -> anyhow::Result<Config> {
    let mut config = Config::load(path)?;
    if let Some(url) = url {
        config.provisioning.url = url;
    }
    Ok(config)
}

fn cmd_negotiate(path: Option<PathBuf>, url: Option<String>) -> anyhow::Result<()> {
    let config = load_config(path, url)?;
    let negotiator = OtaNegotiator::from_config(&config.provisioning)?;
    let identity = config.identity();

    let runtime = tokio::runtime::Runtime::new()?;
    let params = runtime.block_on(negotiator.negotiate(&identity))?;

    println!("{}", serde_json::to_string_pretty(&params)?);
    Ok(())
}

fn cmd_connect(
    path: Option<PathBuf>,
    url: Option<String>,
    audio: Option<PathBuf>,
    chunk: usize,
    send: Option<String>,
    duration: Option<u64>,
) -> anyhow::Result<()> {
    let config = load_config(path, url)?;
    let control = send.map(|s| ControlMessage::parse(&s)).transpose()?;
    let audio = audio.map(std::fs::read).transpose()?;
    let frame_interval = Duration::from_millis(u64::from(config.audio.frame_duration_ms));

    let (handler, events) = EventHandler::channel();
    let session = Session::from_config(&config, Arc::new(handler))?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let printer = tokio::spawn(print_events(events));

        session.open().await?;
        if !session.wait_for(SessionState::Streaming, CONNECT_WAIT).await {
            anyhow::bail!("session did not reach streaming (state: {})", session.state());
        }

        if let Some(message) = &control {
            session.send_control(message)?;
        }

        let deadline = stop_signal(duration);
        tokio::pin!(deadline);

        let mut stopped = false;
        if let Some(bytes) = &audio {
            for payload in bytes.chunks(chunk.max(1)) {
                tokio::select! {
                    () = &mut deadline => {
                        stopped = true;
                        break;
                    },
                    () = tokio::time::sleep(frame_interval) => {},
                }
                if let Err(err) = session.send_audio(payload) {
                    tracing::warn!(error = %err, "Audio frame not sent");
                }
            }
        }
        if !stopped {
            deadline.await;
        }

        session.close().await;
        printer.abort();
        Ok::<_, anyhow::Error>(())
    })?;

    println!("{}", serde_json::to_string_pretty(&session.stats())?);
    Ok(())
}

/// Resolves after `duration` seconds, or on Ctrl-C
async fn stop_signal(duration: Option<u64>) {
    let elapsed = async {
        match duration {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    let interrupted = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    tokio::select! {
        () = elapsed => {},
        () = interrupted => {},
    }
}

async fn print_events(mut events: mpsc::UnboundedReceiver<SessionEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::Audio(payload) => println!("<< audio {} bytes", payload.len()),
            SessionEvent::Control(message) => {
                println!("<< {}", message.to_json().unwrap_or_default());
            },
            SessionEvent::StateChanged { from, to } => println!("-- {from} -> {to}"),
            SessionEvent::FrameDropped(err) => println!("!! dropped frame: {err}"),
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_serve(
    path: Option<PathBuf>,
    port: u16,
    host: String,
    bind_all: bool,
    protocol: ProtocolVersion,
    token: Option<String>,
    activation: Option<String>,
    no_echo: bool,
) -> anyhow::Result<()> {

    let mut config = match path {
        Some(path) => Config::from_file(path)?.server,
        None => ServerConfig::default(),
    };

    if bind_all {
        config = config.with_port(port).bind_all();
    } else {
        let addr: std::net::SocketAddr = format!("{host}:{port}").parse()?;
        config = config.with_addr(addr);
    }
    config = config.with_version(protocol);

    if let Some(token) = token {
        config = config.with_token(&token);
    }
    if let Some(code) = activation {
        config = config.with_activation(&code);
    }
    if no_echo {
        config = config.without_echo();
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let listener = server::bind(&config).await?;
        server::serve(listener, config).await?;
        Ok::<_, anyhow::Error>(())
    })
}

fn cmd_frame(action: FrameAction) -> anyhow::Result<()> {
    match action {
        FrameAction::Encode {
            protocol,
            timestamp,
            payload,
        } => {
            let codec = FrameCodec::new(protocol);
            let payload = from_hex(&payload)?;
            let frame = match timestamp {
                Some(ts) => codec.encode_at(&payload, ts)?,
                None => codec.encode(&payload)?,
            };
            println!("{}", to_hex(&frame));
        },
        FrameAction::Decode { protocol, frame } => {
            let codec = FrameCodec::new(protocol);
            let frame = from_hex(&frame)?;
            let payload = codec.decode(&frame)?;
            println!("{}", to_hex(payload));
        },
    }
    Ok(())
}

// Helper functions

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn from_hex(input: &str) -> anyhow::Result<Vec<u8>> {
    let digits: Vec<u8> = input
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    if digits.len() % 2 != 0 {
        anyhow::bail!("hex input has odd length");
    }

    digits
        .chunks(2)
        .map(|pair| {
            let text = std::str::from_utf8(pair)?;
            u8::from_str_radix(text, 16).map_err(|_| anyhow::anyhow!("invalid hex: {text}"))
        })
        .collect()
}
