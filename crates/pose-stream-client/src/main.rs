//! pose-stream: real-time frame streaming client entry point.
//!
//! # Usage
//!
//! ```text
//! pose-stream [stream] [OPTIONS]     stream frames (default command)
//! pose-stream exercises [OPTIONS]    list the backend's exercises
//!
//! Stream options:
//!   -e, --exercise <ID>            exercise to score against
//!       --source <SRC>             "synthetic", /dev/videoN, a file, or a stream URL
//!       --ws-url <URL>             WebSocket endpoint
//!       --api-url <URL>            HTTP API base URL
//!       --send-interval-ms <MS>    minimum spacing between frames [default: 66]
//!       --reconnect-delay-ms <MS>  fixed reconnection delay [default: 2000]
//!       --jpeg-quality <Q>         0–1 [default: 0.6]
//!       --ack-timeout-ms <MS>      reopen the gate after this long without a result
//!       --config <PATH>            TOML config file
//! ```
//!
//! While streaming, type an exercise name and press Enter to switch; type
//! `quit` (or press Ctrl+C) to stop.
//!
//! # Configuration precedence
//!
//! CLI flag > environment variable (`POSE_STREAM_*`) > config file > default.
//!
//! | Variable                  | Description               |
//! |---------------------------|---------------------------|
//! | `POSE_STREAM_CONFIG`      | Config file path          |
//! | `POSE_STREAM_WS_URL`      | WebSocket endpoint        |
//! | `POSE_STREAM_API_URL`     | HTTP API base URL         |
//! | `POSE_STREAM_EXERCISE`    | Initial exercise          |
//! | `POSE_STREAM_SOURCE`      | Capture source            |

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pose_stream_client::application::streaming_session::{SessionController, StreamingSession};
use pose_stream_client::domain::{ClientConfig, ConnectionState, SessionEvent};
use pose_stream_client::infrastructure::capture::open_frame_source;
use pose_stream_client::infrastructure::encoding::JpegDataUrlEncoder;
use pose_stream_client::infrastructure::http_api::ApiClient;
use pose_stream_client::infrastructure::storage::config::{
    load_config_from, load_default_config, parse_capture_source,
};
use pose_stream_client::infrastructure::transport::WsConnector;
use pose_stream_core::{ExerciseId, SkeletonColor};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Streams camera frames to a pose-analysis backend and prints its feedback.
#[derive(Debug, Parser)]
#[command(name = "pose-stream", version, args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    stream: StreamArgs,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Stream frames (the default).
    Stream(StreamArgs),
    /// List the exercises the backend knows.
    Exercises(CommonArgs),
}

#[derive(Debug, Clone, Default, Args)]
struct CommonArgs {
    /// TOML config file.  Defaults to the platform config directory.
    #[arg(long, env = "POSE_STREAM_CONFIG")]
    config: Option<PathBuf>,

    /// Base URL of the backend's HTTP API.
    #[arg(long, env = "POSE_STREAM_API_URL")]
    api_url: Option<String>,
}

#[derive(Debug, Clone, Default, Args)]
struct StreamArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// WebSocket endpoint frames are streamed to.
    #[arg(long, env = "POSE_STREAM_WS_URL")]
    ws_url: Option<String>,

    /// Exercise to score against.
    #[arg(short, long, env = "POSE_STREAM_EXERCISE")]
    exercise: Option<String>,

    /// `synthetic`, a V4L2 device, a video file, or a stream URL.
    #[arg(long, env = "POSE_STREAM_SOURCE")]
    source: Option<String>,

    /// Capture width in pixels.
    #[arg(long)]
    width: Option<u32>,

    /// Capture height in pixels.
    #[arg(long)]
    height: Option<u32>,

    /// Requested device frame rate.
    #[arg(long)]
    fps: Option<u32>,

    /// Minimum spacing between frame sends, in milliseconds.
    #[arg(long)]
    send_interval_ms: Option<u64>,

    /// Delay before reconnecting after a connection loss, in milliseconds.
    #[arg(long)]
    reconnect_delay_ms: Option<u64>,

    /// JPEG quality on a 0–1 scale.
    #[arg(long)]
    jpeg_quality: Option<f32>,

    /// Reopen the gate if a frame is unanswered for this long, in milliseconds.
    #[arg(long)]
    ack_timeout_ms: Option<u64>,

    /// Do not call `POST /start_session` before streaming.
    #[arg(long)]
    skip_start_session: bool,
}

impl CommonArgs {
    /// Loads the config file and applies the common overrides.  The result
    /// is not validated yet; callers validate once all overrides are in.
    fn load(&self) -> anyhow::Result<ClientConfig> {
        let file = match &self.config {
            Some(path) => load_config_from(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => load_default_config().context("failed to load default config")?,
        };
        let mut cfg = file
            .into_client_config_unvalidated()
            .context("invalid config file")?;
        if let Some(url) = &self.api_url {
            cfg.api_url = url.clone();
        }
        Ok(cfg)
    }
}

impl StreamArgs {
    /// Builds the effective [`ClientConfig`]: file values overridden by flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read, the exercise is
    /// blank, or the merged values fail validation.
    fn into_client_config(self) -> anyhow::Result<ClientConfig> {
        let mut cfg = self.common.load()?;

        if let Some(url) = self.ws_url {
            cfg.ws_url = url;
        }
        if let Some(exercise) = self.exercise {
            cfg.exercise = Some(
                ExerciseId::new(&exercise)
                    .with_context(|| format!("invalid exercise '{exercise}'"))?,
            );
        }
        if let Some(source) = self.source {
            cfg.capture.source = parse_capture_source(&source);
        }
        if let Some(width) = self.width {
            cfg.capture.width = width;
        }
        if let Some(height) = self.height {
            cfg.capture.height = height;
        }
        if let Some(fps) = self.fps {
            cfg.capture.fps = fps;
        }
        if let Some(ms) = self.send_interval_ms {
            cfg.send_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = self.reconnect_delay_ms {
            cfg.reconnect_delay = Duration::from_millis(ms);
        }
        if let Some(quality) = self.jpeg_quality {
            cfg.jpeg_quality = quality;
        }
        if let Some(ms) = self.ack_timeout_ms {
            cfg.ack_timeout = Some(Duration::from_millis(ms));
        }

        cfg.validate().context("invalid configuration")?;
        Ok(cfg)
    }
}

/// What a line typed on stdin asks for.
#[derive(Debug, PartialEq)]
enum InputCommand {
    Quit,
    SwitchExercise(ExerciseId),
    Ignore,
}

fn parse_input_line(line: &str) -> InputCommand {
    let line = line.trim();
    if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
        return InputCommand::Quit;
    }
    match ExerciseId::new(line) {
        Ok(exercise) => InputCommand::SwitchExercise(exercise),
        Err(_) => InputCommand::Ignore,
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Stream(cli.stream)) {
        Command::Stream(args) => {
            let cfg = args.clone().into_client_config()?;
            init_tracing(&cfg.log_level);
            run_stream(cfg, args.skip_start_session).await
        }
        Command::Exercises(args) => {
            let cfg = args.load()?;
            cfg.validate().context("invalid configuration")?;
            init_tracing(&cfg.log_level);
            list_exercises(&cfg).await
        }
    }
}

/// `RUST_LOG` wins; otherwise the configured level applies.
fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .init();
}

async fn list_exercises(cfg: &ClientConfig) -> anyhow::Result<()> {
    let api = ApiClient::new(&cfg.api_url)?;
    let exercises = api
        .list_exercises()
        .await
        .context("failed to list exercises")?;
    for exercise in exercises {
        println!("{exercise}");
    }
    Ok(())
}

async fn run_stream(cfg: ClientConfig, skip_start_session: bool) -> anyhow::Result<()> {
    info!(
        "pose-stream starting: ws={}, api={}, exercise={}",
        cfg.ws_url,
        cfg.api_url,
        cfg.exercise.as_ref().map_or("(none)", ExerciseId::as_str)
    );

    let api = Arc::new(ApiClient::new(&cfg.api_url)?);
    if let (Some(exercise), false) = (&cfg.exercise, skip_start_session) {
        announce_session(&api, exercise);
    }

    let source = open_frame_source(&cfg.capture).context("failed to open capture source")?;
    let mut session = StreamingSession::new(
        &cfg,
        source,
        Box::new(JpegDataUrlEncoder::new(cfg.jpeg_quality)),
        Arc::new(WsConnector::new()),
    );

    let (observer, events) = mpsc::unbounded_channel();
    session.set_observer(observer);
    tokio::spawn(report_events(events));

    let handle = session.spawn();

    // ── Ctrl-C handler ────────────────────────────────────────────────────────
    let controller = handle.controller();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, stopping");
                controller.stop();
            }
            Err(e) => tracing::error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    // ── Exercise switching from stdin ─────────────────────────────────────────
    let lines = spawn_stdin_reader();
    tokio::spawn(handle_input(
        lines,
        handle.controller(),
        Arc::clone(&api),
        skip_start_session,
    ));

    let stats = handle.join().await.context("streaming session failed")?;
    info!("pose-stream stopped: {stats}");
    Ok(())
}

/// Calls the session-start side channel on its own task, so a slow API
/// never holds up streaming.  Failure only warns.
fn announce_session(api: &Arc<ApiClient>, exercise: &ExerciseId) {
    let api = Arc::clone(api);
    let exercise = exercise.clone();
    tokio::spawn(async move {
        match api.start_session(&exercise).await {
            Ok(started) => info!("backend loaded reference pose for '{}'", started.exercise),
            Err(e) => warn!("start_session for '{exercise}' failed: {e}"),
        }
    });
}

/// Reads stdin on a plain thread; tokio's stdin would keep the runtime
/// alive on exit while a read is pending.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

async fn handle_input(
    mut lines: mpsc::UnboundedReceiver<String>,
    controller: SessionController,
    api: Arc<ApiClient>,
    skip_start_session: bool,
) {
    while let Some(line) = lines.recv().await {
        match parse_input_line(&line) {
            InputCommand::Quit => {
                info!("stopping on request");
                controller.stop();
                return;
            }
            InputCommand::SwitchExercise(exercise) => {
                if !skip_start_session {
                    announce_session(&api, &exercise);
                }
                if controller.set_exercise(exercise).is_err() {
                    return;
                }
            }
            InputCommand::Ignore => {}
        }
    }
}

async fn report_events(mut events: mpsc::UnboundedReceiver<SessionEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::ConnectionStatus(ConnectionState::Open) => info!("connected"),
            SessionEvent::ConnectionStatus(ConnectionState::Reconnecting) => {
                warn!("connection lost; reconnecting")
            }
            SessionEvent::ConnectionStatus(state) => info!("connection {state}"),
            SessionEvent::PoseResult(result) if !result.detected => {
                info!("no person detected");
            }
            SessionEvent::PoseResult(result) => {
                let verdict = match result.skeleton_color {
                    SkeletonColor::Green => "match",
                    SkeletonColor::Red => "adjust",
                    SkeletonColor::Other(_) => "?",
                };
                info!(
                    "similarity {:.1}% ({verdict}), confidence {:.2}{}{}",
                    result.similarity,
                    result.confidence,
                    if result.issues.is_empty() {
                        String::new()
                    } else {
                        format!(", issues: {}", result.issues.join("; "))
                    },
                    if result.good.is_empty() {
                        String::new()
                    } else {
                        format!(", good: {}", result.good.join("; "))
                    },
                );
            }
            SessionEvent::FrameResized(dimensions) => info!("video size {dimensions}"),
            SessionEvent::SessionStarted { exercise } => info!("session started: {exercise}"),
            SessionEvent::ServerError { message } => warn!("backend error: {message}"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pose_stream_client::domain::CaptureSource;

    fn stream_args(args: &[&str]) -> StreamArgs {
        let mut argv = vec!["pose-stream", "stream", "--config", "/dev/null"];
        argv.extend_from_slice(args);
        match Cli::parse_from(argv).command {
            Some(Command::Stream(args)) => args,
            other => panic!("expected stream command, got {other:?}"),
        }
    }

    #[test]
    fn test_no_subcommand_defaults_to_stream() {
        let cli = Cli::parse_from(["pose-stream", "--exercise", "plank"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.stream.exercise.as_deref(), Some("plank"));
    }

    #[test]
    fn test_exercises_subcommand_parses_api_url() {
        let cli = Cli::parse_from(["pose-stream", "exercises", "--api-url", "http://10.0.0.5:8000"]);
        match cli.command {
            Some(Command::Exercises(common)) => {
                assert_eq!(common.api_url.as_deref(), Some("http://10.0.0.5:8000"));
            }
            other => panic!("expected exercises command, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_config_file_with_no_flags_gives_defaults() {
        // Arrange: /dev/null is an empty TOML document
        let args = stream_args(&[]);

        // Act
        let cfg = args.into_client_config().unwrap();

        // Assert
        assert_eq!(cfg.send_interval, Duration::from_millis(66));
        assert_eq!(cfg.reconnect_delay, Duration::from_secs(2));
        assert_eq!(cfg.ack_timeout, None);
    }

    #[test]
    fn test_flags_override_config() {
        let args = stream_args(&[
            "--ws-url",
            "ws://10.0.0.5:8000/ws/pose",
            "--exercise",
            "Tree",
            "--source",
            "/dev/video1",
            "--send-interval-ms",
            "100",
            "--ack-timeout-ms",
            "3000",
        ]);

        let cfg = args.into_client_config().unwrap();

        assert_eq!(cfg.ws_url, "ws://10.0.0.5:8000/ws/pose");
        assert_eq!(cfg.exercise.unwrap().as_str(), "tree");
        assert_eq!(
            cfg.capture.source,
            CaptureSource::Device("/dev/video1".to_string())
        );
        assert_eq!(cfg.send_interval, Duration::from_millis(100));
        assert_eq!(cfg.ack_timeout, Some(Duration::from_secs(3)));
    }

    fn write_config(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("pose-stream-{}-{name}.toml", std::process::id()));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_flag_overrides_invalid_file_value_before_validation() {
        // Arrange: the file's ws_url alone would fail validation
        let path = write_config("bad-ws-url", "[connection]\nws_url = \"http://10.0.0.5/ws\"\n");
        let path_arg = path.to_string_lossy().into_owned();
        let parse = |extra: &[&str]| {
            let mut argv = vec!["pose-stream", "stream", "--config", path_arg.as_str()];
            argv.extend_from_slice(extra);
            match Cli::parse_from(argv).command {
                Some(Command::Stream(args)) => args,
                other => panic!("expected stream command, got {other:?}"),
            }
        };

        // Act
        let overridden = parse(&["--ws-url", "ws://10.0.0.5/ws/pose"]).into_client_config();
        let from_file = parse(&[]).into_client_config();
        std::fs::remove_file(&path).unwrap();

        // Assert
        assert_eq!(overridden.unwrap().ws_url, "ws://10.0.0.5/ws/pose");
        assert!(from_file.is_err());
    }

    #[test]
    fn test_invalid_quality_flag_is_rejected() {
        let args = stream_args(&["--jpeg-quality", "2.0"]);
        assert!(args.into_client_config().is_err());
    }

    #[test]
    fn test_blank_exercise_flag_is_rejected() {
        let args = stream_args(&["--exercise", "   "]);
        assert!(args.into_client_config().is_err());
    }

    #[tokio::test]
    async fn test_exercise_switch_does_not_wait_for_stalled_api() {
        use pose_stream_client::infrastructure::capture::synthetic::SyntheticFrameSource;
        use pose_stream_client::infrastructure::transport::mock::MockConnector;
        use pose_stream_core::protocol::decode_client_message;
        use pose_stream_core::{ClientMessage, FrameDimensions};
        use tokio::net::TcpListener;
        use tokio::time::timeout;

        // Arrange: an HTTP API that accepts connections and never answers
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let api_url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        let api = Arc::new(ApiClient::new(&api_url).unwrap());

        let (connector, mut peers) = MockConnector::new();
        let session = StreamingSession::new(
            &ClientConfig::default(),
            Box::new(SyntheticFrameSource::new(FrameDimensions::new(8, 6))),
            Box::new(JpegDataUrlEncoder::new(0.6)),
            Arc::new(connector),
        );
        let handle = session.spawn();
        let mut peer = timeout(Duration::from_secs(2), peers.recv())
            .await
            .unwrap()
            .unwrap();

        let (lines_tx, lines) = mpsc::unbounded_channel();
        tokio::spawn(handle_input(lines, handle.controller(), api, false));

        // Act
        lines_tx.send("Warrior".to_string()).unwrap();

        // Assert: the new exercise reaches the socket while start_session hangs
        let switched = timeout(Duration::from_secs(2), async {
            while let Some(text) = peer.sent.recv().await {
                if let Ok(ClientMessage::Exercise { exercise }) = decode_client_message(&text) {
                    return exercise;
                }
            }
            String::new()
        })
        .await
        .expect("exercise switch was held up by the HTTP call");
        assert_eq!(switched, "warrior");

        lines_tx.send("quit".to_string()).unwrap();
        let stopped = timeout(Duration::from_secs(2), handle.join()).await;
        assert!(stopped.is_ok(), "quit was held up by the HTTP call");
    }

    #[test]
    fn test_parse_input_line() {
        assert_eq!(parse_input_line("quit"), InputCommand::Quit);
        assert_eq!(parse_input_line("  EXIT "), InputCommand::Quit);
        assert_eq!(parse_input_line(""), InputCommand::Ignore);
        assert_eq!(
            parse_input_line("Warrior\n"),
            InputCommand::SwitchExercise(ExerciseId::new("warrior").unwrap())
        );
    }
}
