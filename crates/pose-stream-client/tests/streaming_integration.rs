//! Integration tests for a streaming session against a real WebSocket server.
//!
//! # Purpose
//!
//! These tests run the full client stack (`StreamingSession`, `WsConnector`,
//! the JPEG encoder, and a synthetic frame source) against a local
//! `tokio-tungstenite` server standing in for the pose backend.  They verify:
//!
//! - The exercise is sent first, then one frame, and nothing more until the
//!   server answers with a `pose_result`.
//! - A malformed reply does not release the next frame.
//! - After the server drops the connection the client reconnects and sends
//!   the exercise again before any frame.
//! - Stopping the session closes the socket.
//!
//! # Test server
//!
//! ```text
//! client ──ws──► accept loop ──► ServerConn { received, replies }
//! ```
//!
//! Each accepted connection is handed to the test as a [`ServerConn`]: read
//! what the client sent from `received`, push replies (or a close) through
//! `replies`.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{accept_async, tungstenite::Message};

use pose_stream_client::application::streaming_session::{SessionHandle, StreamingSession};
use pose_stream_client::domain::{ClientConfig, ConnectionState, SessionEvent};
use pose_stream_client::infrastructure::capture::synthetic::SyntheticFrameSource;
use pose_stream_client::infrastructure::encoding::JpegDataUrlEncoder;
use pose_stream_client::infrastructure::transport::WsConnector;
use pose_stream_core::protocol::decode_client_message;
use pose_stream_core::{ClientMessage, ExerciseId, FrameDimensions};

const WAIT: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_millis(300);

const POSE_RESULT: &str = r#"{"type":"pose_result","detected":true,"skeleton_color":"green",
    "similarity":88.4,"confidence":0.91,"issues":[],"good":["Left elbow angle looks good"],
    "keypoints":[[0.41,0.22,0.98],[0.43,0.25,0.97]]}"#;

// ── Test server ───────────────────────────────────────────────────────────────

enum Reply {
    Text(String),
    Close,
}

/// The server side of one accepted WebSocket connection.
struct ServerConn {
    received: mpsc::UnboundedReceiver<String>,
    replies: mpsc::UnboundedSender<Reply>,
}

impl ServerConn {
    async fn next(&mut self) -> Option<ClientMessage> {
        let text = timeout(WAIT, self.received.recv()).await.ok()??;
        Some(decode_client_message(&text).expect("client sent valid JSON"))
    }

    /// Asserts that the client sends nothing for a while.
    async fn expect_quiet(&mut self) {
        if let Ok(Some(text)) = timeout(QUIET, self.received.recv()).await {
            panic!("client sent unexpectedly: {text:.80}");
        }
    }

    fn reply(&self, text: &str) {
        self.replies.send(Reply::Text(text.to_string())).unwrap();
    }
}

/// Starts the test server and returns its `ws://` URL plus the stream of
/// accepted connections.
async fn start_server() -> (String, mpsc::UnboundedReceiver<ServerConn>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws/pose", listener.local_addr().unwrap());
    let (conn_tx, conn_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let Ok(ws) = accept_async(stream).await else {
                continue;
            };
            let (received_tx, received) = mpsc::unbounded_channel();
            let (replies, mut replies_rx) = mpsc::unbounded_channel();
            if conn_tx.send(ServerConn { received, replies }).is_err() {
                return;
            }

            tokio::spawn(async move {
                let (mut sink, mut stream) = ws.split();
                loop {
                    tokio::select! {
                        reply = replies_rx.recv() => match reply {
                            Some(Reply::Text(text)) => {
                                if sink.send(Message::Text(text)).await.is_err() {
                                    break;
                                }
                            }
                            Some(Reply::Close) | None => {
                                let _ = sink.send(Message::Close(None)).await;
                                break;
                            }
                        },
                        incoming = stream.next() => match incoming {
                            Some(Ok(Message::Text(text))) => {
                                let _ = received_tx.send(text);
                            }
                            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                            Some(Ok(_)) => {}
                        },
                    }
                }
            });
        }
    });

    (url, conn_rx)
}

// ── Client helpers ────────────────────────────────────────────────────────────

fn client_config(url: &str, exercise: Option<&str>) -> ClientConfig {
    let mut cfg = ClientConfig {
        ws_url: url.to_string(),
        exercise: exercise.map(|e| ExerciseId::new(e).unwrap()),
        send_interval: Duration::from_millis(20),
        tick_interval: Duration::from_millis(5),
        reconnect_delay: Duration::from_millis(200),
        ..Default::default()
    };
    cfg.capture.width = 32;
    cfg.capture.height = 24;
    cfg
}

fn start_client(cfg: &ClientConfig) -> (SessionHandle, mpsc::UnboundedReceiver<SessionEvent>) {
    let mut session = StreamingSession::new(
        cfg,
        Box::new(SyntheticFrameSource::new(FrameDimensions::new(
            cfg.capture.width,
            cfg.capture.height,
        ))),
        Box::new(JpegDataUrlEncoder::new(cfg.jpeg_quality)),
        Arc::new(WsConnector::new()),
    );
    let (observer, events) = mpsc::unbounded_channel();
    session.set_observer(observer);
    (session.spawn(), events)
}

fn assert_frame(msg: Option<ClientMessage>) {
    match msg {
        Some(ClientMessage::Frame { frame }) => {
            assert!(frame.starts_with("data:image/jpeg;base64,"), "bad payload");
        }
        other => panic!("expected a frame, got {other:?}"),
    }
}

fn assert_exercise(msg: Option<ClientMessage>, expected: &str) {
    match msg {
        Some(ClientMessage::Exercise { exercise }) => assert_eq!(exercise, expected),
        other => panic!("expected exercise '{expected}', got {other:?}"),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

/// The exercise goes first, then exactly one frame per acknowledgment.
#[tokio::test]
async fn test_one_frame_in_flight_until_pose_result() {
    // Arrange
    let (url, mut conns) = start_server().await;
    let cfg = client_config(&url, Some("Plank"));
    let (handle, mut events) = start_client(&cfg);
    let mut conn = timeout(WAIT, conns.recv()).await.unwrap().unwrap();

    // Act / Assert: context, one frame, then silence
    assert_exercise(conn.next().await, "plank");
    assert_frame(conn.next().await);
    conn.expect_quiet().await;

    // The result releases the next frame and reaches the observer.
    conn.reply(POSE_RESULT);
    assert_frame(conn.next().await);

    let result = timeout(WAIT, async {
        loop {
            if let Some(SessionEvent::PoseResult(result)) = events.recv().await {
                return result;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(result.keypoints.len(), 2);
    assert!((result.similarity - 88.4).abs() < f64::EPSILON);

    handle.stop();
    let stats = handle.join().await.unwrap();
    assert_eq!(stats.results_received, 1);
    assert_eq!(stats.frames_sent, 2);
}

/// Malformed and unknown replies are not acknowledgments.
#[tokio::test]
async fn test_malformed_reply_does_not_release_gate() {
    let (url, mut conns) = start_server().await;
    let (handle, _events) = start_client(&client_config(&url, None));
    let mut conn = timeout(WAIT, conns.recv()).await.unwrap().unwrap();
    assert_frame(conn.next().await);

    conn.reply("{\"type\":\"pose_result\",\"similarity\":");
    conn.reply(r#"{"type":"other"}"#);
    conn.expect_quiet().await;

    conn.reply(POSE_RESULT);
    assert_frame(conn.next().await);

    handle.stop();
    let stats = handle.join().await.unwrap();
    assert_eq!(stats.malformed_messages, 1);
}

/// A server-initiated close leads to a reconnect that resends the exercise
/// before any frame.
#[tokio::test]
async fn test_reconnect_resends_exercise_before_frames() {
    // Arrange
    let (url, mut conns) = start_server().await;
    let (handle, mut events) = start_client(&client_config(&url, Some("tree")));
    let mut first = timeout(WAIT, conns.recv()).await.unwrap().unwrap();
    assert_exercise(first.next().await, "tree");
    assert_frame(first.next().await);

    // Act: the server hangs up without answering the frame
    first.replies.send(Reply::Close).unwrap();
    let mut second = timeout(WAIT, conns.recv()).await.unwrap().unwrap();

    // Assert: the new connection starts with the context and the gate is open
    assert_exercise(second.next().await, "tree");
    assert_frame(second.next().await);

    let mut statuses = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::ConnectionStatus(state) = event {
            statuses.push(state);
        }
    }
    assert!(statuses.contains(&ConnectionState::Reconnecting));
    assert_eq!(statuses.last(), Some(&ConnectionState::Open));

    handle.stop();
    let stats = handle.join().await.unwrap();
    assert_eq!(stats.connection_losses, 1);
}

/// Switching the exercise mid-stream sends the new context on the open
/// connection.
#[tokio::test]
async fn test_exercise_switch_is_sent_immediately() {
    let (url, mut conns) = start_server().await;
    let (handle, _events) = start_client(&client_config(&url, Some("plank")));
    let mut conn = timeout(WAIT, conns.recv()).await.unwrap().unwrap();
    assert_exercise(conn.next().await, "plank");
    assert_frame(conn.next().await);

    handle
        .set_exercise(ExerciseId::new("warrior").unwrap())
        .unwrap();

    assert_exercise(conn.next().await, "warrior");

    handle.stop();
    handle.join().await.unwrap();
}

/// Stopping the session closes the socket and no reconnection follows.
#[tokio::test]
async fn test_stop_closes_connection() {
    let (url, mut conns) = start_server().await;
    let (handle, _events) = start_client(&client_config(&url, None));
    let mut conn = timeout(WAIT, conns.recv()).await.unwrap().unwrap();
    assert_frame(conn.next().await);

    handle.stop();
    handle.join().await.unwrap();

    // The server-side reader ends once the client's close arrives.
    assert!(timeout(WAIT, conn.received.recv()).await.unwrap().is_none());
    assert!(timeout(QUIET, conns.recv()).await.is_err(), "no reconnect after stop");
}
