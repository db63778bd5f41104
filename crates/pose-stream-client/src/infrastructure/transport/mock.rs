//! In-memory connector for unit and integration tests.
//!
//! Every successful `connect` hands the test a [`MockPeer`]: the server's side
//! of the link.  The test reads what the client sent from `peer.sent`, pushes
//! server messages through `peer.replies`, and simulates a server close by
//! dropping `peer.replies` (or the whole peer).
//!
//! ```ignore
//! let (connector, mut peers) = MockConnector::new();
//! // ... start a ConnectionManager with Arc::new(connector) ...
//! let mut peer = peers.recv().await.unwrap();
//! assert_eq!(peer.sent.recv().await.unwrap(), r#"{"exercise":"plank"}"#);
//! peer.replies.send(pose_result_json).await.unwrap();
//! ```
//!
//! Call `refuse_connections(true)` to make every handshake fail.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::application::connection_manager::{Connector, TransportError, TransportLink};

const MOCK_CHANNEL_CAPACITY: usize = 16;

/// The server's end of one mock link.
pub struct MockPeer {
    /// Texts the client transmitted, in order.
    pub sent: mpsc::Receiver<String>,
    /// Texts to deliver to the client.  Dropping this closes the link.
    pub replies: mpsc::Sender<String>,
}

/// A connector that never touches the network.
pub struct MockConnector {
    peers: mpsc::UnboundedSender<MockPeer>,
    refuse: AtomicBool,
    connects: AtomicUsize,
}

impl MockConnector {
    /// Returns the connector and the receiver on which new peers appear.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MockPeer>) {
        let (peers, peers_rx) = mpsc::unbounded_channel();
        let connector = Self {
            peers,
            refuse: AtomicBool::new(false),
            connects: AtomicUsize::new(0),
        };
        (connector, peers_rx)
    }

    /// When `true`, every subsequent handshake fails.
    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Number of handshakes attempted so far, refused ones included.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &str) -> Result<TransportLink, TransportError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(TransportError::Connect {
                url: url.to_string(),
                reason: "connection refused (mock)".to_string(),
            });
        }

        let (outbound, sent) = mpsc::channel(MOCK_CHANNEL_CAPACITY);
        let (replies, inbound) = mpsc::channel(MOCK_CHANNEL_CAPACITY);
        // A test that dropped the peer receiver is not interested in this link.
        let _ = self.peers.send(MockPeer { sent, replies });
        Ok(TransportLink { outbound, inbound })
    }
}
