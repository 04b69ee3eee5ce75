//! The extension bridge: `RuleTable` over native messaging

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use warden_browser_api::{
    BrowserError, BrowserEvent, BrowserResult, CompiledRule, InstalledRule, RuleTable, TabId,
};

use crate::{read_frame, write_frame};

/// Messages from the service to the extension
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OutgoingMessage {
    ListRules {
        request_id: u64,
    },
    RemoveRules {
        request_id: u64,
        ids: Vec<u32>,
    },
    AddRules {
        request_id: u64,
        rules: Vec<CompiledRule>,
    },
    RedirectTab {
        request_id: u64,
        tab: TabId,
        target: String,
    },
}

impl OutgoingMessage {
    fn request_id(&self) -> u64 {
        match self {
            Self::ListRules { request_id }
            | Self::RemoveRules { request_id, .. }
            | Self::AddRules { request_id, .. }
            | Self::RedirectTab { request_id, .. } => *request_id,
        }
    }
}

/// Messages from the extension to the service
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IncomingMessage {
    /// A top-level navigation began loading
    Navigation { tab: i64, url: String },

    /// Response to `ListRules`
    Rules {
        request_id: u64,
        rules: Vec<InstalledRule>,
    },

    /// Response to a mutation
    Ack {
        request_id: u64,
        ok: bool,
        #[serde(default)]
        error: Option<String>,
    },
}

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<IncomingMessage>>>>;

/// `RuleTable` implementation speaking the native-messaging protocol.
pub struct ExtensionBridge {
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    pending: PendingMap,
    next_request_id: AtomicU64,
    event_rx: Mutex<Option<mpsc::UnboundedReceiver<BrowserEvent>>>,
    connected: Arc<AtomicBool>,
}

impl ExtensionBridge {
    /// Attach to the native-messaging pipes the browser opened for us.
    pub fn from_stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }

    /// Build a bridge over arbitrary byte streams (tests use an in-memory
    /// duplex pipe).
    pub fn new(
        reader: impl AsyncRead + Unpin + Send + 'static,
        writer: impl AsyncWrite + Unpin + Send + 'static,
    ) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let connected = Arc::new(AtomicBool::new(true));

        tokio::spawn(Self::write_loop(writer, outbound_rx));
        tokio::spawn(Self::read_loop(
            reader,
            event_tx,
            pending.clone(),
            connected.clone(),
        ));

        Self {
            outbound: outbound_tx,
            pending,
            next_request_id: AtomicU64::new(1),
            event_rx: Mutex::new(Some(event_rx)),
            connected,
        }
    }

    async fn write_loop(
        mut writer: impl AsyncWrite + Unpin,
        mut outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    ) {
        while let Some(payload) = outbound.recv().await {
            if let Err(e) = write_frame(&mut writer, &payload).await {
                warn!(error = %e, "Bridge write failed");
                break;
            }
        }
    }

    async fn read_loop(
        mut reader: impl AsyncRead + Unpin,
        event_tx: mpsc::UnboundedSender<BrowserEvent>,
        pending: PendingMap,
        connected: Arc<AtomicBool>,
    ) {
        loop {
            let payload = match read_frame(&mut reader).await {
                Ok(payload) => payload,
                Err(e) => {
                    debug!(error = %e, "Bridge closed");
                    break;
                }
            };

            let message: IncomingMessage = match serde_json::from_slice(&payload) {
                Ok(message) => message,
                Err(e) => {
                    warn!(error = %e, "Invalid bridge message, dropped");
                    continue;
                }
            };

            match message {
                IncomingMessage::Navigation { tab, url } => {
                    let _ = event_tx.send(BrowserEvent::NavigationStarted {
                        tab: TabId(tab),
                        url,
                    });
                }
                IncomingMessage::Rules { request_id, .. }
                | IncomingMessage::Ack { request_id, .. } => {
                    let sender = pending.lock().unwrap().remove(&request_id);
                    match sender {
                        Some(sender) => {
                            let _ = sender.send(message);
                        }
                        None => {
                            warn!(request_id, "Response with no pending request");
                        }
                    }
                }
            }
        }

        connected.store(false, Ordering::SeqCst);
        // Wake everything still waiting; dropped senders surface as Closed
        pending.lock().unwrap().clear();
    }

    fn next_request_id(&self) -> u64 {
        self.next_request_id.fetch_add(1, Ordering::SeqCst)
    }

    async fn request(&self, message: OutgoingMessage) -> BrowserResult<IncomingMessage> {
        let request_id = message.request_id();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().insert(request_id, tx);

        let payload =
            serde_json::to_vec(&message).map_err(|e| BrowserError::Protocol(e.to_string()))?;

        if self.outbound.send(payload).is_err() {
            self.pending.lock().unwrap().remove(&request_id);
            return Err(BrowserError::Closed);
        }

        // The read loop flips `connected` before draining pending entries;
        // re-checking here closes the race where it shut down between our
        // insert and the drain.
        if !self.connected.load(Ordering::SeqCst) {
            self.pending.lock().unwrap().remove(&request_id);
            return Err(BrowserError::Closed);
        }

        rx.await.map_err(|_| BrowserError::Closed)
    }

    async fn expect_ack(&self, message: OutgoingMessage) -> BrowserResult<()> {
        match self.request(message).await? {
            IncomingMessage::Ack { ok: true, .. } => Ok(()),
            IncomingMessage::Ack { error, .. } => Err(BrowserError::Protocol(
                error.unwrap_or_else(|| "rejected by extension".into()),
            )),
            other => Err(BrowserError::Protocol(format!(
                "unexpected response: {:?}",
                other
            ))),
        }
    }
}

#[async_trait]
impl RuleTable for ExtensionBridge {
    async fn list_rules(&self) -> BrowserResult<Vec<InstalledRule>> {
        let request_id = self.next_request_id();
        match self.request(OutgoingMessage::ListRules { request_id }).await? {
            IncomingMessage::Rules { rules, .. } => Ok(rules),
            IncomingMessage::Ack { error, .. } => Err(BrowserError::Protocol(
                error.unwrap_or_else(|| "list_rules rejected".into()),
            )),
            other => Err(BrowserError::Protocol(format!(
                "unexpected response: {:?}",
                other
            ))),
        }
    }

    async fn remove_rules(&self, ids: Vec<u32>) -> BrowserResult<()> {
        let request_id = self.next_request_id();
        self.expect_ack(OutgoingMessage::RemoveRules { request_id, ids })
            .await
    }

    async fn add_rules(&self, rules: Vec<CompiledRule>) -> BrowserResult<()> {
        let request_id = self.next_request_id();
        self.expect_ack(OutgoingMessage::AddRules { request_id, rules })
            .await
    }

    async fn redirect_navigation(&self, tab: TabId, target: String) -> BrowserResult<()> {
        let request_id = self.next_request_id();
        self.expect_ack(OutgoingMessage::RedirectTab {
            request_id,
            tab,
            target,
        })
        .await
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<BrowserEvent> {
        self.event_rx
            .lock()
            .unwrap()
            .take()
            .expect("subscribe() can only be called once")
    }

    fn is_healthy(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
