//! wardend - The site-warden background service
//!
//! This is the main entry point for the wardend service.
//! It wires together all the components:
//! - Policy store (SQLite)
//! - Browser bridge (native messaging)
//! - Rule engine (compiler, synchronizer, scheduler)
//! - IPC server for the popup/admin surface

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use warden_api::{
    Command, ErrorCode, ErrorInfo, Event, EventPayload, HealthStatus, Response, ResponsePayload,
    ServiceStateSnapshot, API_VERSION,
};
use warden_browser_api::{BrowserEvent, RuleTable};
use warden_browser_ext::ExtensionBridge;
use warden_core::{
    blocked_page_target, find_blocking_policy, EngineError, RuleSynchronizer, Scheduler,
    DEFAULT_REFRESH_PERIOD,
};
use warden_ipc::{IpcServer, ServerMessage};
use warden_policy::{validate_draft, validate_window, PolicyDraft, ValidationError};
use warden_store::{SqliteStore, Store, StoreError};
use warden_util::{default_data_dir, default_socket_path, ClientId, RateLimiter};

/// wardend - Scheduled website-access control service
#[derive(Parser, Debug)]
#[command(name = "wardend")]
#[command(about = "Scheduled website-access control service", long_about = None)]
struct Args {
    /// Socket path override (or set WARDEN_SOCKET env var)
    #[arg(short, long, env = "WARDEN_SOCKET")]
    socket: Option<PathBuf>,

    /// Data directory override (or set WARDEN_DATA_DIR env var)
    #[arg(short, long, env = "WARDEN_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Seconds between periodic rule refreshes
    #[arg(long, default_value_t = DEFAULT_REFRESH_PERIOD.as_secs())]
    refresh_period: u64,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// Main service state
struct Service {
    store: Arc<dyn Store>,
    table: Arc<dyn RuleTable>,
    sync: Arc<RuleSynchronizer>,
    scheduler: Arc<Scheduler>,
    ipc: Arc<IpcServer>,
    rate_limiter: Arc<Mutex<RateLimiter>>,
}

impl Service {
    async fn new(args: &Args) -> Result<Self> {
        let socket_path = args.socket.clone().unwrap_or_else(default_socket_path);
        let data_dir = args.data_dir.clone().unwrap_or_else(default_data_dir);

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let db_path = data_dir.join("warden.db");
        let store: Arc<dyn Store> = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );

        info!(db_path = %db_path.display(), "Store initialized");

        // The browser launched us as its native host; stdin/stdout belong
        // to the extension bridge.
        let table: Arc<dyn RuleTable> = Arc::new(ExtensionBridge::from_stdio());

        let sync = Arc::new(RuleSynchronizer::new(table.clone()));
        let scheduler = Arc::new(Scheduler::new(
            store.clone(),
            sync.clone(),
            Duration::from_secs(args.refresh_period),
        ));

        let mut ipc = IpcServer::new(&socket_path);
        ipc.start().await?;

        info!(socket_path = %socket_path.display(), "IPC server started");

        // 30 requests per second per client
        let rate_limiter = Arc::new(Mutex::new(RateLimiter::new(30, Duration::from_secs(1))));

        Ok(Self {
            store,
            table,
            sync,
            scheduler,
            ipc: Arc::new(ipc),
            rate_limiter,
        })
    }

    async fn run(self) -> Result<()> {
        let mut browser_events = self.table.subscribe();

        let ipc_ref = self.ipc.clone();
        let mut ipc_messages = ipc_ref
            .take_message_receiver()
            .await
            .expect("Message receiver should be available");

        // Spawn IPC accept task
        let ipc_accept = ipc_ref.clone();
        tokio::spawn(async move {
            if let Err(e) = ipc_accept.run().await {
                error!(error = %e, "IPC server error");
            }
        });

        // The re-evaluation loop: periodic + store-change triggered
        self.scheduler.start();

        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;
        let mut sighup = signal(SignalKind::hangup()).context("Failed to create SIGHUP handler")?;

        info!("Service running");

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }
                // Sent when the browser tears the native host down
                _ = sighup.recv() => {
                    info!("Received SIGHUP, shutting down gracefully");
                    break;
                }

                // Navigation fallback: check page loads against the live
                // policy set, independent of the installed rules
                Some(event) = browser_events.recv() => {
                    self.handle_browser_event(event).await;
                }

                Some(msg) = ipc_messages.recv() => {
                    self.handle_ipc_message(msg).await;
                }
            }
        }

        info!("Shutting down wardend");

        self.scheduler.stop();
        self.ipc.broadcast_event(Event::new(EventPayload::Shutdown));

        info!("Shutdown complete");
        Ok(())
    }

    /// The synchronous safety net behind the declarative rules: covers the
    /// staleness window of the periodic cadence and the remove-then-add
    /// replacement gap.
    async fn handle_browser_event(&self, event: BrowserEvent) {
        let BrowserEvent::NavigationStarted { tab, url } = event;

        let policies = match self.store.list_policies() {
            Ok(policies) => policies,
            Err(e) => {
                warn!(error = %e, "Navigation check skipped, store unavailable");
                return;
            }
        };

        let now = warden_util::now();
        let Some(policy) = find_blocking_policy(&policies, &url, &now) else {
            return;
        };

        info!(tab = %tab, url = %url, policy_id = %policy.id, "Blocking navigation");

        let target = blocked_page_target(&url);
        if let Err(e) = self.table.redirect_navigation(tab, target).await {
            warn!(tab = %tab, error = %e, "Failed to redirect blocked navigation");
            return;
        }

        self.ipc
            .broadcast_event(Event::new(EventPayload::NavigationBlocked { url }));
    }

    async fn handle_ipc_message(&self, msg: ServerMessage) {
        match msg {
            ServerMessage::Request { client_id, request } => {
                {
                    let mut limiter = self.rate_limiter.lock().await;
                    if !limiter.check(&client_id) {
                        let response = Response::error(
                            request.request_id,
                            ErrorInfo::new(ErrorCode::RateLimited, "Too many requests"),
                        );
                        let _ = self.ipc.send_response(&client_id, response).await;
                        return;
                    }
                }

                let response = self
                    .handle_command(&client_id, request.request_id, request.command)
                    .await;

                let _ = self.ipc.send_response(&client_id, response).await;
            }

            ServerMessage::ClientConnected { client_id, info } => {
                debug!(client_id = %client_id, uid = ?info.uid, "Client registered");
            }

            ServerMessage::ClientDisconnected { client_id } => {
                debug!(client_id = %client_id, "Client disconnected");

                let mut limiter = self.rate_limiter.lock().await;
                limiter.remove_client(&client_id);
            }
        }
    }

    async fn handle_command(
        &self,
        client_id: &ClientId,
        request_id: u64,
        command: Command,
    ) -> Response {
        match command {
            Command::Authenticate { username, password } => {
                match self.store.authenticate(&username, &password) {
                    Ok(Some(user)) => Response::success(
                        request_id,
                        ResponsePayload::Authenticated { user_id: user.id },
                    ),
                    Ok(None) => Response::error(
                        request_id,
                        ErrorInfo::new(ErrorCode::AuthFailed, "Invalid username or password"),
                    ),
                    Err(e) => store_error(request_id, e),
                }
            }

            Command::ListPolicies => match self.store.list_policies() {
                Ok(policies) => Response::success(
                    request_id,
                    ResponsePayload::Policies(policies.iter().map(|p| p.to_view()).collect()),
                ),
                Err(e) => store_error(request_id, e),
            },

            Command::AddPolicy {
                pattern,
                start,
                end,
                days,
                owner,
            } => {
                let draft = PolicyDraft::new(pattern, start, end, days);
                let (pattern, window) = match validate_draft(&draft) {
                    Ok(validated) => validated,
                    Err(e) => return validation_error(request_id, e),
                };

                match self.store.create_policy(pattern, window, owner) {
                    Ok(record) => {
                        info!(policy_id = %record.id, pattern = %record.url_pattern, "Policy added");
                        self.broadcast_policies_changed();
                        Response::success(request_id, ResponsePayload::PolicyAdded(record.to_view()))
                    }
                    Err(e) => store_error(request_id, e),
                }
            }

            Command::UpdatePolicy {
                id,
                pattern,
                start,
                end,
                days,
            } => {
                let draft = PolicyDraft::new(pattern, start, end, days);
                let (pattern, window) = match validate_draft(&draft) {
                    Ok(validated) => validated,
                    Err(e) => return validation_error(request_id, e),
                };

                match self.store.update_policy(id, pattern, window) {
                    Ok(record) => {
                        info!(policy_id = %id, "Policy updated");
                        self.broadcast_policies_changed();
                        Response::success(
                            request_id,
                            ResponsePayload::PolicyUpdated(record.to_view()),
                        )
                    }
                    Err(StoreError::NotFound(_)) => Response::error(
                        request_id,
                        ErrorInfo::new(ErrorCode::PolicyNotFound, format!("policy {}", id)),
                    ),
                    Err(e) => store_error(request_id, e),
                }
            }

            Command::DeletePolicy { id } => match self.store.delete_policy(id) {
                Ok(removed) => {
                    if removed {
                        info!(policy_id = %id, "Policy deleted");
                        self.broadcast_policies_changed();
                    }
                    Response::success(request_id, ResponsePayload::PolicyDeleted { id })
                }
                Err(e) => store_error(request_id, e),
            },

            Command::ImportPolicies {
                patterns,
                start,
                end,
                days,
                owner,
            } => {
                let window = match validate_window(&start, &end, &days) {
                    Ok(window) => window,
                    Err(e) => return validation_error(request_id, e),
                };

                let patterns: Vec<String> = patterns
                    .iter()
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect();
                if patterns.is_empty() {
                    return Response::error(
                        request_id,
                        ErrorInfo::new(ErrorCode::ValidationError, "No URL patterns to import"),
                    );
                }

                match self.store.import_policies(patterns, window, owner) {
                    Ok(imported) => {
                        info!(count = imported.len(), "Policies imported");
                        self.broadcast_policies_changed();
                        Response::success(
                            request_id,
                            ResponsePayload::Imported {
                                count: imported.len(),
                            },
                        )
                    }
                    Err(e) => store_error(request_id, e),
                }
            }

            Command::RefreshRules => match self.scheduler.run_pass().await {
                Ok(active_rules) => {
                    self.ipc
                        .broadcast_event(Event::new(EventPayload::RulesRefreshed { active_rules }));
                    Response::success(request_id, ResponsePayload::RulesRefreshed { active_rules })
                }
                Err(e) => engine_error(request_id, e),
            },

            Command::GetState => match self.store.list_policies() {
                Ok(policies) => Response::success(
                    request_id,
                    ResponsePayload::State(ServiceStateSnapshot {
                        api_version: API_VERSION,
                        policy_count: policies.len(),
                        active_rules: self.sync.active_rule_count(),
                        last_pass_at: self.scheduler.last_pass_at(),
                    }),
                ),
                Err(e) => store_error(request_id, e),
            },

            Command::GetHealth => {
                let health = HealthStatus {
                    live: true,
                    ready: true,
                    store_ok: self.store.is_healthy(),
                    browser_ok: self.table.is_healthy(),
                };
                Response::success(request_id, ResponsePayload::Health(health))
            }

            Command::SubscribeEvents => Response::success(
                request_id,
                ResponsePayload::Subscribed {
                    client_id: client_id.clone(),
                },
            ),

            Command::UnsubscribeEvents => {
                Response::success(request_id, ResponsePayload::Unsubscribed)
            }

            Command::Ping => Response::success(request_id, ResponsePayload::Pong),
        }
    }

    fn broadcast_policies_changed(&self) {
        let policy_count = self
            .store
            .list_policies()
            .map(|p| p.len())
            .unwrap_or_default();
        self.ipc
            .broadcast_event(Event::new(EventPayload::PoliciesChanged { policy_count }));
    }
}

fn store_error(request_id: u64, e: StoreError) -> Response {
    warn!(error = %e, "Store operation failed");
    Response::error(
        request_id,
        ErrorInfo::new(ErrorCode::StoreError, e.to_string()),
    )
}

fn engine_error(request_id: u64, e: EngineError) -> Response {
    warn!(error = %e, "Rule refresh failed");
    let code = match e {
        EngineError::Store(_) => ErrorCode::StoreError,
        EngineError::Browser(_) => ErrorCode::BrowserError,
    };
    Response::error(request_id, ErrorInfo::new(code, e.to_string()))
}

fn validation_error(request_id: u64, e: ValidationError) -> Response {
    Response::error(
        request_id,
        ErrorInfo::new(ErrorCode::ValidationError, e.to_string()),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    // The browser owns stdout (native messaging); logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "wardend starting");

    let service = Service::new(&args).await?;
    service.run().await
}
