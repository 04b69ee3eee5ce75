//! Integration tests for wardend
//!
//! These exercise the full pipeline — store, compiler, synchronizer,
//! scheduler, navigation fallback — over the mock rule table, plus an IPC
//! round trip over a real Unix socket.

use chrono::{DateTime, Local, TimeZone};
use std::sync::Arc;
use std::time::Duration;
use warden_api::{Command, Event, EventPayload, Response, ResponsePayload, ResponseResult};
use warden_browser_api::{MockRuleTable, RuleTable, TabId};
use warden_core::{blocked_page_target, compile, find_blocking_policy, RuleSynchronizer, Scheduler};
use warden_ipc::{IpcClient, IpcServer, ServerMessage};
use warden_store::{SqliteStore, Store, DEFAULT_ADMIN_PASSWORD, DEFAULT_ADMIN_USER};
use warden_util::{parse_day_tokens, BlockWindow, UserId, WallClock};

fn all_day_window() -> BlockWindow {
    BlockWindow::new(
        parse_day_tokens("Su,Mo,Tu,We,Th,Fr,Sa").unwrap(),
        WallClock::new(0, 0).unwrap(),
        WallClock::new(23, 59).unwrap(),
    )
}

fn nine_to_five_weekdays() -> BlockWindow {
    BlockWindow::new(
        parse_day_tokens("Mo,Tu,We,Th,Fr").unwrap(),
        WallClock::new(9, 0).unwrap(),
        WallClock::new(17, 0).unwrap(),
    )
}

// 2026-03-04 is a Wednesday, 2026-03-07 a Saturday
fn wednesday_afternoon() -> DateTime<Local> {
    Local.with_ymd_and_hms(2026, 3, 4, 14, 30, 0).unwrap()
}

fn saturday_afternoon() -> DateTime<Local> {
    Local.with_ymd_and_hms(2026, 3, 7, 14, 30, 0).unwrap()
}

fn engine() -> (Arc<SqliteStore>, Arc<MockRuleTable>, Arc<Scheduler>) {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let table = Arc::new(MockRuleTable::new());
    let sync = Arc::new(RuleSynchronizer::new(table.clone()));
    let scheduler = Arc::new(Scheduler::new(
        store.clone(),
        sync,
        Duration::from_secs(3600),
    ));
    (store, table, scheduler)
}

#[tokio::test]
async fn pass_installs_rules_for_active_policies() {
    let (store, table, scheduler) = engine();
    let owner = UserId::new(1);

    store
        .create_policy("facebook.com/*".into(), all_day_window(), owner)
        .unwrap();
    store
        .create_policy("example.com".into(), all_day_window(), owner)
        .unwrap();

    let count = scheduler.run_pass().await.unwrap();
    assert_eq!(count, 3);

    let filters: Vec<String> = table
        .installed_rules()
        .iter()
        .map(|r| r.condition.url_filter.clone())
        .collect();
    assert_eq!(
        filters,
        vec![
            "*://facebook.com/*",
            "*://*.facebook.com/*",
            "*://*example.com*",
        ]
    );
}

#[tokio::test]
async fn crud_lifecycle_flows_through_to_the_rule_table() {
    let (store, table, scheduler) = engine();
    let owner = UserId::new(1);

    let record = store
        .create_policy("reddit.com".into(), all_day_window(), owner)
        .unwrap();
    scheduler.run_pass().await.unwrap();
    assert_eq!(table.installed_rules().len(), 1);

    // Update to a wildcard: next pass yields two rules
    store
        .update_policy(record.id, "reddit.com*".into(), all_day_window())
        .unwrap();
    scheduler.run_pass().await.unwrap();
    assert_eq!(table.installed_rules().len(), 2);

    // Delete: next pass drops everything derived from the record
    store.delete_policy(record.id).unwrap();
    scheduler.run_pass().await.unwrap();
    assert!(table.installed_rules().is_empty());
}

#[tokio::test]
async fn imported_policies_compile_like_authored_ones() {
    let (store, table, scheduler) = engine();

    store
        .import_policies(
            vec!["a.com".into(), "b.com*".into()],
            all_day_window(),
            UserId::new(1),
        )
        .unwrap();

    let count = scheduler.run_pass().await.unwrap();
    assert_eq!(count, 3);
    assert_eq!(table.installed_rules().len(), 3);
}

#[test]
fn schedule_example_active_on_wednesday_afternoon() {
    let store = SqliteStore::in_memory().unwrap();
    store
        .create_policy(
            "facebook.com/*".into(),
            nine_to_five_weekdays(),
            UserId::new(1),
        )
        .unwrap();

    let policies = store.list_policies().unwrap();

    // Wednesday 14:30: matched and compiled to the two-rule pair
    let now = wednesday_afternoon();
    assert!(find_blocking_policy(&policies, "https://facebook.com/feed", &now).is_some());

    let rules = compile(&policies, &now);
    assert_eq!(rules.len(), 2);
    assert_eq!(rules[0].condition.url_filter, "*://facebook.com/*");
    assert_eq!(rules[1].condition.url_filter, "*://*.facebook.com/*");
}

#[test]
fn schedule_example_dormant_on_saturday() {
    let store = SqliteStore::in_memory().unwrap();
    store
        .create_policy(
            "facebook.com/*".into(),
            nine_to_five_weekdays(),
            UserId::new(1),
        )
        .unwrap();

    let policies = store.list_policies().unwrap();
    let now = saturday_afternoon();

    assert!(find_blocking_policy(&policies, "https://facebook.com/feed", &now).is_none());
    assert!(compile(&policies, &now).is_empty());
}

#[tokio::test]
async fn navigation_fallback_redirects_to_interstitial() {
    let (store, table, _scheduler) = engine();
    store
        .create_policy("facebook.com".into(), all_day_window(), UserId::new(1))
        .unwrap();

    let policies = store.list_policies().unwrap();
    let now = warden_util::now();

    // What the service does on a navigation-started event
    let url = "https://facebook.com/feed";
    let policy = find_blocking_policy(&policies, url, &now);
    assert!(policy.is_some());

    table
        .redirect_navigation(TabId(3), blocked_page_target(url))
        .await
        .unwrap();

    let redirects = table.recorded_redirects();
    assert_eq!(redirects.len(), 1);
    assert_eq!(redirects[0].0, TabId(3));
    assert!(redirects[0].1.starts_with("/blocked.html?url="));

    // An unrelated URL passes through
    assert!(find_blocking_policy(&policies, "https://docs.rs/", &now).is_none());
}

#[test]
fn default_admin_can_authenticate() {
    let store = SqliteStore::in_memory().unwrap();

    let user = store
        .authenticate(DEFAULT_ADMIN_USER, DEFAULT_ADMIN_PASSWORD)
        .unwrap();
    assert!(user.is_some());

    let rejected = store.authenticate(DEFAULT_ADMIN_USER, "nope").unwrap();
    assert!(rejected.is_none());
}

/// Minimal service loop for IPC tests: answers Ping, echoes everything else
/// as an internal error.
async fn run_ping_responder(server: Arc<IpcServer>) {
    let mut messages = server.take_message_receiver().await.unwrap();

    while let Some(msg) = messages.recv().await {
        if let ServerMessage::Request { client_id, request } = msg {
            let response = match request.command {
                Command::Ping => Response::success(request.request_id, ResponsePayload::Pong),
                Command::SubscribeEvents => Response::success(
                    request.request_id,
                    ResponsePayload::Subscribed {
                        client_id: client_id.clone(),
                    },
                ),
                _ => Response::success(request.request_id, ResponsePayload::Unsubscribed),
            };
            let _ = server.send_response(&client_id, response).await;
        }
    }
}

#[tokio::test]
async fn ipc_ping_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("wardend.sock");

    let mut server = IpcServer::new(&socket_path);
    server.start().await.unwrap();
    let server = Arc::new(server);

    let accept = server.clone();
    tokio::spawn(async move {
        let _ = accept.run().await;
    });
    tokio::spawn(run_ping_responder(server.clone()));

    let mut client = IpcClient::connect(&socket_path).await.unwrap();
    let response = client.send(Command::Ping).await.unwrap();

    assert!(matches!(
        response.result,
        ResponseResult::Ok(ResponsePayload::Pong)
    ));
}

#[tokio::test]
async fn ipc_subscribed_client_receives_events() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("wardend.sock");

    let mut server = IpcServer::new(&socket_path);
    server.start().await.unwrap();
    let server = Arc::new(server);

    let accept = server.clone();
    tokio::spawn(async move {
        let _ = accept.run().await;
    });
    tokio::spawn(run_ping_responder(server.clone()));

    let client = IpcClient::connect(&socket_path).await.unwrap();
    let mut events = client.subscribe().await.unwrap();

    // Give the writer task a beat to observe the subscription
    tokio::time::sleep(Duration::from_millis(100)).await;
    server.broadcast_event(Event::new(EventPayload::RulesRefreshed { active_rules: 5 }));

    let event = events.next().await.unwrap();
    assert!(matches!(
        event.payload,
        EventPayload::RulesRefreshed { active_rules: 5 }
    ));
}
