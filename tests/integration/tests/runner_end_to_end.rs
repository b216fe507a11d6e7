use std::sync::Arc;
use std::time::Duration;

use funpay_parser::HtmlRecordParser;
use funpay_runner::{AccountContext, RunnerConfig, UpdateRunner};
use funpay_session::{FunPaySessionClient, FunPaySessionConfig, SessionClient};
use funpay_types::{OrderStatus, RunnerEvent, RunnerEventKind};
use httpmock::prelude::*;
use serde_json::json;

const ACCOUNT_ID: i64 = 12;
const BUYER_ID: i64 = 77;
const HOME_PAGE: &str = r#"<html><body data-app-data='{"userId":12,"csrf-token":"csrf-1","locale":"en"}'>
    <div class="user-link-name">seller</div>
</body></html>"#;

fn contact_html(id: i64, node: i64, preview: &str) -> String {
    format!(
        r#"<a class="contact-item" data-id="{id}" data-node-msg="{node}" data-user-msg="{node}">
            <div class="media-user-name">buyer</div>
            <div class="contact-item-message">{preview}</div>
        </a>"#
    )
}

fn message_html(text: &str) -> String {
    format!(
        r#"<div class="chat-msg-item">
            <div class="media-user-name"><a href="https://funpay.com/users/{BUYER_ID}/">buyer</a></div>
            <div class="chat-msg-text">{text}</div>
        </div>"#
    )
}

fn order_html(class: &str, id: &str) -> String {
    format!(
        r#"<html><body><div class="tc">
        <a href="https://funpay.com/orders/{id}/" class="tc-item {class}">
            <div class="tc-date"><div class="tc-date-time">2 мая 2023, 08:30</div></div>
            <div class="tc-order">#{id}</div>
            <div class="order-desc"><div>Gold, 100k</div><div class="text-muted">WoW, Gold</div></div>
            <div class="tc-user"><div class="media-user-name"><span class="pseudo-a" data-href="https://funpay.com/users/{BUYER_ID}/">buyer</span></div></div>
            <div class="tc-price">150 ₽</div>
        </a></div></body></html>"#
    )
}

fn test_config() -> RunnerConfig {
    RunnerConfig {
        poll_interval: Duration::from_secs(6),
        detail_retry_delay: Duration::ZERO,
        failure_backoff: Duration::from_secs(5),
        ..RunnerConfig::default()
    }
}

async fn connect(server: &MockServer, config: RunnerConfig) -> (Arc<FunPaySessionClient>, UpdateRunner) {
    connect_with_timeout(server, config, 2_000).await
}

async fn connect_with_timeout(
    server: &MockServer,
    config: RunnerConfig,
    request_timeout_ms: u64,
) -> (Arc<FunPaySessionClient>, UpdateRunner) {
    let session = Arc::new(
        FunPaySessionClient::new(FunPaySessionConfig {
            base_url: server.base_url(),
            golden_key: "golden".to_string(),
            user_agent: "funpay-integration-tests".to_string(),
            request_timeout_ms,
        })
        .expect("session client"),
    );
    let parser = Arc::new(HtmlRecordParser::new().expect("record parser"));
    let home = session.fetch_home_page().await.expect("home page");
    let profile = parser.parse_account_profile(&home).expect("account profile");
    assert_eq!(profile.id, ACCOUNT_ID);
    session.apply_profile(&profile);
    let runner = UpdateRunner::new(
        config,
        session.clone(),
        parser,
        AccountContext::from(&profile),
    )
    .expect("runner");
    (session, runner)
}

fn mock_home(server: &MockServer) {
    server.mock(|when, then| {
        when.method(GET).path("/");
        then.status(200)
            .header("set-cookie", "PHPSESSID=sess1; path=/")
            .body(HOME_PAGE);
    });
}

fn kinds(events: &[RunnerEvent]) -> Vec<RunnerEventKind> {
    events.iter().map(RunnerEvent::kind).collect()
}

#[tokio::test]
async fn integration_new_chat_message_flows_through_session_parser_and_runner() {
    let server = MockServer::start();
    mock_home(&server);
    let initial = server.mock(|when, then| {
        when.method(POST)
            .path("/runner/")
            .body_includes("chat_bookmarks")
            .body_excludes("bkmtag0001");
        then.status(200).json_body(json!({
            "objects": [{
                "type": "chat_bookmarks",
                "id": ACCOUNT_ID,
                "tag": "bkmtag0001",
                "data": {"html": contact_html(5, 40, "hello")}
            }],
            "response": false
        }));
    });
    let changed = server.mock(|when, then| {
        when.method(POST)
            .path("/runner/")
            .body_includes("bkmtag0001");
        then.status(200).json_body(json!({
            "objects": [{
                "type": "chat_bookmarks",
                "id": ACCOUNT_ID,
                "tag": "bkmtag0002",
                "data": {"html": contact_html(5, 41, "is it still available?")}
            }],
            "response": false
        }));
    });
    let history = server.mock(|when, then| {
        when.method(POST)
            .path("/runner/")
            .body_includes("chat_node")
            .body_includes("csrf_token=csrf-1");
        then.status(200).json_body(json!({
            "objects": [{
                "type": "chat_node",
                "id": 5,
                "tag": "00000000",
                "data": {
                    "node": {"id": 5, "name": format!("users-{ACCOUNT_ID}-{BUYER_ID}")},
                    "messages": [
                        {"id": 40, "author": BUYER_ID, "html": message_html("hello")},
                        {"id": 41, "author": BUYER_ID, "html": message_html("is it still available?")}
                    ]
                }
            }],
            "response": false
        }));
    });

    let (_session, mut runner) = connect(&server, test_config()).await;
    let first = runner.poll_once().await;
    assert_eq!(kinds(&first.events), vec![RunnerEventKind::InitialChat]);
    assert_eq!(runner.chat_tag(), "bkmtag0001");

    let second = runner.poll_once().await;
    assert!(!second.report.failed(), "{:?}", second.report.failure);
    assert_eq!(
        kinds(&second.events),
        vec![
            RunnerEventKind::ChatsListChanged,
            RunnerEventKind::LastChatMessageChanged,
            RunnerEventKind::NewMessage,
        ]
    );
    let RunnerEvent::NewMessage { message, stack, .. } = &second.events[2] else {
        panic!("expected a new message, got {:?}", second.events[2]);
    };
    assert_eq!(message.id, 41);
    assert_eq!(message.text.as_deref(), Some("is it still available?"));
    assert_eq!(message.author.as_deref(), Some("buyer"));
    assert_eq!(message.counterpart_id, Some(BUYER_ID));
    assert!(!message.by_bot);
    assert_eq!(stack.message_ids, vec![41]);
    assert_eq!(runner.chat_tag(), "bkmtag0002");
    assert_eq!(runner.last_delivered_message_id(5), Some(41));

    initial.assert_calls(1);
    changed.assert_calls(1);
    history.assert_calls(1);
}

#[tokio::test]
async fn integration_order_status_change_is_detected_from_the_sales_page() {
    let server = MockServer::start();
    mock_home(&server);
    server.mock(|when, then| {
        when.method(POST)
            .path("/runner/")
            .body_excludes("ordtag0001");
        then.status(200).json_body(json!({
            "objects": [{"type": "orders_counters", "id": ACCOUNT_ID, "tag": "ordtag0001", "data": {"buyer": 0, "seller": 1}}],
            "response": false
        }));
    });
    server.mock(|when, then| {
        when.method(POST)
            .path("/runner/")
            .body_includes("ordtag0001");
        then.status(200).json_body(json!({
            "objects": [{"type": "orders_counters", "id": ACCOUNT_ID, "tag": "ordtag0002", "data": {"buyer": 0, "seller": 0}}],
            "response": false
        }));
    });
    let mut paid_page = server.mock(|when, then| {
        when.method(GET).path("/orders/trade");
        then.status(200).body(order_html("info", "A1B2C3D4"));
    });

    let (_session, mut runner) = connect(
        &server,
        RunnerConfig {
            resolve_chat_histories: false,
            ..test_config()
        },
    )
    .await;
    let first = runner.poll_once().await;
    assert_eq!(kinds(&first.events), vec![RunnerEventKind::InitialOrder]);
    paid_page.assert_calls(1);
    paid_page.delete();

    let closed_page = server.mock(|when, then| {
        when.method(GET).path("/orders/trade");
        then.status(200).body(order_html("", "A1B2C3D4"));
    });
    let second = runner.poll_once().await;
    assert_eq!(
        second.events[0],
        RunnerEvent::OrdersListChanged {
            buyer: 0,
            seller: 0
        }
    );
    let RunnerEvent::OrderStatusChanged { order } = &second.events[1] else {
        panic!("expected a status change, got {:?}", second.events);
    };
    assert_eq!(order.id, "A1B2C3D4");
    assert_eq!(order.status, OrderStatus::Closed);
    assert_eq!(order.buyer_id, BUYER_ID);
    assert_eq!(order.chat_id, format!("users-{ACCOUNT_ID}-{BUYER_ID}"));
    assert_eq!(runner.order_tag(), "ordtag0002");
    closed_page.assert_calls(1);
}

#[tokio::test]
async fn regression_rate_limited_poll_keeps_state_and_paces_a_full_interval() {
    let server = MockServer::start();
    mock_home(&server);
    let limited = server.mock(|when, then| {
        when.method(POST).path("/runner/");
        then.status(429);
    });

    let (session, mut runner) = connect(&server, test_config()).await;
    let tag_before = runner.chat_tag().to_string();
    let outcome = runner.poll_once().await;
    assert!(outcome.events.is_empty());
    assert!(outcome.report.failed());
    assert_eq!(runner.chat_tag(), tag_before);
    assert!(session.last_rate_limited_at().is_some());
    assert_eq!(
        runner.next_delay(Duration::from_millis(50), false),
        Duration::from_secs(6)
    );
    limited.assert_calls(1);
}

#[tokio::test]
async fn regression_forbidden_history_fetch_leaves_chat_unresolved() {
    let server = MockServer::start();
    mock_home(&server);
    server.mock(|when, then| {
        when.method(POST)
            .path("/runner/")
            .body_includes("chat_bookmarks")
            .body_excludes("bkmtag0001");
        then.status(200).json_body(json!({
            "objects": [{"type": "chat_bookmarks", "id": ACCOUNT_ID, "tag": "bkmtag0001", "data": {"html": contact_html(5, 40, "hello")}}]
        }));
    });
    server.mock(|when, then| {
        when.method(POST)
            .path("/runner/")
            .body_includes("bkmtag0001");
        then.status(200).json_body(json!({
            "objects": [{"type": "chat_bookmarks", "id": ACCOUNT_ID, "tag": "bkmtag0002", "data": {"html": contact_html(5, 41, "ping")}}]
        }));
    });
    let history = server.mock(|when, then| {
        when.method(POST)
            .path("/runner/")
            .body_includes("chat_node")
            .body_excludes("chat_bookmarks");
        then.status(403);
    });

    let (_session, mut runner) = connect(&server, test_config()).await;
    runner.poll_once().await;
    let outcome = runner.poll_once().await;
    assert_eq!(
        kinds(&outcome.events),
        vec![
            RunnerEventKind::ChatsListChanged,
            RunnerEventKind::LastChatMessageChanged
        ]
    );
    assert_eq!(outcome.report.exhausted_fetches, 1);
    assert!(runner.unresolved_chats().contains(&5));
    history.assert_calls(3);
}

#[tokio::test]
async fn regression_timed_out_poll_keeps_state_and_recovers_once() {
    let server = MockServer::start();
    mock_home(&server);
    server.mock(|when, then| {
        when.method(POST)
            .path("/runner/")
            .body_includes("chat_bookmarks")
            .body_excludes("bkmtag0001");
        then.status(200).json_body(json!({
            "objects": [
                {"type": "orders_counters", "id": ACCOUNT_ID, "tag": "ordtag0001", "data": {"buyer": 0, "seller": 1}},
                {"type": "chat_bookmarks", "id": ACCOUNT_ID, "tag": "bkmtag0001", "data": {"html": contact_html(5, 40, "hello")}}
            ],
            "response": false
        }));
    });
    let orders = server.mock(|when, then| {
        when.method(GET).path("/orders/trade");
        then.status(200).body(order_html("info", "A1B2C3D4"));
    });
    let mut slow = server.mock(|when, then| {
        when.method(POST)
            .path("/runner/")
            .body_includes("bkmtag0001");
        then.status(200)
            .delay(Duration::from_millis(1_500))
            .json_body(json!({"objects": [], "response": false}));
    });

    let (_session, mut runner) = connect_with_timeout(&server, test_config(), 300).await;
    let first = runner.poll_once().await;
    assert_eq!(
        kinds(&first.events),
        vec![RunnerEventKind::InitialOrder, RunnerEventKind::InitialChat]
    );
    let snapshot_before = runner.order_snapshot().cloned();
    assert!(snapshot_before.is_some());

    let timed_out = runner.poll_once().await;
    assert!(timed_out.events.is_empty());
    assert!(timed_out.report.failed());
    assert!(timed_out.report.timed_out, "{:?}", timed_out.report.failure);
    assert_eq!(runner.chat_tag(), "bkmtag0001");
    assert_eq!(runner.order_tag(), "ordtag0001");
    assert_eq!(runner.order_snapshot().cloned(), snapshot_before);
    assert_eq!(runner.chat_state(5).map(|state| state.last_node_msg_id), Some(40));
    assert_eq!(runner.last_delivered_message_id(5), Some(40));
    slow.assert_calls(1);
    slow.delete();

    let changed = server.mock(|when, then| {
        when.method(POST)
            .path("/runner/")
            .body_includes("bkmtag0001");
        then.status(200).json_body(json!({
            "objects": [{"type": "chat_bookmarks", "id": ACCOUNT_ID, "tag": "bkmtag0002", "data": {"html": contact_html(5, 41, "still there?")}}],
            "response": false
        }));
    });
    let history = server.mock(|when, then| {
        when.method(POST)
            .path("/runner/")
            .body_includes("chat_node")
            .body_excludes("chat_bookmarks");
        then.status(200).json_body(json!({
            "objects": [{
                "type": "chat_node",
                "id": 5,
                "tag": "00000000",
                "data": {
                    "node": {"id": 5, "name": format!("users-{ACCOUNT_ID}-{BUYER_ID}")},
                    "messages": [
                        {"id": 40, "author": BUYER_ID, "html": message_html("hello")},
                        {"id": 41, "author": BUYER_ID, "html": message_html("still there?")}
                    ]
                }
            }],
            "response": false
        }));
    });

    let recovered = runner.poll_once().await;
    assert!(!recovered.report.failed(), "{:?}", recovered.report.failure);
    assert!(!recovered.report.timed_out);
    assert_eq!(
        kinds(&recovered.events),
        vec![
            RunnerEventKind::ChatsListChanged,
            RunnerEventKind::LastChatMessageChanged,
            RunnerEventKind::NewMessage,
        ]
    );
    let RunnerEvent::NewMessage { message, .. } = &recovered.events[2] else {
        panic!("expected a new message, got {:?}", recovered.events);
    };
    assert_eq!(message.id, 41);
    assert_eq!(runner.chat_tag(), "bkmtag0002");
    assert_eq!(runner.order_tag(), "ordtag0001");
    assert_eq!(runner.last_delivered_message_id(5), Some(41));
    orders.assert_calls(1);
    changed.assert_calls(1);
    history.assert_calls(1);
}
