//! End-to-end chat sessions against a real parley server

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::net::TcpListener;

use parley_client::{CallbackObserver, ChatClient, ChatEvent, ConnectionState, ObserverRouting};
use parley_server::{bind_listener, run_tcp_accept_loop, ServerConfig, SharedState};
use parley_utils::{ConnectionErrorKind, ParleyError};

const WAIT: Duration = Duration::from_secs(5);

/// Start a server on an ephemeral port
async fn start_server() -> (SharedState, u16) {
    let listener = bind_listener("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let mut config = ServerConfig::default();
    config.server.info_text = "scenario server".into();
    let state = SharedState::new(config);
    tokio::spawn(run_tcp_accept_loop(listener, state.clone()));
    (state, port)
}

type Events = Arc<Mutex<Vec<ChatEvent>>>;

fn record(client: &ChatClient) -> Events {
    let events: Events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    client.add_observer(Arc::new(CallbackObserver::new(move |e| sink.lock().push(e))));
    events
}

async fn connect(port: u16, nick: &str) -> (ChatClient, Events) {
    connect_with(ChatClient::new(), port, nick).await
}

async fn connect_with(client: ChatClient, port: u16, nick: &str) -> (ChatClient, Events) {
    let events = record(&client);
    tokio::time::timeout(WAIT, client.connect("127.0.0.1", port, nick))
        .await
        .unwrap()
        .unwrap();
    (client, events)
}

/// Poll until an event matching `pred` was observed
async fn wait_for(events: &Events, pred: impl Fn(&ChatEvent) -> bool) {
    let start = tokio::time::Instant::now();
    while !events.lock().iter().any(&pred) {
        assert!(start.elapsed() < WAIT, "expected event never arrived: {:?}", events.lock());
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// ==================== Scenario Tests ====================

#[tokio::test]
async fn test_two_users_chat_in_channel() {
    let (server, port) = start_server().await;
    let (alice, alice_events) = connect(port, "alice").await;
    let (bob, _bob_events) = connect(port, "bob").await;

    let joined = alice.join_channel("#test").await.unwrap().await.unwrap();
    assert_eq!(joined.members, vec!["alice"]);
    bob.join_channel("#test").await.unwrap().await.unwrap();

    let names = alice.names_in_channel("#test").await.unwrap().await.unwrap();
    assert_eq!(names, vec!["alice", "bob"]);
    assert!(alice.target("#test").unwrap().has_member("bob"));

    bob.send_message("#test", "hello").await.unwrap().await.unwrap();

    wait_for(&alice_events, |e| {
        matches!(e, ChatEvent::Message(m)
            if m.sender() == "bob" && m.target() == "#test" && m.body() == "hello")
    })
    .await;
    assert_eq!(alice.messages("#test").len(), 1);

    server.shutdown();
}

#[tokio::test]
async fn test_direct_messages() {
    let (_server, port) = start_server().await;
    let (alice, alice_events) = connect(port, "alice").await;
    let (bob, _) = connect(port, "bob").await;

    bob.send_message("alice", "psst").await.unwrap().await.unwrap();

    wait_for(&alice_events, |e| matches!(e, ChatEvent::Message(m) if m.body() == "psst")).await;
    assert_eq!(alice.users(), vec!["bob"]);
    assert_eq!(alice.messages("bob")[0].sender(), "bob");

    // The sender keeps its own copy under the recipient
    assert_eq!(bob.messages("alice")[0].body(), "psst");
}

#[tokio::test]
async fn test_quit_reaches_channel_members() {
    let (_server, port) = start_server().await;
    let (alice, alice_events) = connect(port, "alice").await;
    let (bob, _) = connect(port, "bob").await;

    alice.join_channel("#a").await.unwrap().await.unwrap();
    bob.join_channel("#a").await.unwrap().await.unwrap();
    wait_for(&alice_events, |e| matches!(e, ChatEvent::Joined { nick, .. } if nick == "bob")).await;

    bob.disconnect().await.unwrap().await.unwrap();
    assert_eq!(bob.state(), ConnectionState::Disconnected);

    wait_for(&alice_events, |e| matches!(e, ChatEvent::Quit { nick } if nick == "bob")).await;
    assert_eq!(alice.target("#a").unwrap().members(), vec!["alice"]);

    let names = alice.names_in_channel("#a").await.unwrap().await.unwrap();
    assert_eq!(names, vec!["alice"]);
}

#[tokio::test]
async fn test_emptied_channel_disappears() {
    let (_server, port) = start_server().await;
    let (alice, _) = connect(port, "alice").await;

    alice.join_channel("#x").await.unwrap().await.unwrap();
    let channels = alice.offered_channels().await.unwrap().await.unwrap();
    assert_eq!(channels, vec!["#x"]);

    alice.part_channel("#x").await.unwrap().await.unwrap();
    assert!(alice.joined_channels().is_empty());

    let channels = alice.offered_channels().await.unwrap().await.unwrap();
    assert!(channels.is_empty());
}

#[tokio::test]
async fn test_server_queries() {
    let (_server, port) = start_server().await;
    let (alice, _) = connect(port, "alice").await;

    assert_eq!(alice.info().await.unwrap().await.unwrap(), "scenario server");
    assert_eq!(alice.ping("tok").await.unwrap().await.unwrap(), "tok");

    let server_time = alice.server_time().await.unwrap().await.unwrap();
    let drift = chrono::Local::now().naive_local() - server_time;
    assert!(drift.num_seconds().abs() < 60);
}

#[tokio::test]
async fn test_concurrent_requests_of_one_kind() {
    let (_server, port) = start_server().await;
    let (alice, _) = connect(port, "alice").await;
    let (bob, _) = connect(port, "bob").await;
    bob.join_channel("#b").await.unwrap().await.unwrap();

    // Both joins are on the wire before either reply is read
    let join_a = alice.join_channel("#a").await.unwrap();
    let join_b = alice.join_channel("#b").await.unwrap();
    let (a, b) = tokio::join!(join_a, join_b);
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.name, "#a");
    assert_eq!(a.members, vec!["alice"]);
    assert_eq!(b.name, "#b");
    assert_eq!(b.members, vec!["alice", "bob"]);

    let names_b = alice.names_in_channel("#b").await.unwrap();
    let names_a = alice.names_in_channel("#a").await.unwrap();
    let (names_b, names_a) = tokio::join!(names_b, names_a);
    assert_eq!(names_a.unwrap(), vec!["alice"]);
    assert_eq!(names_b.unwrap(), vec!["alice", "bob"]);
}

#[tokio::test]
async fn test_self_events_routed_when_enabled() {
    let (server, port) = start_server().await;
    let client = ChatClient::with_routing(ObserverRouting { self_events: true });
    let (carol, events) = connect_with(client, port, "carol").await;

    carol.join_channel("#c").await.unwrap().await.unwrap();
    carol.part_channel("#c").await.unwrap().await.unwrap();
    server.shutdown();

    wait_for(&events, |e| matches!(e, ChatEvent::Quit { nick } if nick == "carol")).await;
    let events = events.lock();
    assert!(events.contains(&ChatEvent::Joined {
        nick: "carol".into(),
        channel: "#c".into()
    }));
    assert!(events.contains(&ChatEvent::Parted {
        nick: "carol".into(),
        channel: "#c".into()
    }));
}

// ==================== Error Tests ====================

#[tokio::test]
async fn test_duplicate_nick_fails_connect() {
    let (_server, port) = start_server().await;
    let (_alice, _) = connect(port, "alice").await;

    let second = ChatClient::new();
    let err = tokio::time::timeout(WAIT, second.connect("127.0.0.1", port, "alice"))
        .await
        .unwrap()
        .unwrap_err();

    assert!(matches!(err, ParleyError::Server(ref text) if text == "Nick already taken"));
    assert_eq!(second.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_part_unknown_channel_fails_request() {
    let (_server, port) = start_server().await;
    let (alice, alice_events) = connect(port, "alice").await;

    let err = alice.part_channel("#nowhere").await.unwrap().await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Server responded with error message: No channel exists with that name"
    );
    assert!(!alice_events
        .lock()
        .iter()
        .any(|e| matches!(e, ChatEvent::ServerError(_))));
}

#[tokio::test]
async fn test_failed_part_after_direct_message() {
    let (_server, port) = start_server().await;
    let (alice, alice_events) = connect(port, "alice").await;
    let (_bob, _) = connect(port, "bob").await;

    alice.send_message("bob", "hello").await.unwrap().await.unwrap();
    let part = alice.part_channel("#nope").await.unwrap();
    let err = tokio::time::timeout(WAIT, part).await.unwrap().unwrap_err();

    assert!(matches!(err, ParleyError::Server(ref text) if text == "No channel exists with that name"));
    assert!(!alice_events
        .lock()
        .iter()
        .any(|e| matches!(e, ChatEvent::ServerError(_))));
}

#[tokio::test]
async fn test_connection_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let client = ChatClient::new();
    let events = record(&client);
    let err = tokio::time::timeout(WAIT, client.connect("127.0.0.1", port, "alice"))
        .await
        .unwrap()
        .unwrap_err();

    assert_eq!(err.connection_kind_of(), Some(ConnectionErrorKind::Refused));
    assert!(events.lock().iter().any(|e| matches!(e,
        ChatEvent::ConnectionError(text) if text == ConnectionErrorKind::Refused.message())));
    assert!(matches!(client.info().await, Err(ParleyError::NotConnected)));
}

#[tokio::test]
async fn test_server_shutdown_ends_session() {
    let (server, port) = start_server().await;
    let (alice, alice_events) = connect(port, "alice").await;
    let pending = alice.info().await.unwrap();
    // The reply may or may not beat the shutdown; either way nothing hangs
    server.shutdown();

    let _ = tokio::time::timeout(WAIT, pending).await.unwrap();

    let start = tokio::time::Instant::now();
    while alice.state() != ConnectionState::Disconnected {
        assert!(start.elapsed() < WAIT, "session never ended");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(matches!(alice.info().await, Err(ParleyError::NotConnected)));
    wait_for(&alice_events, |e| matches!(e, ChatEvent::ConnectionError(_))).await;
}
