//! Integration tests for the hub over real WebSocket connections.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use kaboo_hub::{Hub, HubConfig, HubHandle, Inbox};
use kaboo_protocol::{GameId, JsonCodec, ServerEvent, UserId, UserSummary};
use kaboo_transport::{Connection, Transport, WebSocketTransport};
use tokio_tungstenite::tungstenite::Message;

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// A hub plus a listener; every accepted socket is registered as the next
/// user handed to [`Harness::connect`].
struct Harness {
    hub: HubHandle<JsonCodec>,
    inbox: Inbox,
    transport: WebSocketTransport,
}

impl Harness {
    async fn start(config: HubConfig) -> Self {
        let (hub, inbox) = Hub::spawn(config, JsonCodec);
        let transport = WebSocketTransport::bind("127.0.0.1:0").await.unwrap();
        Self {
            hub,
            inbox,
            transport,
        }
    }

    async fn connect(&mut self, user: &str) -> ClientWs {
        let addr = self.transport.local_addr().unwrap();
        let url = format!("ws://{addr}");
        let (client, conn) = tokio::join!(
            tokio_tungstenite::connect_async(url),
            self.transport.accept()
        );
        let (client, _) = client.unwrap();
        let conn = conn.unwrap();
        let id = conn.id();
        let (tx, rx) = conn.split();
        self.hub.register(UserId::new(user), id, tx, rx);
        wait_until_connected(&self.hub, user).await;
        client
    }
}

async fn wait_until_connected(hub: &HubHandle<JsonCodec>, user: &str) {
    for _ in 0..50 {
        if hub.is_connected(&UserId::new(user)).await.unwrap() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{user} never connected");
}

async fn wait_until_gone(hub: &HubHandle<JsonCodec>, user: &str) {
    for _ in 0..100 {
        if !hub.is_connected(&UserId::new(user)).await.unwrap() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{user} still connected");
}

/// Next data frame, skipping pings.
async fn next_data(client: &mut ClientWs) -> Option<Message> {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), client.next())
            .await
            .ok()??
            .ok()?;
        match msg {
            Message::Ping(_) | Message::Pong(_) => continue,
            other => return Some(other),
        }
    }
}

fn joined(game: &str, user: &str) -> ServerEvent {
    ServerEvent::UserJoinedGame {
        game_id: GameId::new(game),
        user: UserSummary {
            id: UserId::new(user),
            name: user.into(),
        },
    }
}

#[tokio::test]
async fn test_broadcast_reaches_every_listed_client() {
    let mut h = Harness::start(HubConfig::default()).await;
    let mut alice = h.connect("alice").await;
    let mut bob = h.connect("bob").await;

    h.hub
        .broadcast(&[UserId::new("alice"), UserId::new("bob")], &joined("g1", "bob"));

    for client in [&mut alice, &mut bob] {
        let msg = next_data(client).await.expect("event");
        assert!(msg.is_text());
        let event: ServerEvent = serde_json::from_slice(&msg.into_data()).unwrap();
        assert_eq!(event, joined("g1", "bob"));
    }
}

#[tokio::test]
async fn test_second_connection_replaces_and_closes_first() {
    let mut h = Harness::start(HubConfig::default()).await;
    let mut first = h.connect("alice").await;
    let mut second = h.connect("alice").await;

    let msg = next_data(&mut first).await;
    assert!(
        matches!(msg, None | Some(Message::Close(_))),
        "old connection should be closed, got {msg:?}"
    );

    h.hub.broadcast(&[UserId::new("alice")], &joined("g1", "alice"));
    assert!(next_data(&mut second).await.unwrap().is_text());
}

#[tokio::test]
async fn test_client_disconnect_unregisters_user() {
    let mut h = Harness::start(HubConfig::default()).await;
    let mut alice = h.connect("alice").await;

    alice.close(None).await.unwrap();

    wait_until_gone(&h.hub, "alice").await;
}

#[tokio::test]
async fn test_silent_client_is_dropped_after_pong_wait() {
    let config = HubConfig {
        pong_wait: Duration::from_millis(150),
        ping_period: Duration::from_millis(100),
        ..HubConfig::default()
    };
    let mut h = Harness::start(config).await;
    // Never polled, so tungstenite never answers the server's pings.
    let _alice = h.connect("alice").await;

    wait_until_gone(&h.hub, "alice").await;
}

#[tokio::test]
async fn test_responsive_client_survives_pings() {
    let config = HubConfig {
        pong_wait: Duration::from_millis(200),
        ping_period: Duration::from_millis(50),
        ..HubConfig::default()
    };
    let mut h = Harness::start(config).await;
    let mut alice = h.connect("alice").await;

    // Polling the stream makes tungstenite answer pings automatically.
    let poll = tokio::spawn(async move {
        let deadline = tokio::time::Instant::now() + Duration::from_millis(600);
        while let Ok(Some(_)) = tokio::time::timeout_at(deadline, alice.next()).await {}
        alice
    });
    let _alice = poll.await.unwrap();

    assert!(h.hub.is_connected(&UserId::new("alice")).await.unwrap());
}

#[tokio::test]
async fn test_oversized_inbound_frame_drops_connection() {
    let config = HubConfig {
        max_message_size: 16,
        ..HubConfig::default()
    };
    let mut h = Harness::start(config).await;
    let mut alice = h.connect("alice").await;

    alice
        .send(Message::Text("x".repeat(64).into()))
        .await
        .unwrap();

    wait_until_gone(&h.hub, "alice").await;
}

#[tokio::test]
async fn test_inbound_frame_is_delivered_to_inbox() {
    let mut h = Harness::start(HubConfig::default()).await;
    let mut alice = h.connect("alice").await;

    alice
        .send(Message::Text("hello\nworld\n".to_string().into()))
        .await
        .unwrap();

    let msg = tokio::time::timeout(Duration::from_secs(2), h.inbox.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(msg.user_id, UserId::new("alice"));
    assert_eq!(msg.data, b"hello world".to_vec());
}
