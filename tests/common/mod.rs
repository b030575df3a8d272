//! Shared harness: boots the gateway on an ephemeral port.

#![allow(dead_code, clippy::panic)]

use std::net::SocketAddr;
use std::time::Duration;

use jsonwebtoken::{EncodingKey, Header, encode};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use futures_util::StreamExt;
use product_feed_gateway::app_state::AppState;
use product_feed_gateway::auth::{AccessClaims, UserIdClaim};
use product_feed_gateway::config::{AuthPolicy, GatewayConfig};
use product_feed_gateway::server;

pub const SECRET: &str = "integration-test-secret";
pub const GROUP: &str = "products";
pub const WAIT: Duration = Duration::from_secs(5);

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestGateway {
    pub addr: SocketAddr,
    pub state: AppState,
    pub ws_path: String,
}

impl TestGateway {
    pub fn ws_url(&self, token: Option<&str>) -> String {
        match token {
            Some(token) => format!("ws://{}{}?token={token}", self.addr, self.ws_path),
            None => format!("ws://{}{}", self.addr, self.ws_path),
        }
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub async fn members(&self) -> usize {
        self.state.registry.member_count(GROUP).await
    }

    /// Polls until the product group has exactly `expected` members.
    pub async fn wait_for_members(&self, expected: usize) {
        let polled = tokio::time::timeout(WAIT, async {
            while self.members().await != expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        if polled.is_err() {
            panic!(
                "expected {expected} members, found {}",
                self.members().await
            );
        }
    }
}

pub fn config(policy: AuthPolicy) -> GatewayConfig {
    let mut config = GatewayConfig::with_secret(SECRET);
    config.auth_policy = policy;
    config.ping_interval = None;
    config
}

pub async fn spawn_gateway(config: GatewayConfig) -> TestGateway {
    let (state, dispatcher) = AppState::from_config(&config);
    let _dispatcher = dispatcher.spawn();
    let app = server::build_app(state.clone(), &config.ws_path);

    let Ok(listener) = TcpListener::bind("127.0.0.1:0").await else {
        panic!("failed to bind test listener");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("listener has no address");
    };
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    TestGateway {
        addr,
        state,
        ws_path: config.ws_path,
    }
}

/// Signs an access token for `user_id` expiring `exp_offset` seconds from now.
pub fn token(user_id: u64, exp_offset: i64) -> String {
    let exp = chrono::Utc::now().timestamp() + exp_offset;
    let claims = AccessClaims {
        user_id: UserIdClaim::Number(user_id),
        exp: u64::try_from(exp).unwrap_or_default(),
        token_type: Some("access".to_string()),
        jti: None,
    };
    let Ok(token) = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    ) else {
        panic!("token encoding failed");
    };
    token
}

pub async fn connect(gateway: &TestGateway, token: Option<&str>) -> Client {
    match connect_async(gateway.ws_url(token)).await {
        Ok((client, _response)) => client,
        Err(err) => panic!("handshake failed: {err}"),
    }
}

/// Reads the next text frame as JSON, skipping control frames.
pub async fn next_json(client: &mut Client) -> serde_json::Value {
    let read = tokio::time::timeout(WAIT, async {
        loop {
            match client.next().await {
                Some(Ok(Message::Text(text))) => return serde_json::from_str(text.as_str()).ok(),
                Some(Ok(_)) => continue,
                _ => return None,
            }
        }
    })
    .await;
    match read {
        Ok(Some(value)) => value,
        Ok(None) => panic!("stream ended or frame was not JSON"),
        Err(_) => panic!("timed out waiting for a frame"),
    }
}

/// Connects and consumes the join confirmation, so membership is settled.
pub async fn connect_joined(gateway: &TestGateway, token: Option<&str>) -> Client {
    let mut client = connect(gateway, token).await;
    let hello = next_json(&mut client).await;
    assert_eq!(
        hello.get("type").and_then(serde_json::Value::as_str),
        Some("connection_established")
    );
    client
}
