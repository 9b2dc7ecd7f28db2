mod common;

use axum::{
    Router,
    body::{Body, to_bytes},
    extract::ConnectInfo,
    http::{Request, StatusCode, header},
};
use common::{MockGitHub, event, memory_storage, seed_user};
use devsync::config::Config;
use devsync::db::{DevsyncStorage, UserId};
use devsync::middleware::SessionTokenResolver;
use devsync::router::{DevsyncState, devsync_router};
use devsync::service::hub::{self, Connection};
use devsync::{HubHandle, SyncService};
use futures::StreamExt;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc::error::TryRecvError;
use tokio_tungstenite::tungstenite::{self, Message};
use tower::ServiceExt;

const SESSION: &str = "session-abc";

struct TestApp {
    app: Router,
    storage: DevsyncStorage,
    hub: HubHandle,
    user: UserId,
}

async fn test_app(rate_limit_per_minute: u32) -> TestApp {
    let github = Arc::new(MockGitHub::with_repos(3));
    *github.events.lock().unwrap() = vec![event("PushEvent", Some(2), "2024-06-01T08:00:00Z")];
    let cfg = Config {
        rate_limit_per_minute,
        ..Config::default()
    };
    test_app_with(github, &cfg, cfg.interactive_sync_timeout()).await
}

async fn test_app_with(github: Arc<MockGitHub>, cfg: &Config, sync_timeout: Duration) -> TestApp {
    let storage = memory_storage().await;
    let user = seed_user(&storage, 42, "gho_token").await;
    storage.set_session_token(user, SESSION).await.unwrap();

    let sync = SyncService::new(storage.clone(), github);
    let hub = hub::spawn().await.expect("failed to spawn hub");
    let identity = Arc::new(SessionTokenResolver::new(storage.clone()));
    let mut state = DevsyncState::new(sync, hub.clone(), identity, cfg);
    state.sync_timeout = sync_timeout;

    TestApp {
        app: devsync_router(state),
        storage,
        hub,
        user,
    }
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("failed to build request")
}

async fn json_body(resp: axum::response::Response) -> Value {
    let body = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    serde_json::from_slice(&body).expect("response body was not JSON")
}

#[tokio::test]
async fn missing_or_unknown_token_is_rejected() {
    let t = test_app(100).await;

    let resp = t.app.clone().oneshot(get("/api/user", None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(resp).await;
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let resp = t
        .app
        .clone()
        .oneshot(get("/api/user", Some("not-a-session")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = t.app.clone().oneshot(get("/ws/updates", None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_never_exposes_the_github_token() {
    let t = test_app(100).await;

    let resp = t
        .app
        .clone()
        .oneshot(get("/api/user", Some(SESSION)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = json_body(resp).await;
    assert_eq!(body["id"], t.user);
    assert_eq!(body["username"], "octo42");
    assert!(body.get("access_token").is_none());
}

#[tokio::test]
async fn token_may_come_from_the_query_string() {
    let t = test_app(100).await;

    let resp = t
        .app
        .clone()
        .oneshot(get(&format!("/api/user?token={SESSION}"), None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn sync_endpoint_stores_data_and_notifies_sessions() {
    let t = test_app(100).await;
    let (conn, mut rx) = Connection::new(t.user, 4);
    t.hub.register(conn).unwrap();

    let resp = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/user/sync")
                .header(header::AUTHORIZATION, format!("Bearer {SESSION}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await, serde_json::json!({"status": "ok"}));

    assert_eq!(t.storage.count_repos(t.user).await.unwrap(), 3);
    let frame: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
    assert_eq!(frame["event"], "stats_updated");

    let resp = t
        .app
        .clone()
        .oneshot(get("/api/user/repos?limit=2", Some(SESSION)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await.as_array().map(Vec::len), Some(2));

    let resp = t
        .app
        .clone()
        .oneshot(get(
            "/api/user/contributions?from=2024-06-01&to=2024-06-30",
            Some(SESSION),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        json_body(resp).await,
        serde_json::json!([{"date": "2024-06-01", "count": 2}])
    );

    let resp = t
        .app
        .clone()
        .oneshot(get("/api/user/stats?period=week", Some(SESSION)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["total_repos"], 3);

    t.hub.stop();
}

#[tokio::test]
async fn requests_over_the_limit_get_429_per_client() {
    let t = test_app(2).await;
    let from = |addr: &str| {
        let mut req = get("/api/user", Some(SESSION));
        let addr: SocketAddr = addr.parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        req
    };

    for _ in 0..2 {
        let resp = t.app.clone().oneshot(from("10.0.0.1:5000")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
    let resp = t.app.clone().oneshot(from("10.0.0.1:5001")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json_body(resp).await["error"]["code"], "RATE_LIMIT");

    let resp = t.app.clone().oneshot(from("10.0.0.2:5000")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn slow_sync_hits_the_deadline_without_notifying() {
    let github = Arc::new(MockGitHub::with_repos(3));
    *github.repo_delay.lock().unwrap() = Some(Duration::from_secs(30));
    let t = test_app_with(github.clone(), &Config::default(), Duration::from_millis(200)).await;
    let (conn, mut rx) = Connection::new(t.user, 4);
    t.hub.register(conn).unwrap();

    let resp = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/user/sync")
                .header(header::AUTHORIZATION, format!("Bearer {SESSION}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(json_body(resp).await["error"]["code"], "SYNC_TIMEOUT");
    assert_eq!(github.repo_calls(), 1);

    // The count call is queued behind any broadcast the handler might have sent.
    assert_eq!(t.hub.connection_count(t.user).await.unwrap(), 1);
    assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    assert_eq!(t.storage.count_repos(t.user).await.unwrap(), 0);
    assert!(t.storage.get_user(t.user).await.unwrap().last_synced_at.is_none());

    t.hub.stop();
}

async fn wait_for_connections(hub: &HubHandle, user: UserId, expected: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while hub.connection_count(user).await.unwrap() != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("connection count never reached {expected}"));
}

#[tokio::test]
async fn live_session_receives_broadcasts_until_closed() {
    let t = test_app(100).await;
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = t.app.clone();
    let server = tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
    });

    let (mut socket, _) =
        tokio_tungstenite::connect_async(format!("ws://{addr}/ws/updates?token={SESSION}"))
            .await
            .expect("websocket handshake failed");
    wait_for_connections(&t.hub, t.user, 1).await;

    t.hub.broadcast(t.user, "stats_updated", Value::Null);
    let msg = tokio::time::timeout(Duration::from_secs(5), socket.next())
        .await
        .expect("no frame within 5s")
        .expect("socket ended early")
        .expect("socket error");
    let text = match msg {
        Message::Text(text) => text,
        other => panic!("expected a text frame, got {other:?}"),
    };
    let frame: Value = serde_json::from_str(text.as_str()).unwrap();
    assert_eq!(frame, serde_json::json!({"event": "stats_updated", "data": null}));

    socket.close(None).await.unwrap();
    wait_for_connections(&t.hub, t.user, 0).await;

    server.abort();
    t.hub.stop();
}

#[tokio::test]
async fn live_session_rejects_unknown_token() {
    let t = test_app(100).await;
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = t.app.clone();
    let server = tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
    });

    match tokio_tungstenite::connect_async(format!("ws://{addr}/ws/updates?token=nope")).await {
        Err(tungstenite::Error::Http(resp)) => {
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        }
        Err(other) => panic!("unexpected handshake error: {other}"),
        Ok(_) => panic!("handshake should be refused"),
    }
    assert_eq!(t.hub.connection_count(t.user).await.unwrap(), 0);

    server.abort();
    t.hub.stop();
}
