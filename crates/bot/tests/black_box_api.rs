use std::sync::Arc;

use milkbot_bot::app::{build_app, SharedStore};
use milkbot_bot::middleware::SECRET_HEADER;
use milkbot_bot::Reply;
use milkbot_infra::store::InMemoryInventoryStore;
use reqwest::StatusCode;
use serde_json::json;

const SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, in-memory store, ephemeral port.
        let store: SharedStore = Arc::new(InMemoryInventoryStore::new());
        let app = build_app(store, SECRET);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    async fn command(&self, client: &reqwest::Client, command: &str, args: &[&str]) -> Reply {
        let res = client
            .post(format!("{}/commands", self.base_url))
            .header(SECRET_HEADER, SECRET)
            .json(&json!({
                "command": command,
                "args": args,
                "requester_display_name": "Aino",
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        res.json().await.unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[tokio::test]
async fn health_needs_no_secret() {
    let srv = TestServer::spawn().await;

    let res = reqwest::get(format!("{}/health", srv.base_url)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn commands_require_the_secret_header() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let body = json!({ "command": "/help", "args": [], "requester_display_name": "Aino" });

    let res = client
        .post(format!("{}/commands", srv.base_url))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .post(format!("{}/commands", srv.base_url))
        .header(SECRET_HEADER, "wrong")
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/commands", srv.base_url))
        .header(SECRET_HEADER, SECRET)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn buy_drink_and_empty_lifecycle() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    srv.command(&client, "/osta", &["2", "10.01.2030"]).await;
    srv.command(&client, "/osta", &["1", "05.01.2030"]).await;

    let status = srv.command(&client, "/tilanne", &[]).await;
    assert_eq!(
        status.text,
        "Milk status:\n2: 1L - expires 05.01.2030\n1: 2L - expires 10.01.2030"
    );

    // FIFO by expiry: batch 2 goes first.
    srv.command(&client, "/juo", &[]).await;
    let status = srv.command(&client, "/status", &[]).await;
    assert_eq!(status.text, "Milk status:\n1: 2L - expires 10.01.2030");

    let choice = srv.command(&client, "/kellota", &[]).await;
    assert_eq!(choice.options.len(), 1);
    let label = choice.options[0].label.clone();

    let emptied = srv.command(&client, "/kellota", &[label.as_str()]).await;
    assert_eq!(emptied.text, "Milk emptied! (2 L thrown away from batch 1)");

    let status = srv.command(&client, "/tilanne", &[]).await;
    assert_eq!(status.text, "No milk in the lounge!");

    let drink = srv.command(&client, "/juo", &[]).await;
    assert_eq!(drink.text, "There shouldn't be any milk left to drink?!");
}

#[tokio::test]
async fn user_errors_are_still_replies() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let reply = srv.command(&client, "/osta", &["1"]).await;
    assert!(reply.text.starts_with("Missing input."));

    let reply = srv.command(&client, "/coffee", &[]).await;
    assert!(reply.text.starts_with("Unknown command"));
}

#[tokio::test]
async fn concurrent_drinks_over_http_share_one_carton() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    srv.command(&client, "/buy", &["1", "01.01.2030"]).await;

    let srv = Arc::new(srv);
    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let srv = srv.clone();
            let client = client.clone();
            tokio::spawn(async move { srv.command(&client, "/drink", &[]).await })
        })
        .collect();

    let mut drank = 0;
    for task in tasks {
        if task.await.unwrap().text.starts_with("You drank milk!") {
            drank += 1;
        }
    }
    assert_eq!(drank, 1);
}
