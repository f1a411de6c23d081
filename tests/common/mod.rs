#![allow(dead_code)]

use std::time::Duration;

use tempfile::TempDir;
use tokio::task::JoinHandle;

use digicard::config::Settings;
use digicard::security::PasswordHasher;
use digicard::server::{self, AppState};

pub struct TestServer {
    pub base: String,
    pub tmp: TempDir,
    handle: JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) { self.handle.abort(); }
}

impl TestServer {
    pub fn url(&self, path: &str) -> String { format!("{}{}", self.base, path) }
}

pub async fn start_with(configure: impl FnOnce(&mut Settings)) -> TestServer {
    let tmp = tempfile::tempdir().expect("tempdir");
    let mut settings = Settings::with_secret("integration-test-secret");
    settings.data_dir = tmp.path().to_path_buf();
    configure(&mut settings);
    let state = AppState::with_hasher(&settings, PasswordHasher::fast_for_tests()).expect("app state");

    // Ephemeral localhost port; the listener is handed straight to the server.
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.expect("bind 127.0.0.1:0");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        if let Err(e) = server::serve(listener, state).await {
            eprintln!("server task error: {e:?}");
        }
    });
    TestServer { base: format!("http://{}", addr), tmp, handle }
}

pub async fn start() -> TestServer { start_with(|_| {}).await }

/// Cookie-keeping client that does not follow redirects.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .cookie_store(true)
        .redirect(reqwest::redirect::Policy::none())
        .timeout(Duration::from_secs(10))
        .build()
        .expect("client")
}

pub async fn register(c: &reqwest::Client, srv: &TestServer, name: &str, email: &str, password: &str) -> serde_json::Value {
    let res = c
        .post(srv.url("/api/auth/register"))
        .json(&serde_json::json!({ "name": name, "email": email, "password": password }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);
    res.json().await.unwrap()
}

pub async fn login(c: &reqwest::Client, srv: &TestServer, email: &str, password: &str) -> reqwest::Response {
    c.post(srv.url("/api/auth/login"))
        .json(&serde_json::json!({ "email": email, "password": password }))
        .send()
        .await
        .unwrap()
}
