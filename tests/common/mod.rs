//! Shared test utilities and fixtures
//!
//! One wiremock server stands in for the marketplace API and the geocoder.

#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use proxima_engine::{
    DiscoveryBackend, DiscoverySession, DiscoveryView, HttpBackend, ProximaConfig,
};
use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Load a config pointing every service at `server`, exactly as a user's
/// `config.toml` would be read. Read retries are off so failures settle fast.
pub fn config_for(server: &MockServer) -> ProximaConfig {
    config_with_retries(server, 0)
}

pub fn config_with_retries(server: &MockServer, max_retries: u32) -> ProximaConfig {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let toml = format!(
        r#"
[services]
api_base_url = "{uri}"
api_token = "test-token"

[http]
https_only = false
max_retries = {max_retries}
request_timeout_secs = 5

[positioning]
timeout_secs = 1
"#,
        uri = server.uri()
    );
    std::fs::write(&path, toml).unwrap();
    ProximaConfig::load_from(&path).unwrap()
}

pub fn backend_for(server: &MockServer) -> Arc<HttpBackend> {
    Arc::new(HttpBackend::from_config(&config_for(server)).unwrap())
}

pub fn backend_with_retries(server: &MockServer, max_retries: u32) -> Arc<HttpBackend> {
    Arc::new(HttpBackend::from_config(&config_with_retries(server, max_retries)).unwrap())
}

pub fn professional(id: &str, name: &str, role: &str, distance_km: f64) -> Value {
    json!({
        "_id": id,
        "name": name,
        "role": role,
        "lat": 18.5 + distance_km / 100.0,
        "lon": 73.85,
        "distanceKm": distance_km,
    })
}

pub async fn mount_profile(server: &MockServer, user: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/users/{user}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

pub async fn mount_geocode(server: &MockServer, place: &str, lat: &str, lon: &str) {
    Mock::given(method("GET"))
        .and(path("/geocode"))
        .and(query_param("q", place))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{ "lat": lat, "lon": lon }])),
        )
        .expect(1)
        .mount(server)
        .await;
}

pub async fn mount_directory(server: &MockServer, radius: &str, professionals: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path("/professionals/nearby"))
        .and(query_param("radius", radius))
        .respond_with(ResponseTemplate::new(200).set_body_json(Value::Array(professionals)))
        .mount(server)
        .await;
}

pub async fn mount_team(server: &MockServer, project: &str, members: &[&str]) {
    let members: Vec<Value> = members.iter().map(|id| json!({ "userId": id })).collect();
    Mock::given(method("GET"))
        .and(path(format!("/projects/{project}/team")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "members": members })))
        .mount(server)
        .await;
}

/// Drive `session` until `done` holds for its view, or panic after
/// [`SETTLE_TIMEOUT`].
pub async fn settle_until<B, F>(session: &mut DiscoverySession<B>, mut done: F) -> DiscoveryView
where
    B: DiscoveryBackend,
    F: FnMut(&DiscoveryView) -> bool,
{
    within(async {
        loop {
            let view = session.view();
            if done(&view) {
                return view;
            }
            session.next_event().await;
        }
    })
    .await
}

pub async fn within<T>(future: impl Future<Output = T>) -> T {
    match tokio::time::timeout(SETTLE_TIMEOUT, future).await {
        Ok(value) => value,
        Err(_) => panic!("timed out after {SETTLE_TIMEOUT:?}"),
    }
}
