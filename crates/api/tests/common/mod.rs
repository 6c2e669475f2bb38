#![allow(dead_code)]

use std::path::PathBuf;

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use testu_api::app::build_app;
use testu_api::config::{Protocol, ServerConfig};
use testu_api::state::AppState;

/// Agent identifier on the test roster.
pub const AGENT: &str = "agent-a";

/// Build a test `ServerConfig` writing reports under `report_dir`.
pub fn test_config(report_dir: PathBuf) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        protocol: Protocol::Http,
        agents: vec![AGENT.to_string()],
        app_url: "http://testu.local".to_string(),
        report_dir,
        scripts_dir: None,
        script_id: "default".to_string(),
        requester: "tester@example.org".to_string(),
        request_timeout_secs: 30,
        report_body_limit: 1024 * 1024,
        assigned_ttl_secs: 86_400,
        sweep_interval_secs: 300,
    }
}

/// A running application plus the handles tests inspect.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub dir: TempDir,
}

/// Build the full application router with all middleware layers, backed
/// by a temporary report directory.
pub fn build_test_app() -> TestApp {
    build_test_app_with(|_| {})
}

/// Like [`build_test_app`], with a chance to adjust the config first.
pub fn build_test_app_with(adjust: impl FnOnce(&mut ServerConfig)) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path().join("reports"));
    adjust(&mut config);
    let state = AppState::new(config);
    TestApp {
        router: build_app(state.clone()),
        state,
        dir,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn post_form(&self, uri: &str, form: &str) -> Response<Body> {
        self.send(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn post_json(&self, uri: &str, body: &serde_json::Value) -> Response<Body> {
        self.send(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Submit a target through the form and return the new job identifier.
    pub async fn submit(&self, url: &str, what: &str) -> String {
        let form = format!(
            "pageURL={}&pageWhat={}",
            encode(url),
            encode(what)
        );
        let response = self.post_form("/result.html", &form).await;
        assert_eq!(response.status(), StatusCode::OK);
        job_id_in(&body_text(response).await)
    }
}

/// Minimal form encoding for test values.
pub fn encode(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('&', "%26")
        .replace('=', "%3D")
        .replace('+', "%2B")
        .replace(' ', "+")
        .replace(':', "%3A")
        .replace('/', "%2F")
}

/// The job identifier embedded in a placeholder page.
pub fn job_id_in(page: &str) -> String {
    let start = page
        .find(r#"<code id="jobID">"#)
        .expect("placeholder page has a job identifier")
        + r#"<code id="jobID">"#.len();
    let end = page[start..].find("</code>").unwrap() + start;
    page[start..end].to_string()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// `data:` lines of a finished SSE body, in order.
pub fn sse_data(body: &str) -> Vec<String> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:")))
        .map(str::to_string)
        .collect()
}

/// A complete report for `job_id`, as an agent would post it.
pub fn report_for(job: &serde_json::Value, agent: &str) -> serde_json::Value {
    let mut report = job.clone();
    let acts = report["acts"].as_array_mut().unwrap();
    for act in acts.iter_mut() {
        if act["type"] == "test" {
            act["standardResult"] = serde_json::json!({
                "totals": [2, 0, 1, 0],
                "instances": []
            });
        }
    }
    report["sources"]["agent"] = serde_json::Value::String(agent.to_string());
    report["jobData"] = serde_json::json!({"elapsedSeconds": 42, "aborted": false});
    report
}
