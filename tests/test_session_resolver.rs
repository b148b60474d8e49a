// ABOUTME: Integration tests for resolving a container pattern against a stand-in control plane
// An axum server plays the Rancher API; a scripted operator plays the human at the terminal

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use pretty_assertions::assert_eq;
use rancherssh::rancher::{
    Credentials, Operator, RancherClient, ResolveError, SessionResolver, TerminalGeometry,
};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// Stand-in control plane
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct ExecCall {
    container_id: String,
    query: HashMap<String, String>,
    body: Value,
}

#[derive(Default)]
struct ControlPlane {
    containers: Vec<Value>,
    reject_auth: bool,
    listing_queries: Mutex<Vec<HashMap<String, String>>>,
    authorizations: Mutex<Vec<String>>,
    exec_calls: Mutex<Vec<ExecCall>>,
}

impl ControlPlane {
    fn exec_calls(&self) -> Vec<ExecCall> {
        self.exec_calls.lock().unwrap().clone()
    }
}

async fn list_containers(
    State(plane): State<Arc<ControlPlane>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<Value>, StatusCode> {
    if let Some(auth) = headers.get("authorization") {
        plane
            .authorizations
            .lock()
            .unwrap()
            .push(auth.to_str().unwrap().to_string());
    }
    if plane.reject_auth {
        return Err(StatusCode::UNAUTHORIZED);
    }
    plane.listing_queries.lock().unwrap().push(query);
    Ok(Json(json!({ "data": plane.containers })))
}

async fn execute(
    State(plane): State<Arc<ControlPlane>>,
    Path(container_id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Json<Value> {
    let token = format!("tok-{container_id}");
    plane.exec_calls.lock().unwrap().push(ExecCall {
        container_id,
        query,
        body,
    });
    Json(json!({ "url": "ws://exec.example/v1/exec/", "token": token }))
}

/// Spin up the control plane on a random port, return its endpoint.
async fn start_control_plane(plane: ControlPlane) -> (String, Arc<ControlPlane>) {
    let plane = Arc::new(plane);
    let router = Router::new()
        .route("/v1/containers/", get(list_containers))
        .route("/v1/containers/:id/", post(execute))
        .with_state(plane.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind to ephemeral port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (format!("http://{addr}/v1"), plane)
}

/// A control plane that answers every listing and execute call with fixed
/// JSON-typed bodies, well-formed or not.
async fn start_raw_control_plane(listing: &'static str, execute: &'static str) -> String {
    let json_body = |body: &'static str| ([(header::CONTENT_TYPE, "application/json")], body);
    let router = Router::new()
        .route("/v1/containers/", get(move || async move { json_body(listing) }))
        .route("/v1/containers/:id/", post(move || async move { json_body(execute) }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind to ephemeral port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    format!("http://{addr}/v1")
}

const ONE_CONTAINER: &str =
    r#"{"data": [{"id": "1i1", "name": "web-1", "accountId": "1a5", "primaryIpAddress": "10.42.0.1"}]}"#;
const GRANT: &str = r#"{"url": "ws://exec.example/v1/exec/", "token": "tok"}"#;

fn container(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "accountId": "1a5",
        "primaryIpAddress": "10.42.0.1"
    })
}

// ---------------------------------------------------------------------------
// Scripted operator
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Transcript {
    lines: Vec<String>,
    prompts: Vec<String>,
}

struct ScriptedOperator {
    answers: VecDeque<String>,
    transcript: Arc<Mutex<Transcript>>,
}

impl ScriptedOperator {
    fn new(answers: &[&str]) -> (Self, Arc<Mutex<Transcript>>) {
        let transcript = Arc::new(Mutex::new(Transcript::default()));
        let operator = Self {
            answers: answers.iter().map(|a| format!("{a}\n")).collect(),
            transcript: transcript.clone(),
        };
        (operator, transcript)
    }
}

impl Operator for ScriptedOperator {
    fn say(&mut self, line: &str) {
        self.transcript.lock().unwrap().lines.push(line.to_string());
    }

    fn ask(&mut self, prompt: &str) -> io::Result<String> {
        self.transcript.lock().unwrap().prompts.push(prompt.to_string());
        self.answers
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "no more answers"))
    }

    fn geometry(&self) -> Option<TerminalGeometry> {
        Some(TerminalGeometry { cols: 120, rows: 40 })
    }
}

fn resolver(
    endpoint: &str,
    answers: &[&str],
) -> (SessionResolver<ScriptedOperator>, Arc<Mutex<Transcript>>) {
    let (operator, transcript) = ScriptedOperator::new(answers);
    let client = RancherClient::new(Credentials::new(endpoint, "key", "secret"));
    (SessionResolver::new(client, operator), transcript)
}

// ===========================================================================
// Tests
// ===========================================================================

#[tokio::test]
async fn test_single_match_resolves_without_prompting() {
    let (endpoint, plane) = start_control_plane(ControlPlane {
        containers: vec![container("1i42", "web-1")],
        ..Default::default()
    })
    .await;
    let (mut resolver, transcript) = resolver(&endpoint, &[]);

    let url = resolver.resolve_container("web-*").await.unwrap();
    assert_eq!(url, "ws://exec.example/v1/exec/?token=tok-1i42");

    let queries = plane.listing_queries.lock().unwrap().clone();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0]["name_like"], "web-%");
    assert_eq!(queries[0]["state"], "running");
    assert_eq!(queries[0]["kind"], "container");

    let calls = plane.exec_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].container_id, "1i42");
    assert_eq!(calls[0].query["action"], "execute");
    assert_eq!(calls[0].body["tty"], json!(true));
    assert_eq!(calls[0].body["attachStdin"], json!(true));
    assert_eq!(calls[0].body["attachStdout"], json!(true));
    assert!(calls[0].body["command"][2]
        .as_str()
        .unwrap()
        .contains("stty cols 120 rows 40"));

    let transcript = transcript.lock().unwrap();
    assert!(transcript.prompts.is_empty());
    assert_eq!(
        transcript.lines,
        vec![
            "Searching for container web-*".to_string(),
            "Target Container: web-1, ID 1i42 in project 1a5, Addr 10.42.0.1".to_string(),
            "Getting access token".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_requests_use_basic_auth() {
    let (endpoint, plane) = start_control_plane(ControlPlane {
        containers: vec![container("1i42", "web-1")],
        ..Default::default()
    })
    .await;
    let (mut resolver, _) = resolver(&endpoint, &[]);

    resolver.resolve_container("web-1").await.unwrap();
    let auth = plane.authorizations.lock().unwrap().clone();
    assert_eq!(auth, vec!["Basic a2V5OnNlY3JldA==".to_string()]);
}

#[tokio::test]
async fn test_trailing_slash_endpoint_is_normalized() {
    let (endpoint, plane) = start_control_plane(ControlPlane {
        containers: vec![container("1i7", "db")],
        ..Default::default()
    })
    .await;
    let (mut resolver, _) = resolver(&format!("{endpoint}/"), &[]);

    let url = resolver.resolve_container("db").await.unwrap();
    assert_eq!(url, "ws://exec.example/v1/exec/?token=tok-1i7");
    assert_eq!(plane.exec_calls().len(), 1);
    assert_eq!(resolver.origin(), endpoint);
}

#[tokio::test]
async fn test_no_match_is_not_found_and_skips_exec() {
    let (endpoint, plane) = start_control_plane(ControlPlane::default()).await;
    let (mut resolver, _) = resolver(&endpoint, &[]);

    let err = resolver.resolve_container("ghost*").await.unwrap_err();
    match &err {
        ResolveError::NotFound { pattern } => assert_eq!(pattern, "ghost*"),
        other => panic!("expected NotFound, got {other:?}"),
    }
    assert!(err.to_string().starts_with("Container ghost* not existed in system"));
    assert!(plane.exec_calls().is_empty());
}

#[tokio::test]
async fn test_operator_picks_second_of_three() {
    let (endpoint, plane) = start_control_plane(ControlPlane {
        containers: vec![
            container("1i1", "app-a"),
            container("1i2", "app-b"),
            container("1i3", "app-c"),
        ],
        ..Default::default()
    })
    .await;
    let (mut resolver, transcript) = resolver(&endpoint, &["2"]);

    let url = resolver.resolve_container("app").await.unwrap();
    assert_eq!(url, "ws://exec.example/v1/exec/?token=tok-1i2");
    assert_eq!(plane.exec_calls()[0].container_id, "1i2");

    let transcript = transcript.lock().unwrap();
    assert_eq!(
        transcript.prompts,
        vec!["Which one you want to connect: ".to_string()]
    );
    assert!(transcript
        .lines
        .contains(&"[2] app-b, Container ID 1i2 in project 1a5, IP Address 10.42.0.1".to_string()));
    assert!(transcript
        .lines
        .contains(&"Target Container: app-b, ID 1i2 in project 1a5, Addr 10.42.0.1".to_string()));
}

#[tokio::test]
async fn test_out_of_range_choice_is_invalid_selection() {
    let (endpoint, plane) = start_control_plane(ControlPlane {
        containers: vec![
            container("1i1", "app-a"),
            container("1i2", "app-b"),
            container("1i3", "app-c"),
        ],
        ..Default::default()
    })
    .await;
    let (mut resolver, _) = resolver(&endpoint, &["5"]);

    let err = resolver.resolve_container("app").await.unwrap_err();
    assert!(matches!(
        err,
        ResolveError::InvalidSelection { ref input, count: 3 } if input == "5"
    ));
    assert!(plane.exec_calls().is_empty());
}

#[tokio::test]
async fn test_closed_input_aborts_selection() {
    let (endpoint, plane) = start_control_plane(ControlPlane {
        containers: vec![container("1i1", "app-a"), container("1i2", "app-b")],
        ..Default::default()
    })
    .await;
    let (mut resolver, _) = resolver(&endpoint, &[]);

    let err = resolver.resolve_container("app").await.unwrap_err();
    assert!(matches!(err, ResolveError::SelectionAborted(_)));
    assert!(plane.exec_calls().is_empty());
}

#[tokio::test]
async fn test_extended_records_show_host() {
    let (endpoint, _plane) = start_control_plane(ControlPlane {
        containers: vec![
            container("1i1", "lb-a"),
            json!({
                "id": "1i9",
                "name": "lb-b",
                "accountId": "1a7",
                "data": {"fields": {"primaryIpAddress": "10.42.3.3", "dockerHostIp": "192.168.1.20"}}
            }),
        ],
        ..Default::default()
    })
    .await;
    let (mut resolver, transcript) = resolver(&endpoint, &["2"]);

    resolver.resolve_container("lb-*").await.unwrap();
    let transcript = transcript.lock().unwrap();
    assert!(transcript.lines.contains(
        &"[2] lb-b, Container ID 1i9 in project 1a7, IP Address 10.42.3.3 on Host 192.168.1.20"
            .to_string()
    ));
}

#[tokio::test]
async fn test_rejected_credentials_are_communication_errors() {
    let (endpoint, plane) = start_control_plane(ControlPlane {
        reject_auth: true,
        ..Default::default()
    })
    .await;
    let (mut resolver, _) = resolver(&endpoint, &[]);

    let err = resolver.resolve_container("web").await.unwrap_err();
    match err {
        ResolveError::Communication(message) => assert!(message.contains("401")),
        other => panic!("expected Communication, got {other:?}"),
    }
    assert!(plane.exec_calls().is_empty());
}

#[tokio::test]
async fn test_unreachable_control_plane_is_communication_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (mut resolver, _) = resolver(&format!("http://{addr}/v1"), &[]);
    let err = resolver.resolve_container("web").await.unwrap_err();
    assert!(matches!(err, ResolveError::Communication(_)));
}

#[tokio::test]
async fn test_malformed_listings_are_protocol_errors() {
    let listings = [
        "<html>maintenance</html>",
        r#"{"data": [{"id": "1i1", "name": "web-1", "accountId": 5}]}"#,
        r#"{"type": "collection"}"#,
    ];

    for listing in listings {
        let endpoint = start_raw_control_plane(listing, GRANT).await;
        let (mut resolver, _) = resolver(&endpoint, &[]);

        let err = resolver.resolve_container("web").await.unwrap_err();
        assert!(
            matches!(err, ResolveError::Protocol(_)),
            "listing {listing} gave {err:?}"
        );
    }
}

#[tokio::test]
async fn test_grant_without_token_is_protocol_error() {
    let endpoint =
        start_raw_control_plane(ONE_CONTAINER, r#"{"url": "ws://exec.example/v1/exec/"}"#).await;
    let (mut resolver, _) = resolver(&endpoint, &[]);

    let err = resolver.resolve_container("web").await.unwrap_err();
    match err {
        ResolveError::Protocol(message) => assert!(message.contains("token"), "{message}"),
        other => panic!("expected Protocol, got {other:?}"),
    }
}

#[tokio::test]
async fn test_raw_control_plane_grant_round_trips() {
    let endpoint = start_raw_control_plane(ONE_CONTAINER, GRANT).await;
    let (mut resolver, _) = resolver(&endpoint, &[]);

    let url = resolver.resolve_container("web").await.unwrap();
    assert_eq!(url, "ws://exec.example/v1/exec/?token=tok");
}
