use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use serde_json::{Value, json};
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
};

use pipeline::{
    KfpClient, PipelineConfig, PipelineErr, compiler,
    mnist::{PIPELINE_NAME, model_pipeline},
};

#[derive(Debug, Clone)]
struct Recorded {
    method: String,
    target: String,
    body: String,
}

type Responder = fn(&str, &str) -> (u16, Value);

/// Serves one request per connection, answering through `respond` and recording every request.
async fn mock_server(respond: Responder) -> (SocketAddr, Arc<Mutex<Vec<Recorded>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let recorded = Arc::new(Mutex::new(Vec::new()));

    let log = Arc::clone(&recorded);
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let log = Arc::clone(&log);
            tokio::spawn(handle(stream, respond, log));
        }
    });

    (addr, recorded)
}

async fn handle(stream: TcpStream, respond: Responder, log: Arc<Mutex<Vec<Recorded>>>) {
    let mut reader = BufReader::new(stream);

    let mut request_line = String::new();
    reader.read_line(&mut request_line).await.unwrap();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or_default().to_string();

    let mut content_length = 0;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }

        if let Some((name, value)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap();
            }
        }
    }

    let mut body = vec![0; content_length];
    reader.read_exact(&mut body).await.unwrap();
    let body = String::from_utf8(body).unwrap();

    let (status, payload) = respond(&method, &target);
    log.lock().unwrap().push(Recorded {
        method,
        target,
        body,
    });

    let payload = payload.to_string();
    let response = format!(
        "HTTP/1.1 {status} Mock\r\n\
         content-type: application/json\r\n\
         content-length: {}\r\n\
         connection: close\r\n\r\n{payload}",
        payload.len()
    );

    let mut stream = reader.into_inner();
    stream.write_all(response.as_bytes()).await.unwrap();
    stream.shutdown().await.unwrap();
}

fn client_for(addr: SocketAddr) -> KfpClient {
    let config = PipelineConfig::from_lookup(|key| match key {
        "KFP_API_HOST_AND_PORT" => Some(format!("http://{addr}")),
        "KFP_UI_HOST_AND_PORT" => Some("http://ui:8080".to_string()),
        _ => None,
    });

    KfpClient::new(&config).unwrap()
}

fn compiled_package(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("mnist_pipeline.yaml");
    compiler::compile_to_file(&model_pipeline(), &path).unwrap();
    path
}

fn existing_experiment(method: &str, target: &str) -> (u16, Value) {
    match (method, target.split('?').next().unwrap_or_default()) {
        ("GET", "/apis/v2beta1/experiments") => (
            200,
            json!({ "experiments": [{ "experiment_id": "exp-1", "display_name": "Default" }] }),
        ),
        ("POST", "/apis/v2beta1/runs") => (
            200,
            json!({ "run_id": "run-42", "display_name": "model-pipeline" }),
        ),
        _ => (404, json!({ "error": "not found" })),
    }
}

fn missing_experiment(method: &str, target: &str) -> (u16, Value) {
    match (method, target.split('?').next().unwrap_or_default()) {
        ("GET", "/apis/v2beta1/experiments") => (200, json!({})),
        ("POST", "/apis/v2beta1/experiments") => (
            200,
            json!({ "experiment_id": "exp-new", "display_name": "Default" }),
        ),
        ("POST", "/apis/v2beta1/runs") => (200, json!({ "run_id": "run-7" })),
        _ => (404, json!({ "error": "not found" })),
    }
}

fn broken_service(_: &str, _: &str) -> (u16, Value) {
    (500, json!({ "error": "boom" }))
}

#[tokio::test]
async fn submits_the_package_to_the_default_experiment() {
    let (addr, recorded) = mock_server(existing_experiment).await;
    let dir = tempfile::tempdir().unwrap();
    let package = compiled_package(&dir);
    let client = client_for(addr);

    let run = client.create_run_from_pipeline_package(&package).await.unwrap();

    assert_eq!(run.run_id, "run-42");
    assert_eq!(client.run_url(&run.run_id), "http://ui:8080/#/runs/details/run-42");

    let recorded = recorded.lock().unwrap().clone();
    assert_eq!(recorded.len(), 2);
    assert!(recorded[0].target.contains("filter="));

    let body: Value = serde_json::from_str(&recorded[1].body).unwrap();
    assert_eq!(body["experiment_id"], "exp-1");
    assert_eq!(body["pipeline_spec"]["pipelineInfo"]["name"], PIPELINE_NAME);
    assert_eq!(body["pipeline_spec"]["schemaVersion"], "2.1.0");

    let display_name = body["display_name"].as_str().unwrap();
    assert!(display_name.starts_with("model-pipeline "));
    // "YYYY-MM-DD HH-MM-SS"
    assert_eq!(display_name.len(), "model-pipeline ".len() + 19);
}

#[tokio::test]
async fn creates_the_experiment_when_missing() {
    let (addr, recorded) = mock_server(missing_experiment).await;
    let dir = tempfile::tempdir().unwrap();
    let package = compiled_package(&dir);

    let run = client_for(addr)
        .create_run_from_pipeline_package(&package)
        .await
        .unwrap();
    assert_eq!(run.run_id, "run-7");

    let recorded = recorded.lock().unwrap().clone();
    let calls: Vec<(&str, &str)> = recorded
        .iter()
        .map(|r| (r.method.as_str(), r.target.split('?').next().unwrap()))
        .collect();
    assert_eq!(
        calls,
        [
            ("GET", "/apis/v2beta1/experiments"),
            ("POST", "/apis/v2beta1/experiments"),
            ("POST", "/apis/v2beta1/runs"),
        ]
    );

    let created: Value = serde_json::from_str(&recorded[1].body).unwrap();
    assert_eq!(created["display_name"], "Default");

    let run_body: Value = serde_json::from_str(&recorded[2].body).unwrap();
    assert_eq!(run_body["experiment_id"], "exp-new");
}

#[tokio::test]
async fn api_failures_propagate() {
    let (addr, _) = mock_server(broken_service).await;
    let dir = tempfile::tempdir().unwrap();
    let package = compiled_package(&dir);

    let err = client_for(addr)
        .create_run_from_pipeline_package(&package)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineErr::Api { status: 500, .. }));
}

#[tokio::test]
async fn unreachable_service_is_an_http_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let dir = tempfile::tempdir().unwrap();
    let package = compiled_package(&dir);

    let err = client_for(addr)
        .create_run_from_pipeline_package(&package)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineErr::Http(_)));
}
