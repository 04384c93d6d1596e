//! Tests for the HTTP client against a local single-shot server.

use atelier_backend::{BackendConfig, ComfyClient, GenerationBackend};
use atelier_core::{FlatGraph, GraphNode};
use atelier_error::FailureKind;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Serve one canned response and hand back the raw request it answered.
async fn serve_once(status: &str, body: &str) -> anyhow::Result<(String, JoinHandle<Vec<u8>>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let base_url = format!("http://{}", listener.local_addr()?);
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        request
    });
    Ok((base_url, handle))
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Vec<u8> {
    let mut request = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let read = socket.read(&mut chunk).await.unwrap();
        if read == 0 {
            return request;
        }
        request.extend_from_slice(&chunk[..read]);

        let Some(header_end) = find(&request, b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&request[..header_end]).to_ascii_lowercase();
        let body = &request[header_end + 4..];
        let content_length = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok());
        let complete = match content_length {
            Some(length) => body.len() >= length,
            None if head.contains("transfer-encoding: chunked") => body.ends_with(b"0\r\n\r\n"),
            None => true,
        };
        if complete {
            return request;
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn client(base_url: &str) -> ComfyClient {
    ComfyClient::new(BackendConfig::new(base_url).with_client_id("atelier-test")).unwrap()
}

fn graph() -> FlatGraph {
    let mut save = GraphNode::new("9", "SaveImage");
    save.set_literal("filename_prefix", "portrait");
    FlatGraph::from_nodes(vec![save]).unwrap()
}

#[tokio::test]
async fn accepted_submission_returns_job_id() -> anyhow::Result<()> {
    let (base_url, server) =
        serve_once("200 OK", r#"{"prompt_id": "abc-123", "number": 4, "node_errors": {}}"#)
            .await?;

    let job_id = client(&base_url).submit(&graph()).await?;
    assert_eq!(job_id, "abc-123");

    let request = String::from_utf8(server.await?)?;
    assert!(request.starts_with("POST /prompt "));
    assert!(request.contains(r#""client_id":"atelier-test""#));
    assert!(request.contains(r#""filename_prefix":"portrait""#));
    Ok(())
}

#[tokio::test]
async fn error_status_is_a_rejection_with_server_message() -> anyhow::Result<()> {
    let body = r#"{"error": {"type": "prompt_outputs_failed_validation", "message": "Prompt outputs failed validation", "details": ""}, "node_errors": {}}"#;
    let (base_url, server) = serve_once("400 Bad Request", body).await?;

    let err = client(&base_url).submit(&graph()).await.unwrap_err();
    assert_eq!(err.failure_kind(), FailureKind::SubmissionRejected);
    assert!(err.message().contains("Prompt outputs failed validation"));
    server.await?;
    Ok(())
}

#[tokio::test]
async fn node_errors_on_success_status_are_a_rejection() -> anyhow::Result<()> {
    let body = r#"{"prompt_id": "abc-123", "number": 4, "node_errors": {"9": {"class_type": "SaveImage", "errors": [{"message": "Required input is missing", "details": "images"}]}}}"#;
    let (base_url, server) = serve_once("200 OK", body).await?;

    let err = client(&base_url).submit(&graph()).await.unwrap_err();
    assert_eq!(err.failure_kind(), FailureKind::SubmissionRejected);
    let message = err.message();
    assert!(message.contains("node 9 (SaveImage)"));
    assert!(message.contains("Required input is missing: images"));
    server.await?;
    Ok(())
}

#[tokio::test]
async fn unreachable_server_is_a_connection_error() -> anyhow::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let base_url = format!("http://{}", listener.local_addr()?);
    drop(listener);

    let err = client(&base_url).submit(&graph()).await.unwrap_err();
    assert_eq!(err.failure_kind(), FailureKind::ConnectionError);
    Ok(())
}

#[tokio::test]
async fn upload_sends_multipart_image_form() -> anyhow::Result<()> {
    let (base_url, server) = serve_once(
        "200 OK",
        r#"{"name": "ref.png", "subfolder": "refs", "type": "input"}"#,
    )
    .await?;

    let uploaded = client(&base_url)
        .upload_image("ref.png", b"not really a png".to_vec())
        .await?;
    assert_eq!(uploaded.handle(), "refs/ref.png");

    let request = String::from_utf8_lossy(&server.await?).into_owned();
    assert!(request.starts_with("POST /upload/image "));
    assert!(request.to_ascii_lowercase().contains("content-type: multipart/form-data; boundary="));
    assert!(request.contains(r#"name="image"; filename="ref.png""#));
    assert!(request.contains("Content-Type: image/png"));
    assert!(request.contains("not really a png"));
    assert!(request.contains("name=\"type\"\r\n\r\ninput"));
    assert!(request.contains("name=\"overwrite\"\r\n\r\ntrue"));
    Ok(())
}

#[tokio::test]
async fn rejected_upload_keeps_status() -> anyhow::Result<()> {
    let (base_url, server) = serve_once("413 Payload Too Large", "too big").await?;

    let err = client(&base_url)
        .upload_image("ref.png", vec![0u8; 16])
        .await
        .unwrap_err();
    assert_eq!(err.failure_kind(), FailureKind::ReferenceUploadFailed);
    assert!(err.message().contains("413"));
    server.await?;
    Ok(())
}
