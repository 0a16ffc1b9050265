use rgen_imagen::{
    config::ENV_API_KEY, Credentials, GenerationProfile, GenerationRequest, HttpTransport,
    ImageClient, ImageTransport, ImagenConfig, ImagenError, ProfileKind, ResponseFormat,
    RetryConfig,
};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

const PIXEL_PNG: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";

struct SeenRequest {
    head: String,
    body: String,
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn content_length(head: &str) -> usize {
    head.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}

/// Accept one connection, capture the request, answer with `status` and `body`.
async fn serve_once(status: &'static str, body: String) -> (String, JoinHandle<SeenRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];

        let head_end = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "client closed the connection early");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = find(&buf, b"\r\n\r\n") {
                break pos + 4;
            }
        };
        let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
        let expected = head_end + content_length(&head);
        while buf.len() < expected {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "client closed the connection early");
            buf.extend_from_slice(&chunk[..n]);
        }
        let request_body = String::from_utf8_lossy(&buf[head_end..expected]).into_owned();

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = socket.shutdown().await;

        SeenRequest {
            head,
            body: request_body,
        }
    });

    (format!("http://{}/v1/", addr), handle)
}

fn request(response_format: Option<ResponseFormat>) -> GenerationRequest {
    GenerationRequest {
        model: "imagen-2.0".into(),
        prompt: "a red circle".into(),
        image_count: 1,
        response_format,
    }
}

#[tokio::test]
async fn test_posts_json_with_bearer_auth() {
    let reply = format!(r#"{{"data":[{{"b64_json":"{}"}}]}}"#, PIXEL_PNG);
    let (base_url, server) = serve_once("200 OK", reply.clone()).await;
    let transport = HttpTransport::new(
        Credentials::new(base_url, "sk-test"),
        Duration::from_secs(5),
    )
    .unwrap();

    let body = transport
        .send(&request(Some(ResponseFormat::B64Json)))
        .await
        .unwrap();
    assert_eq!(body, reply);

    let seen = server.await.unwrap();
    let head = seen.head.to_lowercase();
    assert!(head.starts_with("post /v1/images/generations http/1.1"));
    assert!(head.contains("authorization: bearer sk-test"));
    assert!(head.contains("content-type: application/json"));

    let sent: serde_json::Value = serde_json::from_str(&seen.body).unwrap();
    assert_eq!(
        sent,
        serde_json::json!({
            "model": "imagen-2.0",
            "prompt": "a red circle",
            "n": 1,
            "response_format": "b64_json"
        })
    );
}

#[tokio::test]
async fn test_non_success_status_keeps_body() {
    let (base_url, server) =
        serve_once("500 Internal Server Error", r#"{"error":"rate limited"}"#.into()).await;
    let transport =
        HttpTransport::new(Credentials::new(base_url, "sk-test"), Duration::from_secs(5)).unwrap();

    let err = transport.send(&request(None)).await.unwrap_err();
    match err {
        ImagenError::Transport { status, body, .. } => {
            assert_eq!(status, Some(500));
            assert_eq!(body.as_deref(), Some(r#"{"error":"rate limited"}"#));
        }
        other => panic!("expected transport error, got {:?}", other),
    }

    let seen = server.await.unwrap();
    assert!(!seen.body.contains("response_format"));
}

#[tokio::test]
async fn test_unanswered_request_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}/v1", listener.local_addr().unwrap());
    let transport = HttpTransport::new(
        Credentials::new(base_url, "sk-test"),
        Duration::from_millis(200),
    )
    .unwrap();

    let err = transport.send(&request(None)).await.unwrap_err();
    assert!(matches!(err, ImagenError::Transport { status: None, .. }));
    assert!(err.is_retryable());
    drop(listener);
}

#[tokio::test]
async fn test_client_saves_image_from_live_endpoint() {
    let reply = format!(r#"{{"data":[{{"b64_json":"{}"}}]}}"#, PIXEL_PNG);
    let (base_url, server) = serve_once("200 OK", reply).await;
    let dir = tempfile::tempdir().unwrap();

    let config = ImagenConfig::from_lookup(ProfileKind::Scene, |key| {
        match key {
            ENV_API_KEY => Some("sk-live".to_string()),
            "LITELLM_BASE_URL" => Some(base_url.clone()),
            _ => None,
        }
    })
    .unwrap()
    .with_profile(GenerationProfile::scene())
    .with_retry(RetryConfig::none());
    let client = ImageClient::new(&config).unwrap();

    let path = dir.path().join("live_scene.png");
    assert!(client.generate_and_save("a red circle", &path).await);
    assert!(std::fs::metadata(&path).unwrap().len() > 0);

    let seen = server.await.unwrap();
    assert!(seen.head.to_lowercase().contains("authorization: bearer sk-live"));
}
