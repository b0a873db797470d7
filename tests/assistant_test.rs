//! Assistant resolution against a stub generative-language endpoint.
//!
//! Each test binds an ephemeral port, answers exactly one request with a
//! canned HTTP response, and hands back the raw request it received.

use std::time::Duration;

use fieldlog::assistant::{Assistant, AssistantRequest, FallbackReason, ReplySource, Topic};
use fieldlog::llm::{DelegationError, ERROR_BODY_CHARS, GeminiClient, LanguageModel, SYSTEM_PREAMBLE};
use fieldlog::model::UserId;
use secrecy::SecretString;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Serve one response; returns the base URL and a handle yielding the request.
async fn serve_once(
    status_line: &'static str,
    body: impl Into<String>,
) -> (String, JoinHandle<String>) {
    let body = body.into();
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral port");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let request = read_request(&mut socket).await;
        let response = format!(
            "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.expect("write response");
        socket.shutdown().await.ok();
        request
    });
    (format!("http://{addr}/v1beta"), handle)
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.expect("read request");
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_string();
            let body_len = head
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + body_len {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}

fn client(base_url: &str) -> GeminiClient {
    GeminiClient::new(
        SecretString::from("test-key"),
        "gemini-test",
        base_url,
        Duration::from_secs(5),
    )
    .unwrap()
}

fn request(message: &str) -> AssistantRequest {
    AssistantRequest::new(UserId::new(), message)
}

#[tokio::test]
async fn non_2xx_response_falls_back_to_same_text_as_unconfigured() {
    let (base_url, server) =
        serve_once("500 Internal Server Error", r#"{"error": {"code": 500}}"#).await;
    let assistant = Assistant::with_model(client(&base_url));

    let reply = assistant.resolve(&request("temperature check")).await.unwrap();
    let offline = Assistant::fallback_only()
        .resolve(&request("temperature check"))
        .await
        .unwrap();

    assert_eq!(reply.text, offline.text);
    match reply.source {
        ReplySource::Fallback {
            topic,
            reason: FallbackReason::DelegationFailed(detail),
        } => {
            assert_eq!(topic, Topic::Temperature);
            assert!(detail.contains("500"), "unexpected detail: {detail}");
        }
        other => panic!("expected delegated failure fallback, got {other:?}"),
    }
    server.await.unwrap();
}

#[tokio::test]
async fn error_body_with_multibyte_char_at_the_cut_falls_back() {
    // 'é' straddles the clip point.
    let body = format!("{}é", "a".repeat(ERROR_BODY_CHARS - 1));
    let (base_url, server) = serve_once("500 Internal Server Error", body).await;

    let reply = Assistant::with_model(client(&base_url))
        .resolve(&request("temperature check"))
        .await
        .unwrap();
    assert!(matches!(
        reply.source,
        ReplySource::Fallback {
            topic: Topic::Temperature,
            reason: FallbackReason::DelegationFailed(_)
        }
    ));
    server.await.unwrap();
}

#[tokio::test]
async fn status_error_keeps_a_clipped_body() {
    let body = format!("{}éé", "a".repeat(ERROR_BODY_CHARS - 1));
    let (base_url, server) = serve_once("503 Service Unavailable", body).await;

    match client(&base_url).generate("hi").await {
        Err(DelegationError::Status { status, body }) => {
            assert_eq!(status, 503);
            assert_eq!(body.chars().count(), ERROR_BODY_CHARS);
            assert!(body.ends_with('é'));
        }
        other => panic!("expected status error, got {other:?}"),
    }
    server.await.unwrap();
}

#[tokio::test]
async fn malformed_body_falls_back() {
    let (base_url, server) = serve_once("200 OK", "not json at all").await;
    let reply = Assistant::with_model(client(&base_url))
        .resolve(&request("How is my soil?"))
        .await
        .unwrap();
    assert!(matches!(
        reply.source,
        ReplySource::Fallback {
            topic: Topic::Soil,
            reason: FallbackReason::DelegationFailed(_)
        }
    ));
    server.await.unwrap();
}

#[tokio::test]
async fn unreachable_endpoint_falls_back() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let reply = Assistant::with_model(client(&format!("http://{addr}/v1beta")))
        .resolve(&request("hello"))
        .await
        .unwrap();
    assert!(matches!(
        reply.source,
        ReplySource::Fallback {
            topic: Topic::General,
            ..
        }
    ));
}

#[tokio::test]
async fn successful_response_is_delegated_reply() {
    let (base_url, server) = serve_once(
        "200 OK",
        r#"{"candidates":[{"content":{"parts":[{"text":"Log readings at dawn."}],"role":"model"}}],
            "usageMetadata":{"promptTokenCount":40,"candidatesTokenCount":6,"totalTokenCount":46}}"#,
    )
    .await;

    let reply = Assistant::with_model(client(&base_url))
        .resolve(&request("When should I measure humidity?"))
        .await
        .unwrap();
    assert_eq!(reply.text, "Log readings at dawn.");
    assert_eq!(
        reply.source,
        ReplySource::Delegated {
            model: "gemini-test".to_string()
        }
    );

    let raw = server.await.unwrap();
    let (head, body) = raw.split_once("\r\n\r\n").unwrap();
    assert!(head.starts_with("POST /v1beta/models/gemini-test:generateContent "));
    assert!(head.to_lowercase().contains("x-goog-api-key: test-key"));

    let body: serde_json::Value = serde_json::from_str(body).unwrap();
    let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
    assert!(prompt.starts_with(SYSTEM_PREAMBLE));
    assert!(prompt.ends_with("When should I measure humidity?"));
    assert_eq!(body["generationConfig"]["maxOutputTokens"], 500);
    let temperature = body["generationConfig"]["temperature"].as_f64().unwrap();
    assert!((temperature - 0.7).abs() < 1e-6);
}

#[tokio::test]
async fn client_reports_status_errors_directly() {
    let (base_url, server) = serve_once("429 Too Many Requests", r#"{"error":"quota"}"#).await;
    let err = client(&base_url).generate("hi").await.unwrap_err();
    assert!(err.to_string().contains("429"));
    server.await.unwrap();
}
