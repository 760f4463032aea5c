//! Integration tests for `HttpTransport` against a canned-response server.
//!
//! Uses a raw TCP test server to hand back pre-built HTTP responses — one
//! per incoming connection — and verifies body parsing, session handling,
//! and pending-request cleanup.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tether_rpc::{HttpTransport, RpcError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

/// Build a 200 response with a plain JSON body.
fn http_json_response(body: &str, session: Option<&str>) -> String {
    let session_header = session
        .map(|s| format!("Mcp-Session-Id: {s}\r\n"))
        .unwrap_or_default();
    format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: application/json\r\n\
         {}Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        session_header,
        body.len(),
        body
    )
}

/// Build a 200 response with an SSE-framed body.
fn http_sse_response(body: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: text/event-stream\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        body
    )
}

fn http_500_response() -> String {
    let body = r#"{"error":"internal"}"#;
    format!(
        "HTTP/1.1 500 Internal Server Error\r\n\
         Content-Type: application/json\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        body.len(),
        body
    )
}

/// Start a test server returning `responses` in connection order, recording
/// each raw request for inspection.
async fn start_test_server(responses: Vec<String>) -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let counter = Arc::new(AtomicUsize::new(0));
    let requests: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let requests_clone = Arc::clone(&requests);

    tokio::spawn(async move {
        let responses = Arc::new(responses);
        loop {
            let (mut socket, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => break,
            };
            let idx = counter.fetch_add(1, Ordering::SeqCst);
            let responses = Arc::clone(&responses);
            let requests = Arc::clone(&requests_clone);

            tokio::spawn(async move {
                let mut buf = vec![0u8; 8192];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                requests
                    .lock()
                    .await
                    .push(String::from_utf8_lossy(&buf[..n]).to_string());

                if idx < responses.len() {
                    let _ = socket.write_all(responses[idx].as_bytes()).await;
                    let _ = socket.flush().await;
                }
                let _ = socket.shutdown().await;
            });
        }
    });

    (format!("http://{addr}"), requests)
}

#[tokio::test]
async fn json_body_roundtrip() {
    let (url, _) = start_test_server(vec![http_json_response(
        r#"{"jsonrpc":"2.0","id":1,"result":{"ok":true}}"#,
        None,
    )])
    .await;

    let transport = HttpTransport::new(&url, "toolserver").unwrap();
    let result = transport.request("tools/list", None).await.unwrap();
    assert_eq!(result["ok"], true);
    assert_eq!(transport.pending_count().await, 0);
}

#[tokio::test]
async fn sse_body_with_notification_and_response() {
    let body = "event: message\n\
                data: {\"jsonrpc\":\"2.0\",\"method\":\"notifications/session\",\"params\":{\"sessionId\":\"sse-session\"}}\n\
                \n\
                event: message\n\
                data: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{\"tools\":[]}}\n\
                \n";
    let (url, _) = start_test_server(vec![http_sse_response(body)]).await;

    let transport = HttpTransport::new(&url, "toolserver").unwrap();
    let result = transport.request("tools/list", None).await.unwrap();
    assert!(result["tools"].as_array().unwrap().is_empty());

    // The session notification took effect for subsequent requests
    assert_eq!(transport.session_id().await.as_deref(), Some("sse-session"));
}

#[tokio::test]
async fn trailing_sse_event_is_flushed() {
    // No final blank line after the last event
    let body = "event: message\n\
                data: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{\"late\":true}}";
    let (url, _) = start_test_server(vec![http_sse_response(body)]).await;

    let transport = HttpTransport::new(&url, "toolserver").unwrap();
    let result = transport.request("tools/list", None).await.unwrap();
    assert_eq!(result["late"], true);
}

#[tokio::test]
async fn session_header_takes_precedence_over_notification() {
    let body = "event: message\n\
                data: {\"jsonrpc\":\"2.0\",\"method\":\"notifications/session\",\"params\":{\"sessionId\":\"from-body\"}}\n\
                \n\
                event: message\n\
                data: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n\
                \n";
    let response = format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: text/event-stream\r\n\
         Mcp-Session-Id: from-header\r\n\
         Connection: close\r\n\
         \r\n\
         {body}"
    );
    let (url, _) = start_test_server(vec![response]).await;

    let transport = HttpTransport::new(&url, "toolserver").unwrap();
    transport.request("initialize", None).await.unwrap();
    assert_eq!(transport.session_id().await.as_deref(), Some("from-header"));
}

#[tokio::test]
async fn session_id_is_attached_to_subsequent_requests() {
    let (url, requests) = start_test_server(vec![
        http_json_response(r#"{"jsonrpc":"2.0","id":1,"result":{}}"#, Some("sess-42")),
        http_json_response(r#"{"jsonrpc":"2.0","id":2,"result":{}}"#, None),
    ])
    .await;

    let transport = HttpTransport::new(&url, "toolserver").unwrap();
    transport.request("initialize", None).await.unwrap();
    transport.request("tools/list", None).await.unwrap();

    let requests = requests.lock().await;
    assert!(
        !requests[0].to_lowercase().contains("mcp-session-id"),
        "first request should carry no session"
    );
    assert!(
        requests[1].to_lowercase().contains("mcp-session-id: sess-42"),
        "second request should carry the captured session: {}",
        requests[1]
    );
}

#[tokio::test]
async fn http_error_rejects_the_pending_request() {
    let (url, _) = start_test_server(vec![http_500_response()]).await;

    let transport = HttpTransport::new(&url, "toolserver").unwrap();
    let result = transport.request("tools/call", None).await;
    match result {
        Err(RpcError::Http { status, .. }) => assert_eq!(status, 500),
        other => panic!("Expected Http error, got {other:?}"),
    }
    // The entry was removed, not left dangling
    assert_eq!(transport.pending_count().await, 0);
}

#[tokio::test]
async fn connection_refused_rejects_the_pending_request() {
    // Bind a port and drop the listener so connections are refused
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let transport = HttpTransport::new(format!("http://{addr}"), "toolserver").unwrap();
    let result = transport.request("tools/list", None).await;
    assert!(matches!(result, Err(RpcError::Network(_))));
    assert_eq!(transport.pending_count().await, 0);
}

#[tokio::test]
async fn rpc_error_object_surfaces_as_rpc_error() {
    let (url, _) = start_test_server(vec![http_json_response(
        r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32602,"message":"Invalid params"}}"#,
        None,
    )])
    .await;

    let transport = HttpTransport::new(&url, "toolserver").unwrap();
    match transport.request("tools/call", None).await {
        Err(RpcError::Rpc { code, message }) => {
            assert_eq!(code, -32602);
            assert_eq!(message, "Invalid params");
        }
        other => panic!("Expected Rpc error, got {other:?}"),
    }
}

#[tokio::test]
async fn reject_pending_cancels_outstanding_requests() {
    // A server that accepts the connection and never responds
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut buf = vec![0u8; 8192];
                let _ = socket.read(&mut buf).await;
                // Hold the connection open without answering
                tokio::time::sleep(std::time::Duration::from_secs(30)).await;
            });
        }
    });

    let transport = Arc::new(HttpTransport::new(format!("http://{addr}"), "toolserver").unwrap());
    let t = Arc::clone(&transport);
    let call = tokio::spawn(async move { t.request("tools/call", None).await });

    // Give the request time to get registered and sent
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(transport.pending_count().await, 1);

    transport.reject_pending("reconnection in progress").await;

    let result = call.await.unwrap();
    match result {
        Err(RpcError::Cancelled(reason)) => assert!(reason.contains("reconnection")),
        other => panic!("Expected Cancelled, got {other:?}"),
    }
    assert_eq!(transport.pending_count().await, 0);
}
