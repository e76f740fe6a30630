//! `RemoteModel` against a throwaway local HTTP server.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use pictobert::RemoteModel;
use pictobert_core::{Encoding, MaskScores, MaskedLanguageModel, PictoError};

/// Read one HTTP request (headers plus `Content-Length` body) and return the body.
fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let header_end = loop {
        let n = stream.read(&mut chunk).unwrap();
        assert!(n > 0, "client closed before sending headers");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
    let length: usize = headers
        .lines()
        .find_map(|l| l.strip_prefix("content-length:"))
        .map(|v| v.trim().parse().unwrap())
        .unwrap_or(0);
    while buf.len() < header_end + length {
        let n = stream.read(&mut chunk).unwrap();
        assert!(n > 0, "client closed before sending body");
        buf.extend_from_slice(&chunk[..n]);
    }
    String::from_utf8(buf[header_end..header_end + length].to_vec()).unwrap()
}

/// Serve exactly one request with `status` and `body`; returns the request body.
fn serve_once(status: &'static str, body: &'static str) -> (String, thread::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/mask", listener.local_addr().unwrap());
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let request = read_request(&mut stream);
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).unwrap();
        stream.flush().unwrap();
        request
    });
    (url, handle)
}

#[test]
fn posts_encoding_and_parses_scores() {
    let (url, server) = serve_once("200 OK", r#"{"kind":"logits","values":[0.0,0.0,0.0,0.0]}"#);
    let model = RemoteModel::new(url, Duration::from_secs(5)).unwrap();

    let scores = model
        .mask_scores(&Encoding::from_ids(vec![2, 4, 5, 3]), 1)
        .unwrap();
    assert_eq!(scores, MaskScores::Logits(vec![0.0; 4]));

    let request: serde_json::Value = serde_json::from_str(&server.join().unwrap()).unwrap();
    assert_eq!(
        request,
        serde_json::json!({
            "input_ids": [2, 4, 5, 3],
            "attention_mask": [1, 1, 1, 1],
            "position": 1
        })
    );
}

#[test]
fn server_error_is_model_error() {
    let (url, server) = serve_once("500 Internal Server Error", r#"{"detail":"boom"}"#);
    let model = RemoteModel::new(url, Duration::from_secs(5)).unwrap();
    let err = model
        .mask_scores(&Encoding::from_ids(vec![4]), 0)
        .unwrap_err();
    assert!(matches!(err, PictoError::Model(_)));
    server.join().unwrap();
}

#[test]
fn silent_server_is_service_unavailable() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/mask", listener.local_addr().unwrap());
    // Accept and hold the connection open without answering.
    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        thread::sleep(Duration::from_millis(1000));
        drop(stream);
    });

    let model = RemoteModel::new(url, Duration::from_millis(100)).unwrap();
    let err = model
        .mask_scores(&Encoding::from_ids(vec![4]), 0)
        .unwrap_err();
    assert!(matches!(err, PictoError::ServiceUnavailable { timeout_ms: 100 }));
    server.join().unwrap();
}
