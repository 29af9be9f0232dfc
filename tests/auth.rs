use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use tinvest_sheets::ExportError;
use tinvest_sheets::io::auth::{CachedToken, parse_redirect_code, wait_for_redirect_code};

fn send(addr: SocketAddr, request_line: &str) -> String {
    let mut stream = TcpStream::connect(addr).expect("connected");
    stream
        .write_all(format!("{request_line}\r\nHost: 127.0.0.1\r\n\r\n").as_bytes())
        .expect("request sent");
    let mut response = String::new();
    stream.read_to_string(&mut response).expect("response read");
    response
}

#[test]
fn redirect_listener_skips_stray_connections() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("listener bound");
    let addr = listener.local_addr().expect("local address");

    let browser = thread::spawn(move || {
        let idle = TcpStream::connect(addr).expect("idle connection");
        drop(TcpStream::connect(addr).expect("closed connection"));
        let favicon = send(addr, "GET /favicon.ico HTTP/1.1");
        let redirect = send(addr, "GET /?code=4%2Fabc&scope=x HTTP/1.1");
        drop(idle);
        (favicon, redirect)
    });

    let code = wait_for_redirect_code(&listener, Duration::from_millis(200)).expect("code received");
    let (favicon, redirect) = browser.join().expect("browser thread");

    assert_eq!(code, "4/abc");
    assert!(favicon.starts_with("HTTP/1.1 404"));
    assert!(redirect.starts_with("HTTP/1.1 200"));
}

#[test]
fn refused_consent_ends_the_wait() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("listener bound");
    let addr = listener.local_addr().expect("local address");

    let browser = thread::spawn(move || send(addr, "GET /?error=access_denied HTTP/1.1"));

    let error = wait_for_redirect_code(&listener, Duration::from_millis(200))
        .expect_err("refusal reported");
    browser.join().expect("browser thread");

    assert!(matches!(error, ExportError::Auth(ref message) if message.contains("access_denied")));
}

#[test]
fn redirect_request_lines() {
    assert_eq!(
        parse_redirect_code("GET /?code=4%2Fabc&scope=x HTTP/1.1").expect("parsed"),
        Some("4/abc".to_string())
    );
    assert_eq!(parse_redirect_code("GET /favicon.ico HTTP/1.1").expect("parsed"), None);
    assert_eq!(parse_redirect_code("").expect("parsed"), None);
    assert!(parse_redirect_code("GET /?error=access_denied HTTP/1.1").is_err());
}

#[test]
fn cached_token_expires_with_margin() {
    let token = CachedToken {
        access_token: "a".into(),
        refresh_token: None,
        expires_at: Some(1_000),
    };
    assert!(token.is_valid_at(500));
    assert!(!token.is_valid_at(990));

    let without_expiry = CachedToken {
        expires_at: None,
        ..token
    };
    assert!(!without_expiry.is_valid_at(0));
}
