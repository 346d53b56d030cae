use std::time::Duration;
use telctl::config::Config;
use telctl::error::ErrorCode;
use telctl::session::{Connection, ConnectionOptions, Session};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const IAC: u8 = 0xff;
const DONT: u8 = 0xfe;
const DO: u8 = 0xfd;
const WILL: u8 = 0xfb;
const OPT_ECHO: u8 = 1;
const OPT_SGA: u8 = 3;

async fn read_until(socket: &mut TcpStream, received: &mut Vec<u8>, needle: &[u8]) {
    let mut buf = [0u8; 256];
    while !received.windows(needle.len()).any(|w| w == needle) {
        let n = socket.read(&mut buf).await.unwrap();
        assert!(n > 0, "client closed early");
        received.extend_from_slice(&buf[..n]);
    }
}

#[tokio::test]
async fn telnet_negotiation_login_and_command() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server_task = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut received = Vec::new();

        socket
            .write_all(&[IAC, DO, OPT_SGA, IAC, WILL, OPT_ECHO])
            .await
            .unwrap();
        socket.write_all(b"\r\nUser Access Verification\r\n\r\nUsername: ").await.unwrap();
        read_until(&mut socket, &mut received, b"admin\n").await;

        socket.write_all(b"Password: ").await.unwrap();
        read_until(&mut socket, &mut received, b"secret\n").await;

        socket.write_all(&[IAC, IAC]).await.unwrap();
        socket.write_all(b"\r\nswitch> ").await.unwrap();
        read_until(&mut socket, &mut received, b"show version\n").await;

        socket
            .write_all(b"show version\r\nVersion 1.0\r\nswitch> ")
            .await
            .unwrap();

        let mut rest = [0u8; 16];
        let _ = socket.read(&mut rest).await;
        received
    });

    let conn = Connection::connect("127.0.0.1", addr.port(), 5_000, ConnectionOptions::default())
        .await
        .unwrap();
    let session = Session::new(conn);

    let (mut session, transcript) = session
        .login("admin", "secret", Duration::from_millis(200))
        .await
        .unwrap();
    assert!(transcript.contains("User Access Verification"));
    assert!(transcript.contains("255\r\nswitch>"));
    assert_eq!(session.prompt().as_str(), "switch>");
    assert!(!session.is_enabled().unwrap());

    let output = session.command("show version").await.unwrap();
    assert!(output.contains("Version 1.0"));
    session.close().await;

    let received = server_task.await.unwrap();
    assert!(received.windows(3).any(|w| w == [IAC, WILL, OPT_SGA]));
    assert!(received.windows(3).any(|w| w == [IAC, DONT, OPT_ECHO]));
    assert!(!received.windows(2).any(|w| w == [IAC, IAC]));
}

#[tokio::test]
async fn poll_until_gives_up_on_silent_peer() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server_task = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        socket.write_all(b"Username: ").await.unwrap();
        let mut buf = [0u8; 16];
        let _ = socket.read(&mut buf).await;
    });

    let mut config = Config::default();
    config.connection.port = addr.port();
    config.read.quiet_period_ms = 50;
    config.read.retry_limit = 2;
    let mut conn = Connection::connect_with_config("127.0.0.1", &config)
        .await
        .unwrap();

    let err = conn.poll_until("Password:").await.unwrap_err();
    assert_eq!(err.code(), Some(&ErrorCode::TargetNotFound));

    conn.close().await;
    assert!(!conn.is_connected());
    assert_eq!(conn.read().await, None);
    server_task.await.unwrap();
}

#[tokio::test]
async fn connect_to_closed_port_fails() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let err = Connection::connect("127.0.0.1", port, 1_000, ConnectionOptions::default())
        .await
        .err()
        .expect("connect should fail");
    assert_eq!(err.code(), Some(&ErrorCode::ConnectFailed));
}
