//! Service orchestrator reconnect policy against a scripted manager
//!
//! The fake switch accepts the socket, reads the login block, and rejects
//! it. The service must retry up to its attempt cap and then stop for good.

mod common;

use common::{processor_with, MemoryStore, RecordingSink};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use vigia_ami::MonitorService;
use vigia_core::AmiConfig;

fn config(port: u16, max_attempts: u32) -> AmiConfig {
    AmiConfig {
        host: "127.0.0.1".to_string(),
        port,
        username: "monitor".to_string(),
        secret: "wrong".to_string(),
        events: true,
        connect_timeout_secs: 2,
        auth_timeout_secs: 2,
        keepalive_interval_secs: 30,
        query_timeout_secs: 1,
        reconnect_delay_secs: 0,
        max_reconnect_attempts: max_attempts,
    }
}

async fn read_block(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = vec![0u8; 4096];
    let mut collected = String::new();
    loop {
        let n = socket.read(&mut buf).await.unwrap();
        if n == 0 {
            return collected;
        }
        collected.push_str(&String::from_utf8_lossy(&buf[..n]));
        if collected.contains("\r\n\r\n") {
            return collected;
        }
    }
}

#[tokio::test]
async fn auth_failures_stop_the_service_at_the_attempt_cap() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let accepts = Arc::new(AtomicUsize::new(0));
    let server_accepts = accepts.clone();
    tokio::spawn(async move {
        loop {
            let (mut socket, _) = listener.accept().await.unwrap();
            server_accepts.fetch_add(1, Ordering::SeqCst);
            read_block(&mut socket).await;
            socket
                .write_all(b"Response: Error\r\nMessage: Authentication failed\r\n\r\n")
                .await
                .unwrap();
        }
    });

    let store = MemoryStore::new();
    let sink = RecordingSink::new();
    let service = Arc::new(MonitorService::new(
        config(port, 3),
        Arc::new(processor_with(store, sink)),
    ));

    // the loop terminates by itself once the cap is hit
    tokio::time::timeout(Duration::from_secs(10), service.run())
        .await
        .expect("service must give up on its own");

    let status = service.status();
    assert!(!status.running);
    assert_eq!(status.state, "stopped");
    assert_eq!(status.reconnect_attempts, 3);

    // no further connection attempts after stopping
    let attempts_at_stop = accepts.load(Ordering::SeqCst);
    assert_eq!(attempts_at_stop, 3);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(accepts.load(Ordering::SeqCst), attempts_at_stop);
}

#[tokio::test]
async fn stop_is_safe_while_running() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        read_block(&mut socket).await;
        socket
            .write_all(b"Response: Success\r\nMessage: Authentication accepted\r\n\r\n")
            .await
            .unwrap();
        // hold the socket open; the service will be stopped externally
        tokio::time::sleep(Duration::from_secs(30)).await;
    });

    let store = MemoryStore::new();
    let sink = RecordingSink::new();
    let service = Arc::new(MonitorService::new(
        config(port, 3),
        Arc::new(processor_with(store, sink)),
    ));

    let runner = {
        let service = service.clone();
        tokio::spawn(async move { service.run().await })
    };

    // wait until the session reaches running
    for _ in 0..100 {
        if service.is_healthy() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(service.is_healthy());

    service.stop();
    tokio::time::timeout(Duration::from_secs(5), runner)
        .await
        .expect("run must return after stop")
        .unwrap();

    let status = service.status();
    assert!(!status.running);
    assert_eq!(status.state, "stopped");
}
