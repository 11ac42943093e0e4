mod common;

use std::time::Duration;

use common::Recorder;
use http::StatusCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use weft::Server;

async fn raw_request(addr: std::net::SocketAddr, request: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut out = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut out))
        .await
        .expect("server did not close the connection")
        .unwrap();
    String::from_utf8(out).unwrap()
}

#[tokio::test]
async fn serves_over_tcp_until_shutdown() {
    let server = Server::new();
    let group = server.handler_group("");
    group
        .get("/hello", |c| Box::pin(async move {
            let host = c.request().client_host();
            c.response().string(StatusCode::OK, format!("hello {host}")).await
        }))
        .unwrap();
    group
        .get("/chunks", |c| Box::pin(async move {
            let data: &[u8] = b"streamed body";
            c.response().stream(StatusCode::OK, data).await
        }))
        .unwrap();
    group.get("/healthz", weft::health::liveness).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let serving = tokio::spawn(server.serve_with_shutdown(listener, async {
        let _ = stopped.await;
    }));

    let res = raw_request(addr, "GET /hello HTTP/1.1\r\nHost: test\r\nConnection: close\r\n\r\n").await;
    assert!(res.starts_with("HTTP/1.1 200 OK\r\n"), "{res}");
    assert!(res.to_ascii_lowercase().contains("content-length: 15\r\n"), "{res}");
    assert!(res.ends_with("hello 127.0.0.1"), "{res}");

    let res = raw_request(addr, "GET /chunks HTTP/1.1\r\nHost: test\r\nConnection: close\r\n\r\n").await;
    assert!(res.to_ascii_lowercase().contains("transfer-encoding: chunked"), "{res}");
    assert!(res.contains("streamed body"), "{res}");

    let res = raw_request(addr, "GET /healthz HTTP/1.1\r\nHost: test\r\nConnection: close\r\n\r\n").await;
    assert!(res.ends_with("ok"), "{res}");

    let res = raw_request(addr, "GET /nowhere HTTP/1.1\r\nHost: test\r\nConnection: close\r\n\r\n").await;
    assert!(res.starts_with("HTTP/1.1 404 Not Found\r\n"), "{res}");

    stop.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), serving)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn shutdown_closes_idle_keep_alive_connections() {
    let server = Server::new();
    server
        .handler_group("")
        .get("/hello", |c| Box::pin(async move { c.response().string(StatusCode::OK, "hi").await }))
        .unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let serving = tokio::spawn(server.serve_with_shutdown(listener, async {
        let _ = stopped.await;
    }));

    // No `Connection: close`: the connection stays open after the response.
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"GET /hello HTTP/1.1\r\nHost: test\r\n\r\n").await.unwrap();
    let mut seen = Vec::new();
    let mut buf = [0u8; 1024];
    while !seen.ends_with(b"hi") {
        let n = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf))
            .await
            .expect("no response")
            .unwrap();
        assert!(n > 0, "connection closed before the response");
        seen.extend_from_slice(&buf[..n]);
    }
    assert!(seen.starts_with(b"HTTP/1.1 200 OK\r\n"));

    stop.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(3), serving)
        .await
        .expect("shutdown waited on an idle connection")
        .unwrap()
        .unwrap();

    let n = tokio::time::timeout(Duration::from_secs(1), stream.read(&mut buf))
        .await
        .expect("connection left open")
        .unwrap_or(0);
    assert_eq!(n, 0);
}

#[tokio::test]
async fn shutdown_waits_for_handlers_whose_client_left() {
    let recorder = Recorder::default();
    let server = recorder.server();
    server
        .handler_group("")
        .get("/slow", |c| Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            c.log().info("finished after the client left");
            Ok(())
        }))
        .unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let serving = tokio::spawn(server.serve_with_shutdown(listener, async {
        let _ = stopped.await;
    }));

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"GET /slow HTTP/1.1\r\nHost: test\r\n\r\n").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    drop(stream);
    tokio::time::sleep(Duration::from_millis(50)).await;

    stop.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), serving)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();

    assert_eq!(recorder.flushes(), 1);
    assert_eq!(recorder.at(common::Level::Info), vec!["finished after the client left".to_owned()]);
}
