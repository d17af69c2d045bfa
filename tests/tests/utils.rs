use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Spin up an isolated mock target on an ephemeral port.
#[allow(unused)]
pub async fn spawn_mock() -> SocketAddr {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(mock_service::serve(listener));
    addr
}

/// Spin up a control API server on an ephemeral port.
#[allow(unused)]
pub async fn spawn_control_api() -> SocketAddr {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        barrage_runtime::serve_listener(listener).await.unwrap();
    });
    addr
}

#[allow(unused)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
