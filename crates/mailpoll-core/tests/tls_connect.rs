//! TLS setup against a real local socket, with every TLS-capable crate of
//! the workspace (reqwest included) linked into the same test binary.

#![allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]

use std::time::Duration;

use tokio::net::TcpListener;

/// Accepts connections and hangs up on each before any TLS bytes flow.
async fn hang_up_listener() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            drop(socket);
        }
    });
    port
}

#[tokio::test]
async fn imap_handshake_failure_is_an_error_not_a_panic() {
    let port = hang_up_listener().await;
    let config = mailpoll_imap::Config::new("localhost")
        .with_port(port)
        .with_connect_timeout(Duration::from_secs(5));

    let err = mailpoll_imap::connection::connect_tls(&config)
        .await
        .err()
        .unwrap();
    assert!(
        matches!(err, mailpoll_imap::Error::Io(_) | mailpoll_imap::Error::Tls(_)),
        "{err:?}"
    );
}

#[tokio::test]
async fn pop3_handshake_failure_is_an_error_not_a_panic() {
    let port = hang_up_listener().await;
    let config = mailpoll_pop3::Config::new("localhost")
        .with_port(port)
        .with_connect_timeout(Duration::from_secs(5));

    let err = mailpoll_pop3::connection::connect_tls(&config)
        .await
        .err()
        .unwrap();
    assert!(
        matches!(err, mailpoll_pop3::Error::Io(_) | mailpoll_pop3::Error::Tls(_)),
        "{err:?}"
    );
}

#[test]
fn webhook_client_shares_the_process() {
    assert!(reqwest::Client::builder().build().is_ok());
}
