//! Server module
//!
//! Handles TCP connections and manages the event loop.
//! This module is responsible for accepting connections and delegating
//! command processing to the dispatcher.

mod connection;

use crate::commands::CommandRegistry;
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::engine::Engine;
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

pub use connection::Connection;

/// Run the server
///
/// Builds the engine and command table from `config`, binds the listener and
/// serves until Ctrl-C.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let engine = Arc::new(Engine::new(&config));
    let registry = CommandRegistry::standard().context("building the command table")?;
    info!("{} commands registered", registry.len());
    let dispatcher = Arc::new(Dispatcher::new(engine.clone(), registry));

    let addr = config.addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("FerrumKV RESP server listening on {}", addr);

    spawn_sweeper(engine.clone(), Duration::from_millis(config.sweep_interval_ms));

    let signal_engine = engine.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, shutting down");
                signal_engine.shutdown();
            }
            Err(e) => error!("Unable to listen for Ctrl-C: {}", e),
        }
    });

    serve(listener, dispatcher).await
}

/// Accept connections on `listener` until the engine shuts down
pub async fn serve(listener: TcpListener, dispatcher: Arc<Dispatcher>) -> anyhow::Result<()> {
    let shutdown = dispatcher.engine().shutdown_token().clone();

    loop {
        // Accept incoming connections
        let (socket, addr) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    continue;
                }
            },
            _ = shutdown.cancelled() => {
                info!("Listener stopped");
                return Ok(());
            }
        };
        info!("New RESP connection from {}", addr);

        // Clone the dispatcher Arc for this connection
        let dispatcher = dispatcher.clone();

        // Spawn a new task to handle this connection
        tokio::spawn(async move {
            let mut connection = Connection::new(socket);

            if let Err(e) = connection.handle(dispatcher).await {
                error!("Connection error from {}: {}", addr, e);
            }

            info!("Connection closed: {}", addr);
        });
    }
}

/// Periodically drop expired keys until shutdown
pub fn spawn_sweeper(engine: Arc<Engine>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    engine.sweep_expired().await;
                }
                _ = engine.shutdown_token().cancelled() => {
                    debug!("Expiry sweeper stopped");
                    return;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{RespParser, RespValue};
    use bytes::{Bytes, BytesMut};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    async fn start() -> (Arc<Dispatcher>, std::net::SocketAddr, JoinHandle<anyhow::Result<()>>) {
        let engine = Arc::new(Engine::default());
        let dispatcher = Arc::new(Dispatcher::new(engine, CommandRegistry::standard().unwrap()));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(serve(listener, dispatcher.clone()));
        (dispatcher, addr, handle)
    }

    /// Read until `expected` bytes arrived
    async fn read_exact(stream: &mut TcpStream, expected: &[u8]) {
        let mut buf = vec![0u8; expected.len()];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(String::from_utf8_lossy(&buf), String::from_utf8_lossy(expected));
    }

    #[tokio::test]
    async fn test_end_to_end_session() {
        let (dispatcher, addr, handle) = start().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n").await.unwrap();
        read_exact(&mut client, b"+OK\r\n").await;

        // Inline request, pipelined with a multibulk one
        client.write_all(b"GET k\r\n*2\r\n$6\r\nEXISTS\r\n$1\r\nk\r\n").await.unwrap();
        read_exact(&mut client, b"$1\r\nv\r\n:1\r\n").await;

        client.write_all(b"*1\r\n$4\r\nQUIT\r\n").await.unwrap();
        read_exact(&mut client, b"+OK\r\n").await;
        let mut rest = Vec::new();
        assert_eq!(client.read_to_end(&mut rest).await.unwrap(), 0);

        dispatcher.engine().shutdown();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_blocked_client_served_by_other_client() {
        let (dispatcher, addr, handle) = start().await;
        let mut waiter = TcpStream::connect(addr).await.unwrap();
        let mut pusher = TcpStream::connect(addr).await.unwrap();

        waiter.write_all(b"BLPOP queue 0\r\n").await.unwrap();
        pusher.write_all(b"RPUSH queue job\r\n").await.unwrap();
        read_exact(&mut pusher, b":1\r\n").await;

        let mut buf = BytesMut::new();
        loop {
            waiter.read_buf(&mut buf).await.unwrap();
            if let Some(reply) = RespParser::parse_request(&mut buf).unwrap() {
                assert_eq!(reply, vec![Bytes::from("queue"), Bytes::from("job")]);
                break;
            }
        }

        dispatcher.engine().shutdown();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_releases_blocked_client() {
        let (dispatcher, addr, handle) = start().await;
        let mut waiter = TcpStream::connect(addr).await.unwrap();

        waiter.write_all(b"BLPOP queue 0\r\n").await.unwrap();
        // Wait until the server is parked on the BLPOP
        while dispatcher.processed_commands() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        dispatcher.engine().shutdown();
        handle.await.unwrap().unwrap();

        // No reply, just a closed connection
        let mut rest = Vec::new();
        assert_eq!(waiter.read_to_end(&mut rest).await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_removes_expired_keys() {
        let engine = Arc::new(Engine::default());
        {
            let mut store = engine.lock().await;
            let db = store.db(0);
            db.set_string(&Bytes::from("k"), Bytes::from("v"));
            db.expire(&Bytes::from("k"), Duration::from_secs(1));
        }
        let sweeper = spawn_sweeper(engine.clone(), Duration::from_millis(100));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(engine.lock().await.db_len(0), 0);

        engine.shutdown();
        sweeper.await.unwrap();
    }

    #[test]
    fn test_reply_value_shape() {
        // A BLPOP reply decodes like a request array of bulk strings
        let encoded = crate::protocol::RespEncoder::encode(&RespValue::bulk_array(vec![
            Bytes::from("queue"),
            Bytes::from("job"),
        ]));
        let mut buf = BytesMut::from(&encoded[..]);
        let decoded = RespParser::parse_request(&mut buf).unwrap();
        assert_eq!(decoded, Some(vec![Bytes::from("queue"), Bytes::from("job")]));
    }
}
