//! Connection handling
//!
//! Manages individual client connections, decoding requests and sending
//! replies. Each connection owns its `ExecutionContext`, created on the first
//! dispatched command and dropped with the connection.

use crate::commands::ExecutionContext;
use crate::dispatch::Dispatcher;
use crate::protocol::{RespEncoder, RespParser, RespValue};
use anyhow::bail;
use bytes::BytesMut;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Connection handler
pub struct Connection {
    /// TCP stream
    stream: TcpStream,

    /// Read buffer
    read_buffer: BytesMut,

    /// Write buffer
    write_buffer: BytesMut,

    /// Per-connection state, created lazily
    context: Option<ExecutionContext>,
}

impl Connection {
    /// Create a new connection handler
    pub fn new(stream: TcpStream) -> Self {
        Connection {
            stream,
            read_buffer: BytesMut::with_capacity(4096),
            write_buffer: BytesMut::with_capacity(4096),
            context: None,
        }
    }

    /// Handle the connection
    ///
    /// Reads requests from the client, dispatches them, and sends replies.
    /// Returns when the client disconnects or sends QUIT, or on shutdown.
    pub async fn handle(&mut self, dispatcher: Arc<Dispatcher>) -> anyhow::Result<()> {
        let shutdown = dispatcher.engine().shutdown_token().clone();

        loop {
            // Serve every complete request already buffered (pipelining)
            loop {
                let request = match RespParser::parse_request(&mut self.read_buffer) {
                    Ok(Some(request)) => request,
                    Ok(None) => break,
                    Err(e) => {
                        // The stream cannot be resynchronized
                        warn!("Protocol error: {}", e);
                        let reply = RespValue::error(format!("ERR Protocol error: {}", e));
                        self.send_replies(&[reply]).await?;
                        return Ok(());
                    }
                };
                if request.is_empty() {
                    continue;
                }

                let ctx = self.context.get_or_insert_with(ExecutionContext::new);
                let replies = dispatcher.dispatch(ctx, request).await;
                let closing = ctx.is_closing();

                self.send_replies(&replies).await?;
                if closing {
                    debug!("Client sent QUIT");
                    return Ok(());
                }
            }

            // Read data from the socket
            let n = tokio::select! {
                read = self.stream.read_buf(&mut self.read_buffer) => read?,
                _ = shutdown.cancelled() => return Ok(()),
            };

            // Connection closed
            if n == 0 {
                if self.read_buffer.is_empty() {
                    return Ok(());
                } else {
                    bail!("connection reset by peer");
                }
            }

            debug!("Read {} bytes", n);
        }
    }

    /// Encode the replies to one request and flush them together
    async fn send_replies(&mut self, replies: &[RespValue]) -> anyhow::Result<()> {
        if replies.is_empty() {
            return Ok(());
        }

        self.write_buffer.clear();
        for reply in replies {
            RespEncoder::encode_to(&mut self.write_buffer, reply);
        }

        self.stream.write_all(&self.write_buffer).await?;
        self.stream.flush().await?;

        Ok(())
    }
}
