//! In-process mock server for tests.
//!
//! Answers the handshake and authentication itself, counts pings and hands
//! every other frame to a test-supplied handler whose returned frames are
//! written back in order.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;

use super::config::{ConnectionConfig, ServerAddress};
use crate::protocol::{Frame, FrameCodec, MessageHeader, OutputStream, VerbId};

/// Log to the test writer; filter with `RUST_LOG`.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Build a response frame for `request`.
pub(crate) fn reply(
    request: &Frame,
    verb: VerbId,
    build: impl FnOnce(&mut OutputStream),
) -> Frame {
    let mut out = OutputStream::new();
    build(&mut out);
    Frame::new(
        MessageHeader::new(verb, request.header.request_id),
        out.freeze(),
    )
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct MockServerOptions {
    pub reject_auth: bool,
    /// Delay before each handler reply
    pub reply_delay: Option<Duration>,
}

pub(crate) struct MockServer {
    address: ServerAddress,
    pings: Arc<AtomicUsize>,
    connections: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl MockServer {
    pub const AUTH_TOKEN: i64 = 77;
    pub const SESSION_ID: i64 = 99;
    const CHALLENGE: i64 = 300;

    pub async fn start<H>(handler: H) -> Self
    where
        H: Fn(&Frame) -> Vec<Frame> + Send + Sync + 'static,
    {
        Self::start_with(MockServerOptions::default(), handler).await
    }

    pub async fn start_with<H>(options: MockServerOptions, handler: H) -> Self
    where
        H: Fn(&Frame) -> Vec<Frame> + Send + Sync + 'static,
    {
        init_tracing();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let local = listener.local_addr().unwrap();
        let handler = Arc::new(handler);
        let pings = Arc::new(AtomicUsize::new(0));
        let connections = Arc::new(AtomicUsize::new(0));

        let task = {
            let pings = pings.clone();
            let connections = connections.clone();
            tokio::spawn(async move {
                while let Ok((socket, _)) = listener.accept().await {
                    connections.fetch_add(1, Ordering::SeqCst);
                    let framed = Framed::new(socket, FrameCodec::new());
                    tokio::spawn(serve(framed, options, handler.clone(), pings.clone()));
                }
            })
        };

        Self {
            address: ServerAddress::new("127.0.0.1", local.port()),
            pings,
            connections,
            task,
        }
    }

    pub fn address(&self) -> &ServerAddress {
        &self.address
    }

    /// Client config pointing at this server, without keepalive.
    pub fn config(&self) -> ConnectionConfig {
        ConnectionConfig::builder(&format!("tcp://scott@{}", self.address))
            .unwrap()
            .with_credentials("scott", "tiger")
            .with_operation_timeout(Some(Duration::from_secs(5)))
            .with_ping_interval(None)
            .with_pool_size(2)
            .build()
            .unwrap()
    }

    pub fn pings(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve<H>(
    mut framed: Framed<tokio::net::TcpStream, FrameCodec>,
    options: MockServerOptions,
    handler: Arc<H>,
    pings: Arc<AtomicUsize>,
) where
    H: Fn(&Frame) -> Vec<Frame> + Send + Sync + 'static,
{
    while let Some(Ok(frame)) = framed.next().await {
        let replies = match frame.header.verb {
            VerbId::HandShakeRequest => {
                let mut input = frame.payload_stream();
                let kind = input.read_u8().unwrap();
                let _ssl = input.read_bool().unwrap();
                let challenge = input.read_i64().unwrap();
                let (status, next) = match kind {
                    1 => (1u8, MockServer::CHALLENGE),
                    _ if challenge == MockServer::CHALLENGE * 2 / 3 => (2u8, 0),
                    _ => (3u8, 0),
                };
                vec![reply(&frame, VerbId::HandShakeResponse, |out| {
                    out.write_u8(status);
                    out.write_i64(next);
                    if status == 3 {
                        out.write_bytes(b"bad challenge").unwrap();
                    }
                })]
            }
            VerbId::AuthenticateRequest => {
                let reject = options.reject_auth;
                vec![reply(&frame, VerbId::AuthenticateResponse, |out| {
                    out.write_bool(!reject);
                    if reject {
                        out.write_i32(1);
                    }
                    out.write_i64(MockServer::AUTH_TOKEN);
                    out.write_i64(MockServer::SESSION_ID);
                    out.write_bytes(&[]).unwrap();
                })]
            }
            VerbId::Ping => {
                pings.fetch_add(1, Ordering::SeqCst);
                Vec::new()
            }
            VerbId::DisconnectChannelRequest => break,
            _ => {
                if let Some(delay) = options.reply_delay {
                    tokio::time::sleep(delay).await;
                }
                handler(&frame)
            }
        };
        for out in replies {
            if framed.send(out).await.is_err() {
                return;
            }
        }
    }
}
