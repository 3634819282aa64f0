//! Channel
//!
//! 서버와의 단일 TCP 채널. 여러 호출자가 하나의 소켓을 공유하며,
//! 요청 ID로 응답을 매칭한다.
//!
//! ## Layout
//!
//! ```text
//!  caller ──► send_request ──► [channel lock] ──► FrameSink ──► socket
//!     ▲                                                           │
//!     └── oneshot ◄── pending table ◄── read task ◄── FrameSource ◄┘
//! ```
//!
//! Every request registers a oneshot slot under a fresh request id before
//! its frame is written. The read task is the only consumer of the socket;
//! it routes each frame by the request id in its header and drops the table
//! entry. A caller that times out removes its own entry.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tracing::{debug, error, info, warn};

use super::config::{ConnectionConfig, ServerAddress};
use super::error::{DriverError, DriverResult};
use crate::protocol::message::{
    AuthenticateRequest, AuthenticateResponse, DisconnectChannelRequest, ExceptionMessage,
    HandShakeRequest, HandShakeResponse, HandshakeStatus, PingMessage,
    SessionForcefullyTerminated,
};
use crate::protocol::{next_request_id, Frame, FrameCodec, MessageHeader, Request, Response, VerbId};

type FramedSocket = Framed<TcpStream, FrameCodec>;
type FrameSink = SplitSink<FramedSocket, Frame>;
type FrameSource = SplitStream<FramedSocket>;
type ResponseSlot = oneshot::Sender<DriverResult<Frame>>;

// ============================================================================
// LinkState - 채널 상태
// ============================================================================

/// 채널 연결 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// 연결 전
    NotConnected,
    /// 연결됨
    Connected,
    /// 종료 중
    Closing,
    /// 종료됨
    Closed,
    /// 전송 실패
    FailedOnSend,
    /// 수신 실패
    FailedOnRecv,
}

impl LinkState {
    /// 더 이상 요청을 보낼 수 없는 상태
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Connected)
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Credentials stamped into every header after authentication.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionInfo {
    pub auth_token: i64,
    pub session_id: i64,
    pub tenant_id: i32,
}

// ============================================================================
// Shared state between callers and the read task
// ============================================================================

struct LinkShared {
    state: RwLock<LinkState>,
    pending: Mutex<HashMap<i64, ResponseSlot>>,
}

impl LinkShared {
    fn new() -> Self {
        Self {
            state: RwLock::new(LinkState::Connected),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Add a response slot. The state is read under the pending lock, so a
    /// slot is either rejected here or drained by a later `fail_all`.
    fn register(&self, request_id: i64, slot: ResponseSlot) -> DriverResult<()> {
        let mut pending = self.pending.lock();
        let state = *self.state.read();
        if state != LinkState::Connected {
            return Err(DriverError::connection(format!(
                "Channel is {}; request {} not sent",
                state, request_id
            )));
        }
        pending.insert(request_id, slot);
        Ok(())
    }

    fn take(&self, request_id: i64) -> Option<ResponseSlot> {
        self.pending.lock().remove(&request_id)
    }

    /// Move to `state` and fail every outstanding request.
    fn fail_all(&self, state: LinkState, reason: &str) {
        {
            let mut current = self.state.write();
            if *current != LinkState::Closed {
                *current = state;
            }
        }
        let slots: Vec<ResponseSlot> = self.pending.lock().drain().map(|(_, slot)| slot).collect();
        if !slots.is_empty() {
            debug!("Failing {} outstanding request(s): {}", slots.len(), reason);
        }
        for slot in slots {
            let _ = slot.send(Err(DriverError::connection(reason)));
        }
    }
}

// ============================================================================
// Channel - 채널
// ============================================================================

/// Authenticated connection to one server, shared by many callers.
pub struct Channel {
    address: ServerAddress,
    session: SessionInfo,
    operation_timeout: Option<Duration>,
    /// 채널 락: 프레임 단위 전송 보장
    writer: AsyncMutex<Option<FrameSink>>,
    shared: Arc<LinkShared>,
    reader: Mutex<Option<JoinHandle<()>>>,
    pinger: Mutex<Option<JoinHandle<()>>>,
}

impl Channel {
    /// Connect to the primary host, then each fault-tolerant host in order.
    pub async fn connect(config: &ConnectionConfig) -> DriverResult<Arc<Self>> {
        if config.url.is_ssl() {
            return Err(DriverError::configuration(
                "SSL transport is not supported by this client",
            ));
        }

        let mut last_error = None;
        for address in config.hosts() {
            match Self::open(address, config).await {
                Ok(channel) => return Ok(channel),
                Err(e) => {
                    warn!("Connect to {} failed: {}", address, e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| DriverError::connection("No host to connect to")))
    }

    async fn open(address: &ServerAddress, config: &ConnectionConfig) -> DriverResult<Arc<Self>> {
        let stream = tokio::time::timeout(
            config.connect_timeout,
            TcpStream::connect(address.to_socket_addr()),
        )
        .await
        .map_err(|_| DriverError::timeout(format!("Connect to {} timed out", address)))?
        .map_err(|e| DriverError::connection(format!("Failed to connect to {}: {}", address, e)))?;
        stream.set_nodelay(true).ok();

        let mut framed = Framed::new(stream, FrameCodec::with_max_size(config.max_frame_size));
        handshake(&mut framed).await?;
        let session = authenticate(&mut framed, config).await?;
        info!(
            "Channel connected to {} (session {})",
            address, session.session_id
        );

        let (sink, source) = framed.split();
        let shared = Arc::new(LinkShared::new());
        let reader = tokio::spawn(read_loop(source, shared.clone()));

        let channel = Arc::new(Self {
            address: address.clone(),
            session,
            operation_timeout: config.operation_timeout,
            writer: AsyncMutex::new(Some(sink)),
            shared,
            reader: Mutex::new(Some(reader)),
            pinger: Mutex::new(None),
        });

        if let Some(interval) = config.ping_interval {
            channel.enable_ping(interval);
        }
        Ok(channel)
    }

    /// 서버 주소
    pub fn address(&self) -> &ServerAddress {
        &self.address
    }

    /// 세션 정보
    pub fn session(&self) -> SessionInfo {
        self.session
    }

    /// 현재 상태
    pub fn state(&self) -> LinkState {
        *self.shared.state.read()
    }

    /// 연결 여부
    pub fn is_connected(&self) -> bool {
        self.state() == LinkState::Connected
    }

    /// Requests still waiting for a response.
    pub fn pending_requests(&self) -> usize {
        self.shared.pending.lock().len()
    }

    fn header(&self, verb: VerbId, request_id: i64) -> MessageHeader {
        MessageHeader::new(verb, request_id).with_session(
            self.session.auth_token,
            self.session.session_id,
            self.session.tenant_id,
        )
    }

    fn ensure_connected(&self) -> DriverResult<()> {
        match self.state() {
            LinkState::Connected => Ok(()),
            state => Err(DriverError::connection(format!(
                "Channel to {} is {}",
                self.address, state
            ))),
        }
    }

    /// Send a request and wait for its response under the operation timeout.
    pub async fn send_request<Req, Resp>(&self, request: &Req) -> DriverResult<Resp>
    where
        Req: Request,
        Resp: Response,
    {
        self.send_request_with_timeout(request, self.operation_timeout)
            .await
    }

    /// [`send_request`](Self::send_request) with an explicit timeout.
    pub async fn send_request_with_timeout<Req, Resp>(
        &self,
        request: &Req,
        timeout: Option<Duration>,
    ) -> DriverResult<Resp>
    where
        Req: Request,
        Resp: Response,
    {
        self.ensure_connected()?;

        let request_id = next_request_id();
        let frame = request.to_frame(self.header(Req::VERB, request_id))?;
        let (tx, rx) = oneshot::channel();
        self.shared.register(request_id, tx)?;

        if let Err(e) = self.write_frame(frame).await {
            self.shared.take(request_id);
            return Err(e);
        }

        let delivered = match timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(delivered) => delivered,
                Err(_) => {
                    self.shared.take(request_id);
                    return Err(DriverError::timeout(format!(
                        "No response to {} (request {}) within {:?}",
                        Req::VERB,
                        request_id,
                        limit
                    )));
                }
            },
            None => rx.await,
        };

        let frame = delivered
            .map_err(|_| DriverError::connection("Channel closed before the response arrived"))??;
        Ok(Resp::from_frame(&frame)?)
    }

    /// Fire-and-forget send.
    pub async fn send_message<Req: Request>(&self, request: &Req) -> DriverResult<()> {
        self.ensure_connected()?;
        let frame = request.to_frame(self.header(Req::VERB, next_request_id()))?;
        self.write_frame(frame).await
    }

    async fn write_frame(&self, frame: Frame) -> DriverResult<()> {
        let mut writer = self.writer.lock().await;
        let sink = writer
            .as_mut()
            .ok_or_else(|| DriverError::connection("Channel is closed"))?;

        if let Err(e) = sink.send(frame).await {
            error!("Send to {} failed: {}", self.address, e);
            let err = DriverError::from(e);
            if matches!(err, DriverError::Connection(_)) {
                self.shared.fail_all(LinkState::FailedOnSend, "send failed");
            }
            return Err(err);
        }
        Ok(())
    }

    // ========================================================================
    // Ping
    // ========================================================================

    /// Start the keepalive task, replacing a running one.
    pub fn enable_ping(self: &Arc<Self>, interval: Duration) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let Some(channel) = weak.upgrade() else { break };
                if let Err(e) = channel.send_message(&PingMessage).await {
                    debug!("Ping stopped: {}", e);
                    break;
                }
            }
        });
        if let Some(previous) = self.pinger.lock().replace(task) {
            previous.abort();
        }
    }

    /// Stop the keepalive task.
    pub fn disable_ping(&self) {
        if let Some(task) = self.pinger.lock().take() {
            task.abort();
        }
    }

    /// Ping 활성 여부
    pub fn is_ping_enabled(&self) -> bool {
        self.pinger.lock().is_some()
    }

    // ========================================================================
    // Disconnect
    // ========================================================================

    /// Close the channel. Outstanding requests fail with a connection error.
    pub async fn disconnect(&self) {
        {
            let mut state = self.shared.state.write();
            if matches!(*state, LinkState::Closed | LinkState::Closing) {
                return;
            }
            *state = LinkState::Closing;
        }
        self.disable_ping();

        let sink = self.writer.lock().await.take();
        if let Some(mut sink) = sink {
            if let Ok(frame) =
                DisconnectChannelRequest.to_frame(self.header(VerbId::DisconnectChannelRequest, next_request_id()))
            {
                let _ = sink.send(frame).await;
            }
            let _ = sink.close().await;
        }

        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }
        self.shared.fail_all(LinkState::Closed, "channel disconnected");
        *self.shared.state.write() = LinkState::Closed;
        info!("Channel to {} disconnected", self.address);
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        if let Some(task) = self.pinger.get_mut().take() {
            task.abort();
        }
        if let Some(task) = self.reader.get_mut().take() {
            task.abort();
        }
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("address", &self.address)
            .field("state", &self.state())
            .field("session_id", &self.session.session_id)
            .field("pending", &self.pending_requests())
            .finish()
    }
}

// ============================================================================
// Connect-time exchanges (before the read task exists)
// ============================================================================

async fn exchange<Req, Resp>(framed: &mut FramedSocket, request: &Req) -> DriverResult<Resp>
where
    Req: Request,
    Resp: Response,
{
    let frame = request.to_frame(MessageHeader::new(Req::VERB, next_request_id()))?;
    framed.send(frame).await?;

    let reply = framed
        .next()
        .await
        .ok_or_else(|| DriverError::connection("Server closed the connection during connect"))??;

    if reply.header.verb == VerbId::Exception {
        let exception = ExceptionMessage::from_frame(&reply)?;
        return Err(DriverError::server(
            exception.code,
            exception.message.unwrap_or_default(),
        ));
    }
    Ok(Resp::from_frame(&reply)?)
}

async fn handshake(framed: &mut FramedSocket) -> DriverResult<()> {
    let mut response: HandShakeResponse = exchange(framed, &HandShakeRequest::initiate(false)).await?;

    if response.status == HandshakeStatus::AcceptChallenge {
        response = exchange(framed, &HandShakeRequest::accept(false, response.challenge)).await?;
    }

    match response.status {
        HandshakeStatus::ProceedWithAuthentication => {
            debug!("Handshake complete");
            Ok(())
        }
        HandshakeStatus::ChallengeFailed => Err(DriverError::connection(format!(
            "Handshake challenge failed: {}",
            response.error_message.unwrap_or_default()
        ))),
        status => Err(DriverError::connection(format!(
            "Unexpected handshake status {:?}",
            status
        ))),
    }
}

async fn authenticate(
    framed: &mut FramedSocket,
    config: &ConnectionConfig,
) -> DriverResult<SessionInfo> {
    let request = AuthenticateRequest {
        client_id: Some(config.client_id.clone()),
        inbox_addr: config.inbox_addr.clone(),
        user: config.user.clone(),
        password: config.password.as_bytes().to_vec(),
    };
    let response: AuthenticateResponse = exchange(framed, &request).await?;

    if !response.success {
        let status = response.error_status.unwrap_or_default();
        warn!("Authentication rejected (status {})", status);
        return Err(DriverError::authentication(format!(
            "Server rejected credentials for {:?} (status {})",
            config.user.as_deref().unwrap_or(""),
            status
        )));
    }

    debug!("Authenticated, session {}", response.session_id);
    Ok(SessionInfo {
        auth_token: response.auth_token,
        session_id: response.session_id,
        tenant_id: config.tenant_id,
    })
}

// ============================================================================
// Read task
// ============================================================================

async fn read_loop(mut source: FrameSource, shared: Arc<LinkShared>) {
    loop {
        match source.next().await {
            Some(Ok(frame)) => {
                if !dispatch(&shared, frame) {
                    break;
                }
            }
            Some(Err(e)) => {
                error!("Receive failed: {}", e);
                shared.fail_all(LinkState::FailedOnRecv, &format!("receive failed: {}", e));
                break;
            }
            None => {
                info!("Server closed the channel");
                shared.fail_all(LinkState::Closed, "server closed the channel");
                break;
            }
        }
    }
}

/// Route one frame. Returns false when the channel is finished.
fn dispatch(shared: &LinkShared, frame: Frame) -> bool {
    let request_id = frame.header.request_id;
    match frame.header.verb {
        VerbId::Ping => true,
        VerbId::SessionForcefullyTerminated => {
            let reason = SessionForcefullyTerminated::from_frame(&frame)
                .map(|m| m.message)
                .unwrap_or_else(|_| "session terminated".to_string());
            warn!("Session forcefully terminated: {}", reason);
            shared.fail_all(LinkState::Closed, &reason);
            false
        }
        VerbId::DisconnectChannelRequest => {
            info!("Server requested disconnect");
            shared.fail_all(LinkState::Closed, "server requested disconnect");
            false
        }
        VerbId::Exception => {
            let exception = match ExceptionMessage::from_frame(&frame) {
                Ok(exception) => exception,
                Err(e) => {
                    warn!("Unreadable exception frame: {}", e);
                    return true;
                }
            };
            match shared.take(request_id) {
                Some(slot) => {
                    let _ = slot.send(Err(DriverError::server(
                        exception.code,
                        exception.message.unwrap_or_default(),
                    )));
                }
                None => warn!(
                    "Unsolicited exception {}: {}",
                    exception.code,
                    exception.message.unwrap_or_default()
                ),
            }
            true
        }
        verb => {
            match shared.take(request_id) {
                Some(slot) => {
                    let _ = slot.send(Ok(frame));
                }
                None => warn!("Dropping {} for unknown request {}", verb, request_id),
            }
            true
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
