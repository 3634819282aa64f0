//! Connection Configuration
//!
//! 채널 URL 파싱 및 연결 설정

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::error::{DriverError, DriverResult};
use crate::protocol::message::QueryOptions;
use crate::protocol::{DEFAULT_MAX_FRAME_SIZE, HEADER_SIZE};

/// 기본 포트
pub const DEFAULT_PORT: u16 = 8222;

/// 기본 클라이언트 ID
pub const DEFAULT_CLIENT_ID: &str = "tgdb-rust-client";

// ============================================================================
// ServerAddress - 서버 주소
// ============================================================================

/// 서버 주소
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerAddress {
    /// 호스트
    pub host: String,
    /// 포트
    pub port: u16,
}

impl ServerAddress {
    /// 새 서버 주소 생성
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// `host[:port]` 파싱
    pub fn parse(s: &str) -> DriverResult<Self> {
        let s = s.trim();
        let (host, port) = match s.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse()
                    .map_err(|_| DriverError::configuration(format!("Invalid port in '{}'", s)))?;
                (host, port)
            }
            None => (s, DEFAULT_PORT),
        };
        if host.is_empty() {
            return Err(DriverError::configuration(format!("Missing host in '{}'", s)));
        }
        Ok(Self::new(host, port))
    }

    /// 소켓 주소로 변환
    pub fn to_socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl Default for ServerAddress {
    fn default() -> Self {
        Self::new("localhost", DEFAULT_PORT)
    }
}

// ============================================================================
// ChannelUrl - 채널 URL
// ============================================================================

/// 전송 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    /// 평문 TCP
    #[default]
    Tcp,
    /// SSL/TLS
    Ssl,
}

/// Parsed `scheme://[user@]host:port[/{key=value;...}]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelUrl {
    pub transport: Transport,
    pub user: Option<String>,
    pub address: ServerAddress,
    pub properties: HashMap<String, String>,
}

impl ChannelUrl {
    /// URL 파싱
    pub fn parse(url: &str) -> DriverResult<Self> {
        let (scheme, rest) = url
            .trim()
            .split_once("://")
            .ok_or_else(|| DriverError::configuration(format!("Missing scheme in '{}'", url)))?;

        let transport = match scheme.to_ascii_lowercase().as_str() {
            "tcp" => Transport::Tcp,
            "ssl" => Transport::Ssl,
            other => {
                return Err(DriverError::configuration(format!(
                    "Unsupported scheme '{}'",
                    other
                )))
            }
        };

        let (authority, suffix) = match rest.split_once('/') {
            Some((authority, suffix)) => (authority, Some(suffix)),
            None => (rest, None),
        };

        let (user, host_port) = match authority.rsplit_once('@') {
            Some((user, host_port)) if !user.is_empty() => (Some(user.to_string()), host_port),
            Some((_, host_port)) => (None, host_port),
            None => (None, authority),
        };

        let properties = match suffix.map(str::trim) {
            None | Some("") => HashMap::new(),
            Some(suffix) => parse_properties(suffix)?,
        };

        Ok(Self {
            transport,
            user,
            address: ServerAddress::parse(host_port)?,
            properties,
        })
    }

    /// SSL 여부
    pub fn is_ssl(&self) -> bool {
        self.transport == Transport::Ssl
    }
}

impl FromStr for ChannelUrl {
    type Err = DriverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// `{key=value;key=value}` 파싱
fn parse_properties(suffix: &str) -> DriverResult<HashMap<String, String>> {
    let body = suffix
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .ok_or_else(|| {
            DriverError::configuration(format!("Property block must be braced: '{}'", suffix))
        })?;

    let mut properties = HashMap::new();
    for pair in body.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').ok_or_else(|| {
            DriverError::configuration(format!("Property '{}' has no value", pair))
        })?;
        properties.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(properties)
}

// ============================================================================
// ReservePolicy - 연결 획득 정책
// ============================================================================

/// How `ConnectionPool::get` behaves when every connection is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReservePolicy {
    /// 무한 대기
    #[default]
    WaitForever,
    /// 즉시 실패
    FailFast,
    /// 지정 시간까지 대기
    Wait(Duration),
}

impl ReservePolicy {
    /// `connectionReserveTimeoutSeconds` 값에서 변환
    pub fn from_seconds(seconds: i64) -> Self {
        match seconds {
            s if s < 0 => Self::WaitForever,
            0 => Self::FailFast,
            s => Self::Wait(Duration::from_secs(s as u64)),
        }
    }
}

// ============================================================================
// ConnectionConfig - 연결 설정
// ============================================================================

/// 연결 설정
#[derive(Clone)]
pub struct ConnectionConfig {
    /// 주 서버 URL
    pub url: ChannelUrl,
    /// 사용자
    pub user: Option<String>,
    /// 비밀번호
    pub password: String,
    /// 클라이언트 ID
    pub client_id: String,
    /// 응답 수신 주소
    pub inbox_addr: Option<String>,
    /// 데이터베이스 이름
    pub database: Option<String>,
    /// 테넌트 ID
    pub tenant_id: i32,
    /// 풀 크기
    pub pool_size: usize,
    /// 연결마다 전용 채널 사용
    pub dedicated_channel: bool,
    /// 연결 획득 정책
    pub reserve_policy: ReservePolicy,
    /// 연결 타임아웃
    pub connect_timeout: Duration,
    /// 요청 타임아웃 (None = 무제한)
    pub operation_timeout: Option<Duration>,
    /// Ping 주기 (None = 비활성)
    pub ping_interval: Option<Duration>,
    /// 장애 대비 호스트
    pub fault_tolerant_hosts: Vec<ServerAddress>,
    /// 쿼리 기본 옵션
    pub query_options: QueryOptions,
    /// 최대 프레임 크기
    pub max_frame_size: usize,
    /// 인식하지 못한 속성
    pub properties: HashMap<String, String>,
}

impl ConnectionConfig {
    /// URL로 설정 생성
    pub fn new(url: &str) -> DriverResult<Self> {
        let url = ChannelUrl::parse(url)?;
        let mut config = Self {
            user: url.user.clone(),
            password: String::new(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            inbox_addr: None,
            database: None,
            tenant_id: 0,
            pool_size: 10,
            dedicated_channel: false,
            reserve_policy: ReservePolicy::WaitForever,
            connect_timeout: Duration::from_secs(10),
            operation_timeout: Some(Duration::from_secs(120)),
            ping_interval: Some(Duration::from_secs(30)),
            fault_tolerant_hosts: Vec::new(),
            query_options: QueryOptions::default(),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            properties: HashMap::new(),
            url,
        };

        let properties = config.url.properties.clone();
        for (key, value) in &properties {
            config.apply_property(key, value)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// 빌더 시작
    pub fn builder(url: &str) -> DriverResult<ConnectionConfigBuilder> {
        Ok(ConnectionConfigBuilder {
            config: Self::new(url)?,
        })
    }

    /// 주 호스트 다음 장애 대비 호스트 순서
    pub fn hosts(&self) -> impl Iterator<Item = &ServerAddress> {
        std::iter::once(&self.url.address).chain(self.fault_tolerant_hosts.iter())
    }

    fn apply_property(&mut self, key: &str, value: &str) -> DriverResult<()> {
        match key {
            "userID" => self.user = Some(value.to_string()),
            "password" => self.password = value.to_string(),
            "clientId" => self.client_id = value.to_string(),
            "inboxAddr" => self.inbox_addr = Some(value.to_string()),
            "dbName" => self.database = Some(value.to_string()),
            "tenantId" => self.tenant_id = parse_value(key, value)?,
            "connectionPoolSize" => self.pool_size = parse_value(key, value)?,
            "connectionPoolUseDedicatedChannelPerConnection" => {
                self.dedicated_channel = parse_value(key, value)?
            }
            "connectionReserveTimeoutSeconds" => {
                self.reserve_policy = ReservePolicy::from_seconds(parse_value(key, value)?)
            }
            "channelConnectTimeout" => {
                self.connect_timeout = Duration::from_millis(parse_value(key, value)?)
            }
            "connectionOperationTimeoutSeconds" => {
                let secs: i64 = parse_value(key, value)?;
                self.operation_timeout = (secs >= 0).then(|| Duration::from_secs(secs as u64));
            }
            "channelPingInterval" => {
                let secs: i64 = parse_value(key, value)?;
                self.ping_interval = (secs > 0).then(|| Duration::from_secs(secs as u64));
            }
            "ftHosts" => {
                self.fault_tolerant_hosts = value
                    .split(',')
                    .map(str::trim)
                    .filter(|h| !h.is_empty())
                    .map(ServerAddress::parse)
                    .collect::<DriverResult<_>>()?
            }
            "fetchSize" => self.query_options.fetch_size = parse_value(key, value)?,
            "batchSize" => self.query_options.batch_size = parse_value(key, value)?,
            "traversalDepth" => self.query_options.traversal_depth = parse_value(key, value)?,
            "edgeLimit" => self.query_options.edge_limit = parse_value(key, value)?,
            "maxFrameSize" => self.max_frame_size = parse_value(key, value)?,
            _ => {
                self.properties.insert(key.to_string(), value.to_string());
            }
        }
        Ok(())
    }

    fn validate(&self) -> DriverResult<()> {
        if self.pool_size == 0 {
            return Err(DriverError::configuration("connectionPoolSize must be positive"));
        }
        if self.max_frame_size < HEADER_SIZE {
            return Err(DriverError::configuration(format!(
                "maxFrameSize must be at least {}",
                HEADER_SIZE
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("client_id", &self.client_id)
            .field("database", &self.database)
            .field("pool_size", &self.pool_size)
            .field("dedicated_channel", &self.dedicated_channel)
            .field("reserve_policy", &self.reserve_policy)
            .field("operation_timeout", &self.operation_timeout)
            .finish_non_exhaustive()
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> DriverResult<T> {
    value
        .parse()
        .map_err(|_| DriverError::configuration(format!("Invalid value '{}' for {}", value, key)))
}

// ============================================================================
// ConnectionConfigBuilder - 설정 빌더
// ============================================================================

/// 연결 설정 빌더
pub struct ConnectionConfigBuilder {
    config: ConnectionConfig,
}

impl ConnectionConfigBuilder {
    /// 사용자/비밀번호 설정
    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.user = Some(user.into());
        self.config.password = password.into();
        self
    }

    /// 클라이언트 ID 설정
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.config.client_id = client_id.into();
        self
    }

    /// 데이터베이스 설정
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.config.database = Some(database.into());
        self
    }

    /// 테넌트 ID 설정
    pub fn with_tenant_id(mut self, tenant_id: i32) -> Self {
        self.config.tenant_id = tenant_id;
        self
    }

    /// 풀 크기 설정
    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.config.pool_size = size;
        self
    }

    /// 전용 채널 설정
    pub fn with_dedicated_channel(mut self, dedicated: bool) -> Self {
        self.config.dedicated_channel = dedicated;
        self
    }

    /// 연결 획득 정책 설정
    pub fn with_reserve_policy(mut self, policy: ReservePolicy) -> Self {
        self.config.reserve_policy = policy;
        self
    }

    /// 연결 타임아웃 설정
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// 요청 타임아웃 설정
    pub fn with_operation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.operation_timeout = timeout;
        self
    }

    /// Ping 주기 설정
    pub fn with_ping_interval(mut self, interval: Option<Duration>) -> Self {
        self.config.ping_interval = interval;
        self
    }

    /// 장애 대비 호스트 추가
    pub fn with_fault_tolerant_host(mut self, address: ServerAddress) -> Self {
        self.config.fault_tolerant_hosts.push(address);
        self
    }

    /// 쿼리 옵션 설정
    pub fn with_query_options(mut self, options: QueryOptions) -> Self {
        self.config.query_options = options;
        self
    }

    /// Fetch Size 설정
    pub fn with_fetch_size(mut self, size: i32) -> Self {
        self.config.query_options.fetch_size = size;
        self
    }

    /// 최대 프레임 크기 설정
    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.config.max_frame_size = size;
        self
    }

    /// 빌드
    pub fn build(self) -> DriverResult<ConnectionConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// ============================================================================
// Tests
// ============================================================================
