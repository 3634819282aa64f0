//! Driver Error Types
//!
//! 드라이버 에러 정의

use std::io;
use thiserror::Error;

use crate::protocol::message::tx_status;
use crate::protocol::ProtocolError;

// ============================================================================
// DriverError - 드라이버 에러
// ============================================================================

/// 드라이버 에러
#[derive(Error, Debug)]
pub enum DriverError {
    /// 연결 에러
    #[error("Connection error: {0}")]
    Connection(String),

    /// 인증 에러
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// 프로토콜 에러
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// 트랜잭션 에러
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// 버전 충돌 (optimistic lock)
    #[error("Version conflict: {0}")]
    VersionConflict(String),

    /// 타임아웃 에러
    #[error("Timeout: {0}")]
    Timeout(String),

    /// 풀 에러
    #[error("Pool error: {0}")]
    Pool(String),

    /// 설정 에러
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// 타입 변환 에러
    #[error("Type conversion error: {0}")]
    TypeConversion(String),

    /// 서버 에러
    #[error("Server error: {code} - {message}")]
    Server { code: i32, message: String },

    /// I/O 에러
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl DriverError {
    /// 연결 에러 생성
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// 인증 에러 생성
    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// 프로토콜 에러 생성
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// 트랜잭션 에러 생성
    pub fn transaction(msg: impl Into<String>) -> Self {
        Self::Transaction(msg.into())
    }

    /// 버전 충돌 에러 생성
    pub fn version_conflict(msg: impl Into<String>) -> Self {
        Self::VersionConflict(msg.into())
    }

    /// 타임아웃 에러 생성
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// 풀 에러 생성
    pub fn pool(msg: impl Into<String>) -> Self {
        Self::Pool(msg.into())
    }

    /// 설정 에러 생성
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// 타입 변환 에러 생성
    pub fn type_conversion(msg: impl Into<String>) -> Self {
        Self::TypeConversion(msg.into())
    }

    /// 서버 에러 생성
    pub fn server(code: i32, message: impl Into<String>) -> Self {
        Self::Server {
            code,
            message: message.into(),
        }
    }

    /// Map a non-zero commit status.
    pub fn from_commit_status(status: i32, message: Option<String>) -> Self {
        let message = message.unwrap_or_else(|| tx_status::describe(status).to_string());
        if status == tx_status::OPTIMISTIC_LOCK_FAILED {
            Self::VersionConflict(message)
        } else {
            Self::server(status, message)
        }
    }

    /// 재시도 가능 여부
    ///
    /// Informational only; the driver never retries on its own.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout(_) | Self::VersionConflict(_) => true,
            Self::Server { code, .. } => is_retryable_code(*code),
            _ => false,
        }
    }

    /// 클라이언트 에러 여부
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Authentication(_)
                | Self::Configuration(_)
                | Self::TypeConversion(_)
                | Self::Transaction(_)
        )
    }
}

/// 재시도 가능한 에러 코드 확인
fn is_retryable_code(code: i32) -> bool {
    matches!(
        code,
        tx_status::ALREADY_IN_PROGRESS | tx_status::RESOURCE_EXCEEDED
    )
}

impl From<ProtocolError> for DriverError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Io(_) | ProtocolError::UnexpectedEof { .. } => {
                DriverError::Connection(err.to_string())
            }
            _ => DriverError::Protocol(err.to_string()),
        }
    }
}

// ============================================================================
// Result Type
// ============================================================================

/// 드라이버 결과 타입
pub type DriverResult<T> = Result<T, DriverError>;

// ============================================================================
// Tests
// ============================================================================
