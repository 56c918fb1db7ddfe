//! Pipeline error types with stable, cross-process error codes.
//!
//! Every failure that reaches a caller is one [`RpcError`] variant. The code
//! string travels with the response so both sides can correlate logs.

use crate::domain::invocation::Invocation;
use std::net::SocketAddr;

/// Stable error codes carried in error responses
pub mod codes {
    // Common (1xxxxx)
    pub const COMMON_VALUE_ILLEGAL: &str = "100001";
    pub const COMMON_CALL_TIMEOUT: &str = "100002";

    // Consumer side (12xxxx)
    pub const CONSUMER_NO_ALIVE_PROVIDER: &str = "120001";
    pub const CONSUMER_TIMEOUT: &str = "120002";

    // Provider side (13xxxx)
    pub const PROVIDER_TASK_FAIL: &str = "130001";
    pub const PROVIDER_TASK_SESSION_EXPIRED: &str = "130002";
    pub const PROVIDER_CLASS_NOT_FOUND: &str = "130003";
    pub const PROVIDER_NO_SUCH_METHOD: &str = "130004";
    pub const PROVIDER_METHOD_OVERLOAD: &str = "130005";
    pub const PROVIDER_EXPORTER_NOT_FOUND: &str = "130006";
    pub const PROVIDER_DISCARD_TIMEOUT_MESSAGE: &str = "130007";
    pub const PROVIDER_RATE_LIMITED: &str = "130008";
    pub const PROVIDER_OVERLOADED: &str = "130009";
    pub const PROVIDER_APPLICATION_ERROR: &str = "130010";
}

/// Typed pipeline failure.
///
/// Messages are preformatted so the error can be cloned into responses and
/// logs without holding on to the request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RpcError {
    /// Session evicted before the request could be restored
    #[error("{0}")]
    SessionExpired(String),

    /// Interface class (or legacy interface id) unknown to this process
    #[error("{0}")]
    ClassNotFound(String),

    /// Interface has no public method with the requested name
    #[error("{0}")]
    NoSuchMethod(String),

    /// Method name resolves to several overloads
    #[error("{0}")]
    MethodOverload(String),

    /// Service is not exported here; the peer should close the connection
    #[error("{0}")]
    Shutdown(String),

    /// Caller supplied an illegal value (e.g. missing routing attachment)
    #[error("{0}")]
    IllegalValue(String),

    /// No candidate node can serve the call
    #[error("{0}")]
    NoAliveProvider(String),

    /// A rate limiter refused the call
    #[error("{0}")]
    RateLimited(String),

    /// Concurrency cap reached for the service
    #[error("{0}")]
    Overloaded(String),

    /// Call did not finish within its deadline
    #[error("{0}")]
    Timeout(String),

    /// Exception raised by the service implementation itself
    #[error("{message}")]
    Application { code: String, message: String },

    /// Any other failure while processing the task
    #[error("{0}")]
    TaskFailed(String),
}

impl RpcError {
    /// Stable error code for cross-process diagnosis
    pub fn code(&self) -> &str {
        match self {
            RpcError::SessionExpired(_) => codes::PROVIDER_TASK_SESSION_EXPIRED,
            RpcError::ClassNotFound(_) => codes::PROVIDER_CLASS_NOT_FOUND,
            RpcError::NoSuchMethod(_) => codes::PROVIDER_NO_SUCH_METHOD,
            RpcError::MethodOverload(_) => codes::PROVIDER_METHOD_OVERLOAD,
            RpcError::Shutdown(_) => codes::PROVIDER_EXPORTER_NOT_FOUND,
            RpcError::IllegalValue(_) => codes::COMMON_VALUE_ILLEGAL,
            RpcError::NoAliveProvider(_) => codes::CONSUMER_NO_ALIVE_PROVIDER,
            RpcError::RateLimited(_) => codes::PROVIDER_RATE_LIMITED,
            RpcError::Overloaded(_) => codes::PROVIDER_OVERLOADED,
            RpcError::Timeout(_) => codes::COMMON_CALL_TIMEOUT,
            RpcError::Application { code, .. } => code,
            RpcError::TaskFailed(_) => codes::PROVIDER_TASK_FAIL,
        }
    }

    /// Business exception raised by a method implementation
    pub fn application(message: impl Into<String>) -> Self {
        RpcError::Application {
            code: codes::PROVIDER_APPLICATION_ERROR.to_string(),
            message: message.into(),
        }
    }

    /// Shutdown-class errors tell the peer to close the connection
    pub fn is_shutdown(&self) -> bool {
        matches!(self, RpcError::Shutdown(_))
    }

    /// Whether a caller may reasonably retry against another node
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RpcError::NoAliveProvider(_)
                | RpcError::Shutdown(_)
                | RpcError::Overloaded(_)
                | RpcError::Timeout(_)
        )
    }

    /// Same variant, message replaced by the formatted channel diagnostic.
    pub fn with_message(self, message: String) -> Self {
        match self {
            RpcError::SessionExpired(_) => RpcError::SessionExpired(message),
            RpcError::ClassNotFound(_) => RpcError::ClassNotFound(message),
            RpcError::NoSuchMethod(_) => RpcError::NoSuchMethod(message),
            RpcError::MethodOverload(_) => RpcError::MethodOverload(message),
            RpcError::Shutdown(_) => RpcError::Shutdown(message),
            RpcError::IllegalValue(_) => RpcError::IllegalValue(message),
            RpcError::NoAliveProvider(_) => RpcError::NoAliveProvider(message),
            RpcError::RateLimited(_) => RpcError::RateLimited(message),
            RpcError::Overloaded(_) => RpcError::Overloaded(message),
            RpcError::Timeout(_) => RpcError::Timeout(message),
            RpcError::Application { code, .. } => RpcError::Application { code, message },
            RpcError::TaskFailed(_) => RpcError::TaskFailed(message),
        }
    }
}

/// Result type for pipeline operations
pub type RpcResult<T> = Result<T, RpcError>;

/// Build the diagnostic message embedded in provider-side error responses.
pub fn format_error(
    code: &str,
    invocation: &Invocation,
    remote: SocketAddr,
    local: SocketAddr,
    cause: &str,
) -> String {
    format!(
        "[{}]Error occurs while processing request {}/{}/{} from channel {}->{}, caused by: {}",
        code,
        invocation.class_name,
        invocation.method_name,
        invocation.alias,
        remote,
        local,
        cause
    )
}

/// Transport-level send failure
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChannelError {
    #[error("channel closed")]
    Closed,
    #[error("send failed: {0}")]
    SendFailed(String),
}
