use thiserror::Error;

use crate::types::SubscriptionId;

/// 平台 IMS 注册调用返回的错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegError {
    /// IMS 服务暂未就绪，可稍后重试
    #[error("IMS service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Invalid subscription: {0}")]
    InvalidSubscription(SubscriptionId),

    #[error("IMS error: {0}")]
    Unspecified(String),
}

impl RegError {
    /// 是否为暂时性错误
    pub fn is_transient(&self) -> bool {
        matches!(self, RegError::ServiceUnavailable(_))
    }
}

/// 平台订阅服务相关错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// 订阅服务尚未就绪，管理器稍后重新读取
    #[error("Subscription service not available")]
    SubscriptionServiceUnavailable,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing required field: {0}")]
    Missing(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// 绑定操作的Result类型别名
pub type BindResult<T> = Result<T, BindError>;

/// 回调绑定失败类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    /// IMS 服务暂时不可用，已安排重试
    #[error("IMS service temporarily unavailable for sub {subscription}: {source}")]
    ServiceTransientlyUnavailable {
        subscription: SubscriptionId,
        #[source]
        source: RegError,
    },

    /// 非预期失败，不重试，等待下一次外部触发
    #[error("Unexpected IMS failure for sub {subscription}: {source}")]
    ServiceUnexpectedFailure {
        subscription: SubscriptionId,
        #[source]
        source: RegError,
    },

    /// 在仍有绑定时尝试再次绑定（不变式被破坏）
    #[error("Duplicate binding attempt: sub {target} while sub {bound} is bound")]
    DuplicateBindingAttempt {
        bound: SubscriptionId,
        target: SubscriptionId,
    },
}

impl BindError {
    /// 根据平台错误分类
    pub fn from_registration(subscription: SubscriptionId, source: RegError) -> Self {
        if source.is_transient() {
            BindError::ServiceTransientlyUnavailable {
                subscription,
                source,
            }
        } else {
            BindError::ServiceUnexpectedFailure {
                subscription,
                source,
            }
        }
    }

    /// 判断错误是否可恢复（用于重试逻辑）
    pub fn is_recoverable(&self) -> bool {
        match self {
            BindError::ServiceTransientlyUnavailable { .. } => true,
            BindError::ServiceUnexpectedFailure { .. } => false,
            BindError::DuplicateBindingAttempt { .. } => false,
        }
    }

    /// 获取标准错误代码，用于日志分析和监控
    pub fn error_code(&self) -> &'static str {
        match self {
            BindError::ServiceTransientlyUnavailable { .. } => "SERVICE_TRANSIENTLY_UNAVAILABLE",
            BindError::ServiceUnexpectedFailure { .. } => "SERVICE_UNEXPECTED_FAILURE",
            BindError::DuplicateBindingAttempt { .. } => "DUPLICATE_BINDING_ATTEMPT",
        }
    }

    pub fn subscription(&self) -> SubscriptionId {
        match self {
            BindError::ServiceTransientlyUnavailable { subscription, .. } => *subscription,
            BindError::ServiceUnexpectedFailure { subscription, .. } => *subscription,
            BindError::DuplicateBindingAttempt { target, .. } => *target,
        }
    }
}
