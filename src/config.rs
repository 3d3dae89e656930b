/// 管理器配置
use std::time::Duration;

use crate::error::ConfigError;

/// IMS 服务暂不可用时的重试间隔
pub const IMS_SERVICE_RETRY_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Clone)]
pub struct Config {
    /// 重试延迟
    pub retry_delay: Duration,

    /// 控制任务名称（仅用于日志）
    pub name: String,
}

impl Config {
    pub fn new() -> Self {
        Self {
            retry_delay: Duration::from_millis(IMS_SERVICE_RETRY_TIMEOUT_MS),
            name: "ims-presence".to_string(),
        }
    }

    /// 设置重试延迟
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry_delay.is_zero() {
            return Err(ConfigError::Invalid("retry_delay must be non-zero".into()));
        }
        if self.name.trim().is_empty() {
            return Err(ConfigError::Missing("name".into()));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
