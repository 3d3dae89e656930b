// 声明所有模块
pub mod config;
pub mod error;
pub mod manager;
pub mod registration;
pub mod service;
pub mod sim;
pub mod types;
pub mod utils;

/// 重新导出thiserror错误类型
pub use crate::error::{BindError, BindResult, ConfigError, PlatformError, RegError};
pub use crate::manager::ManagerError;

/// 主要API重新导出，简化使用
pub use crate::config::Config as ManagerConfig;
pub use crate::manager::{Collaborators, ManagerHandle, ManagerSnapshot, RegistrationManager};
pub use crate::registration::{BindingState, ImsCallback};
pub use crate::service::RcsService;
pub use crate::types::{
    ImsReasonInfo, MmTelCapabilities, PublishState, RegistrationEvent, ResultCode,
    SubscriptionId, SubscriptionInfo, TransportType,
};

/// 库的版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 便捷函数：使用默认配置启动管理器
pub fn start_manager(collaborators: Collaborators) -> Result<ManagerHandle, ManagerError> {
    RegistrationManager::start(ManagerConfig::default(), collaborators)
}
