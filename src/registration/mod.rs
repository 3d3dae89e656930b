//! Registration 模块
//!
//! 把 IMS 回调绑定到当前默认语音订阅
//!
//! ## 组成
//!
//! - `resolver`: 计算目标订阅（纯函数）
//! - `binder`: 注册/注销两组回调，保证同一时刻至多一个绑定
//! - `retry`: IMS 或订阅服务暂不可用时的单槽位重试
//! - `router`: 把绑定产生的事件转发给 Presence 发布协作者
//! - `message`: 控制队列消息
//! - `traits`: 平台协作者接口
//!
//! ## 使用示例
//!
//! ```rust
//! use ims_presence::registration::resolve;
//! use ims_presence::{SubscriptionId, SubscriptionInfo};
//!
//! let active = vec![SubscriptionInfo::new(1, false), SubscriptionInfo::new(2, false)];
//! assert_eq!(resolve(&active, SubscriptionId::INVALID), SubscriptionId::new(1));
//! assert_eq!(resolve(&active, SubscriptionId::new(2)), SubscriptionId::new(2));
//! ```

mod binder;
mod message;
mod resolver;
mod retry;
mod router;
mod traits;

// 导出公共接口
pub use binder::{BindOutcome, BindingState, ManagerState, RegistrationBinder};
pub use message::{ControlMessage, RetryAction};
pub use resolver::resolve;
pub use retry::RetryScheduler;
pub use router::EventRouter;
pub use traits::{
    ActiveSubscriptions, ImsCallback, ImsCapability, ImsRegistration, MobileDataSetting,
    PresencePublication, PresenceSubscriber,
};
