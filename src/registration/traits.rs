/// 平台协作者 trait 定义
///
/// 订阅服务、IMS 注册、IMS 能力以及 Presence 发布均通过 trait 注入，
/// 便于在测试中用内存实现替换
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use super::message::ControlMessage;
use crate::error::{PlatformError, RegError};
use crate::types::{
    ImsReasonInfo, MmTelCapabilities, PublishState, RegistrationEvent, ResultCode,
    SubscriptionId, SubscriptionInfo, TransportType,
};

/// 活动订阅来源
pub trait ActiveSubscriptions: Send + Sync {
    /// 当前活动订阅列表（按平台给出的顺序）
    fn snapshot(&self) -> Result<Vec<SubscriptionInfo>, PlatformError>;

    /// 平台默认语音订阅，可能为 `SubscriptionId::INVALID`
    fn default_voice_id(&self) -> SubscriptionId;
}

/// IMS 注册状态回调的注册接口
#[async_trait]
pub trait ImsRegistration: Send + Sync {
    /// 注册注册状态回调
    ///
    /// 立即失败通过 `Err` 返回，之后的状态变化通过 `callback` 投递
    async fn register(&self, sub: SubscriptionId, callback: ImsCallback) -> Result<(), RegError>;

    /// 注销注册状态回调
    async fn unregister(&self, sub: SubscriptionId) -> Result<(), RegError>;
}

/// MmTel 能力回调的注册接口
#[async_trait]
pub trait ImsCapability: Send + Sync {
    async fn register(&self, sub: SubscriptionId, callback: ImsCallback) -> Result<(), RegError>;

    async fn unregister(&self, sub: SubscriptionId) -> Result<(), RegError>;

    /// 查询订阅的视频通话（VT）开关
    async fn is_vt_setting_enabled(&self, sub: SubscriptionId) -> Result<bool, RegError>;
}

/// Presence 发布协作者
///
/// 所有方法在控制任务上按到达顺序同步调用，移动数据变化除外
pub trait PresencePublication: Send + Sync {
    fn service_up(&self);

    fn service_down(&self);

    fn on_connected(&self);

    fn on_disconnected(&self);

    fn on_capability_changed(&self, transport: TransportType, capabilities: MmTelCapabilities);

    fn on_mobile_data_changed(&self, enabled: bool);

    fn on_vt_setting_changed(&self, enabled: bool);

    fn publish_state(&self) -> PublishState;

    /// 管理器关闭时调用
    fn finish(&self) {}
}

/// 移动数据开关
pub trait MobileDataSetting: Send + Sync {
    fn is_enabled(&self) -> bool;
}

/// Presence 订阅/查询协作者
pub trait PresenceSubscriber: Send + Sync {
    fn request_capability(&self, contacts: &[String]) -> ResultCode;

    fn request_availability(&self, contact: &str, no_throttle: bool) -> ResultCode;
}

/// 交给平台的回调句柄
///
/// 绑定到单个订阅的一次绑定；平台触发的事件被投递到管理器控制队列，
/// 因此回调可以在任意线程上调用。同一订阅重新绑定后，旧回调的事件按
/// `binding` 代号丢弃
#[derive(Debug, Clone)]
pub struct ImsCallback {
    subscription: SubscriptionId,
    binding: u64,
    tx: mpsc::UnboundedSender<ControlMessage>,
}

impl ImsCallback {
    pub(crate) fn new(
        subscription: SubscriptionId,
        binding: u64,
        tx: mpsc::UnboundedSender<ControlMessage>,
    ) -> Self {
        Self {
            subscription,
            binding,
            tx,
        }
    }

    pub fn subscription(&self) -> SubscriptionId {
        self.subscription
    }

    pub fn binding(&self) -> u64 {
        self.binding
    }

    pub fn on_registered(&self, transport: TransportType) {
        self.post(RegistrationEvent::Registered(transport));
    }

    pub fn on_unregistered(&self, reason: ImsReasonInfo) {
        self.post(RegistrationEvent::Unregistered(reason));
    }

    pub fn on_capabilities_status_changed(&self, capabilities: MmTelCapabilities) {
        self.post(RegistrationEvent::CapabilityChanged(capabilities));
    }

    fn post(&self, event: RegistrationEvent) {
        let message = ControlMessage::Ims {
            subscription: self.subscription,
            binding: self.binding,
            event,
        };
        if self.tx.send(message).is_err() {
            debug!("manager stopped, dropping IMS event for sub {}", self.subscription);
        }
    }
}
