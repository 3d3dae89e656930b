/// RCS 服务门面
///
/// 对客户端暴露服务可用性、发布状态以及 Presence 查询的透传
use std::sync::Arc;

use tracing::{debug, error};

use crate::manager::{ManagerError, ManagerHandle};
use crate::registration::PresenceSubscriber;
use crate::types::{PublishState, ResultCode};

pub struct RcsService {
    manager: ManagerHandle,
    subscriber: Option<Arc<dyn PresenceSubscriber>>,
}

impl RcsService {
    pub fn new(manager: ManagerHandle, subscriber: Option<Arc<dyn PresenceSubscriber>>) -> Self {
        Self { manager, subscriber }
    }

    pub fn manager(&self) -> &ManagerHandle {
        &self.manager
    }

    /// 服务是否可用（已绑定到某个订阅的 IMS 注册）
    pub fn is_rcs_service_available(&self) -> bool {
        debug!("calling isRcsServiceAvailable");
        self.manager.is_service_available()
    }

    pub fn publish_state(&self) -> PublishState {
        self.manager.publish_state()
    }

    /// 异步请求一组联系人的最新能力
    pub fn request_capability(&self, contacts: &[String]) -> ResultCode {
        debug!("calling requestCapability");
        match &self.subscriber {
            Some(subscriber) => subscriber.request_capability(contacts),
            None => {
                debug!("requestCapability, presence subscriber not available");
                ResultCode::ErrorServiceNotAvailable
            }
        }
    }

    /// 请求联系人可用性，受节流限制
    pub fn request_availability(&self, contact: &str) -> ResultCode {
        self.availability(contact, false)
    }

    /// 同 `request_availability`，但总是发送到网络
    pub fn request_availability_no_throttle(&self, contact: &str) -> ResultCode {
        self.availability(contact, true)
    }

    fn availability(&self, contact: &str, no_throttle: bool) -> ResultCode {
        match &self.subscriber {
            Some(subscriber) => subscriber.request_availability(contact, no_throttle),
            None => {
                error!("requestAvailability, presence subscriber is null");
                ResultCode::ErrorServiceNotAvailable
            }
        }
    }

    pub async fn shutdown(self) -> Result<(), ManagerError> {
        self.manager.shutdown().await
    }
}
