/// 事件路由
///
/// 把已绑定订阅的原始事件翻译后按到达顺序转发给 Presence 发布协作者
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::binder::ManagerState;
use super::traits::PresencePublication;
use crate::types::{PublishState, RegistrationEvent, SubscriptionId, TransportType};

#[derive(Clone)]
pub struct EventRouter {
    publication: Arc<dyn PresencePublication>,
}

impl EventRouter {
    pub fn new(publication: Arc<dyn PresencePublication>) -> Self {
        Self { publication }
    }

    pub fn service_up(&self) {
        debug!("forwarding service up");
        self.publication.service_up();
    }

    pub fn service_down(&self) {
        debug!("forwarding service down");
        self.publication.service_down();
    }

    /// 路由一条来自 `subscription` 第 `binding` 次绑定的事件，返回是否已转发
    pub fn route(
        &self,
        state: &mut ManagerState,
        subscription: SubscriptionId,
        binding: u64,
        event: RegistrationEvent,
    ) -> bool {
        let bound = state.bound_subscription();
        if !bound.is_valid() {
            match event {
                RegistrationEvent::CapabilityChanged(capabilities) => warn!(
                    "capability change {} from sub {} with no bound subscription, dropped",
                    capabilities, subscription
                ),
                other => debug!("event {:?} from sub {} while unbound, dropped", other, subscription),
            }
            return false;
        }

        if subscription != bound {
            debug!("stale event from sub {} (bound {}), dropped", subscription, bound);
            return false;
        }

        // A→B→A 切换后旧回调迟到的事件
        if binding != state.binding_generation() {
            debug!(
                "event from earlier binding {} of sub {} (current {}), dropped",
                binding,
                subscription,
                state.binding_generation()
            );
            return false;
        }

        match event {
            RegistrationEvent::Registered(transport) => {
                debug!("onImsConnected imsTransportType={}", transport);
                state.set_network_transport_type(transport);
                self.publication.on_connected();
            }
            RegistrationEvent::Unregistered(reason) => {
                debug!("onImsDisconnected: {}", reason);
                state.set_network_transport_type(TransportType::Invalid);
                self.publication.on_disconnected();
            }
            RegistrationEvent::CapabilityChanged(capabilities) => {
                let transport = state.network_transport_type();
                debug!("capabilities {} on {}", capabilities, transport);
                self.publication.on_capability_changed(transport, capabilities);
            }
        }
        true
    }

    /// 在阻塞工作线程上转发移动数据开关，避免慢处理阻塞监听回调
    pub fn forward_mobile_data(&self, runtime: &Handle, enabled: bool) -> JoinHandle<()> {
        let publication = self.publication.clone();
        runtime.spawn(async move {
            let result =
                tokio::task::spawn_blocking(move || publication.on_mobile_data_changed(enabled))
                    .await;
            if let Err(e) = result {
                error!("Exception onMobileDataEnabled: {}", e);
            }
        })
    }

    pub fn forward_vt_setting(&self, enabled: bool) {
        debug!("vt enabled status: {}", if enabled { "ON" } else { "OFF" });
        self.publication.on_vt_setting_changed(enabled);
    }

    pub fn publish_state(&self) -> PublishState {
        self.publication.publish_state()
    }

    pub fn finish(&self) {
        self.publication.finish();
    }
}
