/// 订阅绑定管理器
///
/// 所有状态修改都在一个控制任务上按到达顺序执行；外部通知、平台回调和
/// 重试到期都投递到同一个队列
use std::sync::Arc;

use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{BindError, ConfigError};
use crate::registration::{
    resolve, ActiveSubscriptions, BindOutcome, BindingState, EventRouter, ImsCapability,
    ImsRegistration, ManagerState, MobileDataSetting, PresencePublication, RegistrationBinder,
    RetryAction, RetryScheduler,
};
use crate::types::{PublishState, SubscriptionId, TransportType};

pub use crate::registration::ControlMessage;

#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Manager must be started inside a tokio runtime")]
    NoRuntime,

    #[error("Manager already stopped")]
    Stopped,
}

/// 管理器依赖的平台协作者
#[derive(Clone)]
pub struct Collaborators {
    pub subscriptions: Arc<dyn ActiveSubscriptions>,
    pub registration: Arc<dyn ImsRegistration>,
    pub capability: Arc<dyn ImsCapability>,
    pub publication: Arc<dyn PresencePublication>,
    pub mobile_data: Arc<dyn MobileDataSetting>,
}

/// 对外可见的状态快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ManagerSnapshot {
    pub binding: BindingState,
    pub transport: TransportType,
}

pub struct RegistrationManager;

impl RegistrationManager {
    /// 启动控制任务
    ///
    /// 启动时读取一次移动数据开关并转发，然后根据平台当前订阅重新计算绑定
    pub fn start(config: Config, collaborators: Collaborators) -> Result<ManagerHandle, ManagerError> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| ManagerError::NoRuntime)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ManagerSnapshot::default());
        let cancel_token = CancellationToken::new();
        let router = EventRouter::new(collaborators.publication.clone());

        let control = ControlLoop {
            state: ManagerState::new(RetryScheduler::new(config.retry_delay, tx.clone())),
            binder: RegistrationBinder::new(
                collaborators.registration.clone(),
                collaborators.capability.clone(),
                tx.clone(),
            ),
            router: router.clone(),
            subscriptions: collaborators.subscriptions.clone(),
            capability: collaborators.capability.clone(),
            state_tx,
            evaluated: false,
        };

        info!("{} starting, retry delay {}ms", config.name, config.retry_delay.as_millis());
        let task = runtime.spawn(control.run(rx, cancel_token.clone()));

        let handle = ManagerHandle {
            tx,
            state_rx,
            router,
            runtime,
            cancel_token,
            task: Some(task),
        };

        let enabled = collaborators.mobile_data.is_enabled();
        debug!("Mobile data enabled status: {}", if enabled { "ON" } else { "OFF" });
        handle.mobile_data_changed(enabled);
        handle.subscriptions_changed();

        Ok(handle)
    }
}

/// 管理器句柄
///
/// 外部监听器通过它投递通知；丢弃句柄会取消控制任务并注销当前绑定
pub struct ManagerHandle {
    tx: mpsc::UnboundedSender<ControlMessage>,
    state_rx: watch::Receiver<ManagerSnapshot>,
    router: EventRouter,
    runtime: Handle,
    cancel_token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ManagerHandle {
    /// 活动订阅集合变化
    pub fn subscriptions_changed(&self) {
        self.post(ControlMessage::SubscriptionsChanged);
    }

    /// SIM 信息变化
    pub fn sim_info_changed(&self) {
        self.post(ControlMessage::SimInfoChanged);
    }

    /// 移动数据开关变化，直接在工作线程上转发，不经过控制队列
    pub fn mobile_data_changed(&self, enabled: bool) -> JoinHandle<()> {
        debug!("Enter onMobileDataEnabled: {}", enabled);
        self.router.forward_mobile_data(&self.runtime, enabled)
    }

    /// 当前是否持有 IMS 绑定
    pub fn is_service_available(&self) -> bool {
        matches!(self.state_rx.borrow().binding, BindingState::Bound(_))
    }

    pub fn binding_state(&self) -> BindingState {
        self.state_rx.borrow().binding
    }

    pub fn network_transport_type(&self) -> TransportType {
        self.state_rx.borrow().transport
    }

    /// 订阅状态变化
    pub fn watch_state(&self) -> watch::Receiver<ManagerSnapshot> {
        self.state_rx.clone()
    }

    pub fn publish_state(&self) -> PublishState {
        self.router.publish_state()
    }

    /// 等待此前投递的所有消息处理完毕
    pub async fn flush(&self) -> Result<(), ManagerError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send(ControlMessage::Flush(ack_tx))
            .map_err(|_| ManagerError::Stopped)?;
        ack_rx.await.map_err(|_| ManagerError::Stopped)
    }

    /// 关闭管理器：取消重试、注销绑定、结束发布协作者
    pub async fn shutdown(mut self) -> Result<(), ManagerError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send(ControlMessage::Shutdown(ack_tx))
            .map_err(|_| ManagerError::Stopped)?;
        ack_rx.await.map_err(|_| ManagerError::Stopped)?;

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("control task failed: {}", e);
            }
        }
        Ok(())
    }

    fn post(&self, message: ControlMessage) {
        if self.tx.send(message).is_err() {
            warn!("manager stopped, notification dropped");
        }
    }
}

impl Drop for ManagerHandle {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

struct ControlLoop {
    state: ManagerState,
    binder: RegistrationBinder,
    router: EventRouter,
    subscriptions: Arc<dyn ActiveSubscriptions>,
    capability: Arc<dyn ImsCapability>,
    state_tx: watch::Sender<ManagerSnapshot>,
    /// 是否已成功读取过一次活动订阅
    evaluated: bool,
}

impl ControlLoop {
    async fn run(
        mut self,
        mut rx: mpsc::UnboundedReceiver<ControlMessage>,
        cancel_token: CancellationToken,
    ) {
        loop {
            let message = tokio::select! {
                message = rx.recv() => message,
                _ = cancel_token.cancelled() => None,
            };

            match message {
                Some(ControlMessage::Shutdown(ack)) => {
                    self.teardown().await;
                    let _ = ack.send(());
                    break;
                }
                Some(message) => {
                    self.handle(message).await;
                    self.publish_snapshot();
                }
                None => {
                    self.teardown().await;
                    break;
                }
            }
        }
        debug!("control loop exited");
    }

    async fn handle(&mut self, message: ControlMessage) {
        match message {
            ControlMessage::SubscriptionsChanged => self.on_subscriptions_changed().await,
            ControlMessage::SimInfoChanged => self.on_sim_info_changed().await,
            ControlMessage::Ims {
                subscription,
                binding,
                event,
            } => {
                self.router.route(&mut self.state, subscription, binding, event);
            }
            ControlMessage::RetryFired { generation, action } => {
                match self.state.retry_mut().take_fired(generation) {
                    Some(RetryAction::Bind(target)) => {
                        info!("retrying callback registration for sub {}", target);
                        self.reconcile(target).await;
                    }
                    Some(RetryAction::Reevaluate) => {
                        info!("retrying subscriptions evaluation");
                        self.on_subscriptions_changed().await;
                    }
                    None => debug!("stale retry {:?} ignored", action),
                }
            }
            ControlMessage::Flush(ack) => {
                let _ = ack.send(());
            }
            ControlMessage::Shutdown(ack) => {
                let _ = ack.send(());
            }
        }
    }

    async fn on_subscriptions_changed(&mut self) {
        let active = match self.subscriptions.snapshot() {
            Ok(active) => active,
            Err(e) => {
                // 订阅服务尚未就绪，稍后重新读取；占用唯一的重试槽位
                warn!("handleSubscriptionsChanged: {}, retrying", e);
                self.state.retry_mut().arm(RetryAction::Reevaluate);
                return;
            }
        };

        let target = resolve(&active, self.subscriptions.default_voice_id());
        debug!("{} active subscriptions, target sub {}", active.len(), target);

        // 新的触发取代待执行的重试
        if let Some(previous) = self.state.retry_mut().disarm() {
            debug!("pending retry {:?} superseded", previous);
        }

        // 首次计算就没有可用订阅时通知一次服务不可用，之后保持幂等
        let first = !std::mem::replace(&mut self.evaluated, true);
        if first && !target.is_valid() && !self.state.bound_subscription().is_valid() {
            info!("no active subscription at start, IMS service down");
            self.router.service_down();
            return;
        }

        self.reconcile(target).await;
    }

    async fn reconcile(&mut self, target: SubscriptionId) {
        match self.binder.reconcile(&mut self.state, &self.router, target).await {
            Ok(BindOutcome::Unchanged) => {}
            Ok(BindOutcome::Bound(sub)) => debug!("bound to sub {}", sub),
            Ok(BindOutcome::Unbound) => info!("no active subscription, IMS service down"),
            Err(e @ BindError::ServiceTransientlyUnavailable { .. }) => {
                info!("Couldn't register callbacks for {}: {}", e.subscription(), e);
            }
            Err(e @ BindError::ServiceUnexpectedFailure { .. }) => {
                error!("Couldn't register callbacks for {}: {} ({})", e.subscription(), e, e.error_code());
            }
            Err(e @ BindError::DuplicateBindingAttempt { .. }) => {
                warn!("{} ({})", e, e.error_code());
            }
        }
    }

    async fn on_sim_info_changed(&mut self) {
        let sub = self.state.bound_subscription();
        if !sub.is_valid() {
            return;
        }

        match self.capability.is_vt_setting_enabled(sub).await {
            Ok(enabled) => self.router.forward_vt_setting(enabled),
            Err(e) => info!("Exception getting VT status for sub {}: {}", sub, e),
        }
    }

    async fn teardown(&mut self) {
        self.state.retry_mut().disarm();
        self.binder.unbind(&mut self.state, &self.router).await;
        self.router.finish();
        self.publish_snapshot();
        info!("registration manager stopped");
    }

    fn publish_snapshot(&self) {
        self.state_tx.send_replace(ManagerSnapshot {
            binding: self.state.binding_state(),
            transport: self.state.network_transport_type(),
        });
    }
}
