/// 回调绑定
///
/// 同一时刻只有一个订阅持有注册状态回调和能力回调；切换订阅时
/// 先注销旧订阅再注册新订阅
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::message::{ControlMessage, RetryAction};
use super::retry::RetryScheduler;
use super::router::EventRouter;
use super::traits::{ImsCallback, ImsCapability, ImsRegistration};
use crate::error::{BindError, BindResult, RegError};
use crate::types::{SubscriptionId, TransportType};

/// 绑定状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BindingState {
    #[default]
    Unbound,
    Bound(SubscriptionId),
    RetryPending(SubscriptionId),
}

/// `reconcile` 成功时的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    /// 目标与当前绑定一致，未做任何操作
    Unchanged,
    Bound(SubscriptionId),
    /// 没有可用订阅
    Unbound,
}

/// 管理器唯一的可变状态，只在控制任务上修改
#[derive(Debug)]
pub struct ManagerState {
    bound_subscription: SubscriptionId,
    network_transport_type: TransportType,
    /// 每次尝试绑定递增，回调事件携带该代号
    binding_generation: u64,
    retry: RetryScheduler,
}

impl ManagerState {
    pub fn new(retry: RetryScheduler) -> Self {
        Self {
            bound_subscription: SubscriptionId::INVALID,
            network_transport_type: TransportType::Invalid,
            binding_generation: 0,
            retry,
        }
    }

    pub fn bound_subscription(&self) -> SubscriptionId {
        self.bound_subscription
    }

    pub(crate) fn set_bound_subscription(&mut self, sub: SubscriptionId) {
        self.bound_subscription = sub;
    }

    pub fn network_transport_type(&self) -> TransportType {
        self.network_transport_type
    }

    pub(crate) fn set_network_transport_type(&mut self, transport: TransportType) {
        self.network_transport_type = transport;
    }

    pub fn binding_generation(&self) -> u64 {
        self.binding_generation
    }

    pub fn pending_retry(&self) -> bool {
        self.retry.is_armed()
    }

    pub fn retry_mut(&mut self) -> &mut RetryScheduler {
        &mut self.retry
    }

    pub fn binding_state(&self) -> BindingState {
        if self.bound_subscription.is_valid() {
            BindingState::Bound(self.bound_subscription)
        } else if let Some(target) = self.retry.armed_target() {
            BindingState::RetryPending(target)
        } else {
            BindingState::Unbound
        }
    }
}

pub struct RegistrationBinder {
    registration: Arc<dyn ImsRegistration>,
    capability: Arc<dyn ImsCapability>,
    tx: mpsc::UnboundedSender<ControlMessage>,
}

impl RegistrationBinder {
    pub(crate) fn new(
        registration: Arc<dyn ImsRegistration>,
        capability: Arc<dyn ImsCapability>,
        tx: mpsc::UnboundedSender<ControlMessage>,
    ) -> Self {
        Self {
            registration,
            capability,
            tx,
        }
    }

    /// 让绑定与 `target` 一致
    pub async fn reconcile(
        &self,
        state: &mut ManagerState,
        router: &EventRouter,
        target: SubscriptionId,
    ) -> BindResult<BindOutcome> {
        if target == state.bound_subscription {
            // 同一订阅不重复注册回调
            if target.is_valid() {
                debug!("sub {} already bound", target);
            }
            return Ok(BindOutcome::Unchanged);
        }

        if !target.is_valid() {
            state.retry.disarm();
            self.unbind(state, router).await;
            return Ok(BindOutcome::Unbound);
        }

        self.unbind(state, router).await;
        self.bind(state, router, target).await
    }

    async fn bind(
        &self,
        state: &mut ManagerState,
        router: &EventRouter,
        target: SubscriptionId,
    ) -> BindResult<BindOutcome> {
        if state.bound_subscription.is_valid() {
            return Err(BindError::DuplicateBindingAttempt {
                bound: state.bound_subscription,
                target,
            });
        }

        state.binding_generation += 1;
        let callback = ImsCallback::new(target, state.binding_generation, self.tx.clone());

        if let Err(e) = self.registration.register(target, callback.clone()).await {
            return Err(self.on_failure(state, target, e));
        }

        if let Err(e) = self.capability.register(target, callback).await {
            // 回滚注册状态回调，避免留下半个绑定
            if let Err(rollback) = self.registration.unregister(target).await {
                warn!("rollback of registration callback for sub {} failed: {}", target, rollback);
            }
            return Err(self.on_failure(state, target, e));
        }

        state.bound_subscription = target;
        state.retry.disarm();
        info!("callbacks registered for sub {}", target);
        router.service_up();
        Ok(BindOutcome::Bound(target))
    }

    fn on_failure(&self, state: &mut ManagerState, target: SubscriptionId, source: RegError) -> BindError {
        let err = BindError::from_registration(target, source);
        if err.is_recoverable() {
            state.retry.arm(RetryAction::Bind(target));
        }
        err
    }

    /// 注销当前绑定（尽力而为），返回之前是否存在绑定
    pub async fn unbind(&self, state: &mut ManagerState, router: &EventRouter) -> bool {
        let sub = state.bound_subscription;
        if !sub.is_valid() {
            return false;
        }

        if let Err(e) = self.registration.unregister(sub).await {
            warn!("unregister registration callback for sub {} failed: {}", sub, e);
        }
        if let Err(e) = self.capability.unregister(sub).await {
            warn!("unregister capability callback for sub {} failed: {}", sub, e);
        }

        state.bound_subscription = SubscriptionId::INVALID;
        state.network_transport_type = TransportType::Invalid;
        info!("callbacks unregistered for sub {}", sub);
        router.service_down();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{PlatformCall, PublicationEvent, RecordingPublication, SimPlatform};
    use std::time::Duration;

    struct Fixture {
        platform: Arc<SimPlatform>,
        publication: Arc<RecordingPublication>,
        binder: RegistrationBinder,
        router: EventRouter,
        state: ManagerState,
        _rx: mpsc::UnboundedReceiver<ControlMessage>,
    }

    fn fixture() -> Fixture {
        let platform = Arc::new(SimPlatform::new());
        let publication = Arc::new(RecordingPublication::new());
        let (tx, rx) = mpsc::unbounded_channel();
        Fixture {
            binder: RegistrationBinder::new(platform.clone(), platform.clone(), tx.clone()),
            router: EventRouter::new(publication.clone()),
            state: ManagerState::new(RetryScheduler::new(Duration::from_millis(5000), tx)),
            platform,
            publication,
            _rx: rx,
        }
    }

    #[tokio::test]
    async fn test_reconcile_same_subscription_is_idempotent() {
        let mut f = fixture();
        let sub = SubscriptionId::new(1);

        let first = f.binder.reconcile(&mut f.state, &f.router, sub).await;
        let second = f.binder.reconcile(&mut f.state, &f.router, sub).await;

        assert_eq!(first, Ok(BindOutcome::Bound(sub)));
        assert_eq!(second, Ok(BindOutcome::Unchanged));
        assert_eq!(
            f.platform.calls(),
            vec![
                PlatformCall::RegisterRegistration(sub),
                PlatformCall::RegisterCapability(sub),
            ]
        );
        assert_eq!(f.publication.count(&PublicationEvent::ServiceUp), 1);
    }

    #[tokio::test]
    async fn test_switch_unregisters_before_register() {
        let mut f = fixture();
        let a = SubscriptionId::new(1);
        let b = SubscriptionId::new(2);

        f.binder.reconcile(&mut f.state, &f.router, a).await.expect("bind a");
        f.platform.clear_calls();
        f.binder.reconcile(&mut f.state, &f.router, b).await.expect("bind b");

        assert_eq!(
            f.platform.calls(),
            vec![
                PlatformCall::UnregisterRegistration(a),
                PlatformCall::UnregisterCapability(a),
                PlatformCall::RegisterRegistration(b),
                PlatformCall::RegisterCapability(b),
            ]
        );
        assert_eq!(f.state.binding_state(), BindingState::Bound(b));
        assert_eq!(f.platform.max_live_bindings(), 1);
    }

    #[tokio::test]
    async fn test_invalid_target_unbinds_and_signals_down() {
        let mut f = fixture();
        let sub = SubscriptionId::new(1);

        f.binder.reconcile(&mut f.state, &f.router, sub).await.expect("bind");
        let outcome = f
            .binder
            .reconcile(&mut f.state, &f.router, SubscriptionId::INVALID)
            .await;

        assert_eq!(outcome, Ok(BindOutcome::Unbound));
        assert_eq!(f.state.binding_state(), BindingState::Unbound);
        assert_eq!(
            f.publication.events(),
            vec![PublicationEvent::ServiceUp, PublicationEvent::ServiceDown]
        );
        assert!(f.platform.live_bindings().is_empty());
    }

    #[tokio::test]
    async fn test_transient_failure_arms_retry() {
        let mut f = fixture();
        let sub = SubscriptionId::new(1);
        f.platform
            .fail_next_registration(RegError::ServiceUnavailable("not ready".into()));

        let err = f
            .binder
            .reconcile(&mut f.state, &f.router, sub)
            .await
            .expect_err("transient failure");

        assert!(err.is_recoverable());
        assert_eq!(f.state.binding_state(), BindingState::RetryPending(sub));
        assert!(f.publication.events().is_empty());
    }

    #[tokio::test]
    async fn test_unexpected_failure_does_not_retry() {
        let mut f = fixture();
        let sub = SubscriptionId::new(1);
        f.platform
            .fail_next_registration(RegError::InvalidSubscription(sub));

        let err = f
            .binder
            .reconcile(&mut f.state, &f.router, sub)
            .await
            .expect_err("permanent failure");

        assert_eq!(err.error_code(), "SERVICE_UNEXPECTED_FAILURE");
        assert!(!f.state.pending_retry());
        assert_eq!(f.state.binding_state(), BindingState::Unbound);
    }

    #[tokio::test]
    async fn test_capability_failure_rolls_back_registration() {
        let mut f = fixture();
        let sub = SubscriptionId::new(3);
        f.platform
            .fail_next_capability(RegError::ServiceUnavailable("mmtel not ready".into()));

        let err = f
            .binder
            .reconcile(&mut f.state, &f.router, sub)
            .await
            .expect_err("capability failure");

        assert!(err.is_recoverable());
        assert_eq!(
            f.platform.calls(),
            vec![
                PlatformCall::RegisterRegistration(sub),
                PlatformCall::RegisterCapability(sub),
                PlatformCall::UnregisterRegistration(sub),
            ]
        );
        assert!(f.platform.live_bindings().is_empty());
    }

    #[tokio::test]
    async fn test_rebind_advances_binding_generation() {
        let mut f = fixture();
        let a = SubscriptionId::new(1);
        let b = SubscriptionId::new(2);

        f.binder.reconcile(&mut f.state, &f.router, a).await.expect("bind a");
        let first = f.state.binding_generation();
        f.binder.reconcile(&mut f.state, &f.router, b).await.expect("bind b");
        f.binder.reconcile(&mut f.state, &f.router, a).await.expect("bind a again");

        assert_eq!(f.state.binding_generation(), first + 2);
        assert_eq!(f.state.bound_subscription(), a);
    }

    #[tokio::test]
    async fn test_duplicate_binding_detected() {
        let mut f = fixture();
        f.state.set_bound_subscription(SubscriptionId::new(1));

        let err = f
            .binder
            .bind(&mut f.state, &f.router, SubscriptionId::new(2))
            .await
            .expect_err("duplicate");

        assert_eq!(err.error_code(), "DUPLICATE_BINDING_ATTEMPT");
        assert!(f.platform.calls().is_empty());
        assert_eq!(f.state.bound_subscription(), SubscriptionId::new(1));
    }
}
