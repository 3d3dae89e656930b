/// 内存平台实现
///
/// 实现全部平台协作者 trait，记录调用序列并可注入失败，
/// 供命令行模拟和测试使用
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{PlatformError, RegError};
use crate::manager::Collaborators;
use crate::registration::{
    ActiveSubscriptions, ImsCallback, ImsCapability, ImsRegistration, MobileDataSetting,
    PresencePublication, PresenceSubscriber,
};
use crate::types::{
    ImsReasonInfo, MmTelCapabilities, PublishState, ResultCode, SubscriptionId,
    SubscriptionInfo, TransportType,
};

/// 平台收到的调用
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformCall {
    RegisterRegistration(SubscriptionId),
    UnregisterRegistration(SubscriptionId),
    RegisterCapability(SubscriptionId),
    UnregisterCapability(SubscriptionId),
}

struct SimState {
    subscriptions: Vec<SubscriptionInfo>,
    default_voice: SubscriptionId,
    subscription_service_available: bool,
    registration_failures: VecDeque<RegError>,
    capability_failures: VecDeque<RegError>,
    registration_callbacks: HashMap<SubscriptionId, ImsCallback>,
    capability_callbacks: HashMap<SubscriptionId, ImsCallback>,
    calls: Vec<PlatformCall>,
    max_live_bindings: usize,
    vt_enabled: HashMap<SubscriptionId, bool>,
    mobile_data: bool,
}

/// 内存中的订阅服务与 IMS 服务
pub struct SimPlatform {
    inner: Mutex<SimState>,
}

impl SimPlatform {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SimState {
                subscriptions: Vec::new(),
                default_voice: SubscriptionId::INVALID,
                subscription_service_available: true,
                registration_failures: VecDeque::new(),
                capability_failures: VecDeque::new(),
                registration_callbacks: HashMap::new(),
                capability_callbacks: HashMap::new(),
                calls: Vec::new(),
                max_live_bindings: 0,
                vt_enabled: HashMap::new(),
                mobile_data: true,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 用同一个平台实例组装管理器依赖
    pub fn collaborators(self: &Arc<Self>, publication: Arc<dyn PresencePublication>) -> Collaborators {
        Collaborators {
            subscriptions: self.clone(),
            registration: self.clone(),
            capability: self.clone(),
            publication,
            mobile_data: self.clone(),
        }
    }

    pub fn set_subscriptions(&self, subscriptions: Vec<SubscriptionInfo>, default_voice: SubscriptionId) {
        let mut state = self.lock();
        state.subscriptions = subscriptions;
        state.default_voice = default_voice;
    }

    pub fn set_subscription_service_available(&self, available: bool) {
        self.lock().subscription_service_available = available;
    }

    /// 下一次注册状态回调注册返回 `err`（可排队多个）
    pub fn fail_next_registration(&self, err: RegError) {
        self.lock().registration_failures.push_back(err);
    }

    pub fn fail_next_capability(&self, err: RegError) {
        self.lock().capability_failures.push_back(err);
    }

    pub fn set_vt_enabled(&self, sub: SubscriptionId, enabled: bool) {
        self.lock().vt_enabled.insert(sub, enabled);
    }

    pub fn set_mobile_data(&self, enabled: bool) {
        self.lock().mobile_data = enabled;
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn register_count(&self, sub: SubscriptionId) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| **call == PlatformCall::RegisterRegistration(sub))
            .count()
    }

    /// 当前持有注册状态回调的订阅
    pub fn live_bindings(&self) -> Vec<SubscriptionId> {
        let mut subs: Vec<_> = self.lock().registration_callbacks.keys().copied().collect();
        subs.sort();
        subs
    }

    /// 历史上同时持有回调的订阅数最大值
    pub fn max_live_bindings(&self) -> usize {
        self.lock().max_live_bindings
    }

    /// 订阅当前持有的注册状态回调
    pub fn registration_callback(&self, sub: SubscriptionId) -> Option<ImsCallback> {
        self.lock().registration_callbacks.get(&sub).cloned()
    }

    /// 模拟网络注册成功，订阅没有回调时返回 false
    pub fn emit_registered(&self, sub: SubscriptionId, transport: TransportType) -> bool {
        match self.registration_callback(sub) {
            Some(callback) => {
                callback.on_registered(transport);
                true
            }
            None => false,
        }
    }

    pub fn emit_unregistered(&self, sub: SubscriptionId, reason: ImsReasonInfo) -> bool {
        match self.registration_callback(sub) {
            Some(callback) => {
                callback.on_unregistered(reason);
                true
            }
            None => false,
        }
    }

    pub fn emit_capabilities(&self, sub: SubscriptionId, capabilities: MmTelCapabilities) -> bool {
        let callback = self.lock().capability_callbacks.get(&sub).cloned();
        match callback {
            Some(callback) => {
                callback.on_capabilities_status_changed(capabilities);
                true
            }
            None => false,
        }
    }
}

impl Default for SimPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl ActiveSubscriptions for SimPlatform {
    fn snapshot(&self) -> Result<Vec<SubscriptionInfo>, PlatformError> {
        let state = self.lock();
        if !state.subscription_service_available {
            return Err(PlatformError::SubscriptionServiceUnavailable);
        }
        Ok(state.subscriptions.clone())
    }

    fn default_voice_id(&self) -> SubscriptionId {
        self.lock().default_voice
    }
}

#[async_trait]
impl ImsRegistration for SimPlatform {
    async fn register(&self, sub: SubscriptionId, callback: ImsCallback) -> Result<(), RegError> {
        let mut state = self.lock();
        state.calls.push(PlatformCall::RegisterRegistration(sub));
        if let Some(err) = state.registration_failures.pop_front() {
            debug!("sim: registration callback for sub {} fails: {}", sub, err);
            return Err(err);
        }
        if state.registration_callbacks.contains_key(&sub) {
            return Err(RegError::Unspecified(format!("callback already registered for sub {}", sub)));
        }
        state.registration_callbacks.insert(sub, callback);
        state.max_live_bindings = state.max_live_bindings.max(state.registration_callbacks.len());
        Ok(())
    }

    async fn unregister(&self, sub: SubscriptionId) -> Result<(), RegError> {
        let mut state = self.lock();
        state.calls.push(PlatformCall::UnregisterRegistration(sub));
        state
            .registration_callbacks
            .remove(&sub)
            .map(|_| ())
            .ok_or(RegError::InvalidSubscription(sub))
    }
}

#[async_trait]
impl ImsCapability for SimPlatform {
    async fn register(&self, sub: SubscriptionId, callback: ImsCallback) -> Result<(), RegError> {
        let mut state = self.lock();
        state.calls.push(PlatformCall::RegisterCapability(sub));
        if let Some(err) = state.capability_failures.pop_front() {
            debug!("sim: capability callback for sub {} fails: {}", sub, err);
            return Err(err);
        }
        if state.capability_callbacks.contains_key(&sub) {
            return Err(RegError::Unspecified(format!("capability callback already registered for sub {}", sub)));
        }
        state.capability_callbacks.insert(sub, callback);
        Ok(())
    }

    async fn unregister(&self, sub: SubscriptionId) -> Result<(), RegError> {
        let mut state = self.lock();
        state.calls.push(PlatformCall::UnregisterCapability(sub));
        state
            .capability_callbacks
            .remove(&sub)
            .map(|_| ())
            .ok_or(RegError::InvalidSubscription(sub))
    }

    async fn is_vt_setting_enabled(&self, sub: SubscriptionId) -> Result<bool, RegError> {
        self.lock()
            .vt_enabled
            .get(&sub)
            .copied()
            .ok_or(RegError::InvalidSubscription(sub))
    }
}

impl MobileDataSetting for SimPlatform {
    fn is_enabled(&self) -> bool {
        self.lock().mobile_data
    }
}

/// Presence 发布协作者收到的调用
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicationEvent {
    ServiceUp,
    ServiceDown,
    Connected,
    Disconnected,
    CapabilityChanged(TransportType, MmTelCapabilities),
    MobileDataChanged(bool),
    VtSettingChanged(bool),
    Finished,
}

/// 记录所有调用的 Presence 发布实现
#[derive(Default)]
pub struct RecordingPublication {
    events: Mutex<Vec<PublicationEvent>>,
    publish_state: Mutex<PublishState>,
}

impl RecordingPublication {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, event: PublicationEvent) {
        debug!("publication <- {:?}", event);
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    pub fn events(&self) -> Vec<PublicationEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self, event: &PublicationEvent) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }

    pub fn set_publish_state(&self, state: PublishState) {
        *self.publish_state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }
}

impl PresencePublication for RecordingPublication {
    fn service_up(&self) {
        self.record(PublicationEvent::ServiceUp);
    }

    fn service_down(&self) {
        self.record(PublicationEvent::ServiceDown);
    }

    fn on_connected(&self) {
        self.record(PublicationEvent::Connected);
    }

    fn on_disconnected(&self) {
        self.record(PublicationEvent::Disconnected);
    }

    fn on_capability_changed(&self, transport: TransportType, capabilities: MmTelCapabilities) {
        self.record(PublicationEvent::CapabilityChanged(transport, capabilities));
    }

    fn on_mobile_data_changed(&self, enabled: bool) {
        self.record(PublicationEvent::MobileDataChanged(enabled));
    }

    fn on_vt_setting_changed(&self, enabled: bool) {
        self.record(PublicationEvent::VtSettingChanged(enabled));
    }

    fn publish_state(&self) -> PublishState {
        *self.publish_state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn finish(&self) {
        self.record(PublicationEvent::Finished);
    }
}

/// 带简单节流的 Presence 订阅实现
///
/// 同一联系人的第二次普通可用性查询返回 `SubscribeTooFrequently`
#[derive(Default)]
pub struct ThrottlingSubscriber {
    queried: Mutex<HashSet<String>>,
}

impl ThrottlingSubscriber {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PresenceSubscriber for ThrottlingSubscriber {
    fn request_capability(&self, contacts: &[String]) -> ResultCode {
        debug!("sim: requestCapability for {} contacts", contacts.len());
        if contacts.is_empty() {
            return ResultCode::ErrorGeneric;
        }
        ResultCode::Success
    }

    fn request_availability(&self, contact: &str, no_throttle: bool) -> ResultCode {
        let first = self
            .queried
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(contact.to_string());
        if first || no_throttle {
            ResultCode::Success
        } else {
            ResultCode::SubscribeTooFrequently
        }
    }
}
