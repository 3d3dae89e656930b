/// 订阅、传输类型与能力等基础类型
use std::fmt;

/// 蜂窝订阅 ID
///
/// `SubscriptionId::INVALID` 表示“没有订阅”
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(i32);

impl SubscriptionId {
    /// 无效订阅哨兵值
    pub const INVALID: SubscriptionId = SubscriptionId(-1);

    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    pub const fn get(self) -> i32 {
        self.0
    }

    /// 订阅 ID 是否有效（非负）
    pub const fn is_valid(self) -> bool {
        self.0 >= 0
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl From<i32> for SubscriptionId {
    fn from(id: i32) -> Self {
        Self(id)
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}", self.0)
        } else {
            f.write_str("INVALID")
        }
    }
}

/// 活动订阅描述
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionInfo {
    pub id: SubscriptionId,

    /// 机会性订阅不能作为主语音/数据通道
    pub is_opportunistic: bool,
}

impl SubscriptionInfo {
    pub fn new(id: impl Into<SubscriptionId>, is_opportunistic: bool) -> Self {
        Self {
            id: id.into(),
            is_opportunistic,
        }
    }
}

/// IMS 注册所在的接入网络传输类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransportType {
    #[default]
    Invalid,
    /// 蜂窝网络
    Wwan,
    /// Wi-Fi
    Wlan,
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportType::Invalid => "INVALID",
            TransportType::Wwan => "WWAN",
            TransportType::Wlan => "WLAN",
        };
        f.write_str(name)
    }
}

/// MmTel 能力位集合
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MmTelCapabilities(u32);

impl MmTelCapabilities {
    pub const VOICE: u32 = 1 << 0;
    pub const VIDEO: u32 = 1 << 1;
    pub const UT: u32 = 1 << 2;
    pub const SMS: u32 = 1 << 3;

    pub const fn new(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_capable(self, capability: u32) -> bool {
        self.0 & capability == capability
    }

    pub fn with(mut self, capability: u32) -> Self {
        self.0 |= capability;
        self
    }
}

impl fmt::Display for MmTelCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.is_capable(Self::VOICE) {
            names.push("VOICE");
        }
        if self.is_capable(Self::VIDEO) {
            names.push("VIDEO");
        }
        if self.is_capable(Self::UT) {
            names.push("UT");
        }
        if self.is_capable(Self::SMS) {
            names.push("SMS");
        }
        write!(f, "[{}]", names.join(","))
    }
}

/// IMS 去注册原因
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImsReasonInfo {
    pub code: i32,
    pub extra_code: i32,
    pub extra_message: Option<String>,
}

impl ImsReasonInfo {
    pub fn new(code: i32, extra_message: Option<String>) -> Self {
        Self {
            code,
            extra_code: 0,
            extra_message,
        }
    }
}

impl fmt::Display for ImsReasonInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "code={} extra={}", self.code, self.extra_code)?;
        if let Some(msg) = &self.extra_message {
            write!(f, " ({})", msg)?;
        }
        Ok(())
    }
}

/// 发布状态（透传自 Presence Publication）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PublishState {
    Ok200,
    #[default]
    NotPublished,
    VolteProvisionError,
    RcsProvisionError,
    RequestTimeout,
    OtherError,
}

impl PublishState {
    /// 对外暴露的整型代码
    pub fn code(self) -> i32 {
        match self {
            PublishState::Ok200 => 0,
            PublishState::NotPublished => 1,
            PublishState::VolteProvisionError => 2,
            PublishState::RcsProvisionError => 3,
            PublishState::RequestTimeout => 4,
            PublishState::OtherError => 5,
        }
    }
}

/// 能力/可用性查询的返回码
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    Success,
    ErrorServiceNotAvailable,
    SubscribeTooFrequently,
    ErrorGeneric,
}

/// 已绑定订阅推送过来的原始事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationEvent {
    Registered(TransportType),
    Unregistered(ImsReasonInfo),
    CapabilityChanged(MmTelCapabilities),
}
