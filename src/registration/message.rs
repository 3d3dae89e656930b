/// 控制队列消息
///
/// 外部通知、平台回调和重试到期共用同一个队列，由控制任务按到达顺序处理
use tokio::sync::oneshot;

use crate::types::{RegistrationEvent, SubscriptionId};

/// 到期后要执行的动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    /// IMS 暂不可用，重新绑定该订阅
    Bind(SubscriptionId),
    /// 订阅服务暂不可用，重新读取活动订阅并计算目标
    Reevaluate,
}

#[derive(Debug)]
pub enum ControlMessage {
    /// 活动订阅集合变化
    SubscriptionsChanged,
    /// SIM 信息变化（刷新 VT 开关）
    SimInfoChanged,
    /// 已注册回调上的事件，`binding` 为回调所属绑定的代号
    Ims {
        subscription: SubscriptionId,
        binding: u64,
        event: RegistrationEvent,
    },
    RetryFired {
        generation: u64,
        action: RetryAction,
    },
    /// 屏障：之前的消息处理完毕后应答
    Flush(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}
