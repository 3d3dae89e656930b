/// 重试调度器
///
/// 只有一个重试槽位：重新 `arm` 会取消之前的重试（无论是重新绑定还是
/// 重新计算订阅）。到期后向控制队列投递 `RetryFired`，由控制任务按代号
/// 判断是否仍然有效
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::message::{ControlMessage, RetryAction};
use crate::types::SubscriptionId;

#[derive(Debug)]
struct PendingRetry {
    generation: u64,
    action: RetryAction,
    cancel: CancellationToken,
}

#[derive(Debug)]
pub struct RetryScheduler {
    delay: Duration,
    tx: mpsc::UnboundedSender<ControlMessage>,
    pending: Option<PendingRetry>,
    generation: u64,
}

impl RetryScheduler {
    pub(crate) fn new(delay: Duration, tx: mpsc::UnboundedSender<ControlMessage>) -> Self {
        Self {
            delay,
            tx,
            pending: None,
            generation: 0,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// 安排一次重试，替换已有的重试
    pub fn arm(&mut self, action: RetryAction) {
        if let Some(previous) = self.pending.take() {
            previous.cancel.cancel();
            debug!(
                "replacing pending retry {:?} (generation {})",
                previous.action, previous.generation
            );
        }

        self.generation += 1;
        let generation = self.generation;
        let cancel = CancellationToken::new();
        let child = cancel.clone();
        let tx = self.tx.clone();
        let delay = self.delay;

        tokio::spawn(async move {
            tokio::select! {
                _ = child.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    if tx.send(ControlMessage::RetryFired { generation, action }).is_err() {
                        debug!("manager stopped, retry {:?} ignored", action);
                    }
                }
            }
        });

        info!("retry {:?} armed in {}ms", action, delay.as_millis());
        self.pending = Some(PendingRetry {
            generation,
            action,
            cancel,
        });
    }

    /// 取消待执行的重试，返回其动作
    pub fn disarm(&mut self) -> Option<RetryAction> {
        let pending = self.pending.take()?;
        pending.cancel.cancel();
        debug!("retry {:?} disarmed", pending.action);
        Some(pending.action)
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    pub fn armed_action(&self) -> Option<RetryAction> {
        self.pending.as_ref().map(|p| p.action)
    }

    /// 待重新绑定的订阅；重新计算订阅的重试没有目标
    pub fn armed_target(&self) -> Option<SubscriptionId> {
        match self.armed_action()? {
            RetryAction::Bind(target) => Some(target),
            RetryAction::Reevaluate => None,
        }
    }

    /// 处理到期通知；过期代号返回 `None`
    pub(crate) fn take_fired(&mut self, generation: u64) -> Option<RetryAction> {
        match &self.pending {
            Some(pending) if pending.generation == generation => {
                self.pending.take().map(|p| p.action)
            }
            _ => None,
        }
    }
}

impl Drop for RetryScheduler {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.cancel.cancel();
        }
    }
}
