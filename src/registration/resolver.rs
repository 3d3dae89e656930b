/// 订阅解析
///
/// 计算应当持有 IMS 注册的订阅：优先默认语音订阅，否则取第一个
/// 非机会性的活动订阅
use crate::types::{SubscriptionId, SubscriptionInfo};

pub fn resolve(active: &[SubscriptionInfo], default_voice: SubscriptionId) -> SubscriptionId {
    if active.is_empty() {
        return SubscriptionId::INVALID;
    }

    if default_voice.is_valid() && active.iter().any(|info| info.id == default_voice) {
        return default_voice;
    }

    active
        .iter()
        .find(|info| !info.is_opportunistic)
        .map(|info| info.id)
        .unwrap_or(SubscriptionId::INVALID)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub(id: i32, opportunistic: bool) -> SubscriptionInfo {
        SubscriptionInfo::new(id, opportunistic)
    }

    #[test]
    fn test_empty_is_invalid() {
        assert_eq!(resolve(&[], SubscriptionId::new(1)), SubscriptionId::INVALID);
    }

    #[test]
    fn test_default_voice_wins() {
        let active = [sub(1, false), sub(2, false)];
        assert_eq!(resolve(&active, SubscriptionId::new(2)), SubscriptionId::new(2));
    }

    #[test]
    fn test_default_voice_not_active_falls_back() {
        let active = [sub(1, false)];
        assert_eq!(resolve(&active, SubscriptionId::new(9)), SubscriptionId::new(1));
    }

    #[test]
    fn test_skips_opportunistic() {
        let active = [sub(3, true), sub(5, false), sub(6, false)];
        assert_eq!(resolve(&active, SubscriptionId::INVALID), SubscriptionId::new(5));
    }

    #[test]
    fn test_only_opportunistic_is_invalid() {
        let active = [sub(3, true), sub(4, true)];
        assert_eq!(resolve(&active, SubscriptionId::INVALID), SubscriptionId::INVALID);
    }
}
