/// 工具函数模块
///
/// 日志初始化与命令行参数解析
use std::str::FromStr;

use tracing::Level;

use crate::error::ConfigError;
use crate::types::SubscriptionInfo;

/// 初始化日志输出
///
/// 无法识别的级别回退到 `info`
pub fn initialize_logging(level: &str) {
    let level = Level::from_str(level).unwrap_or(Level::INFO);
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init();
}

/// 解析订阅列表
///
/// 格式为逗号分隔的订阅 ID，`:o` 后缀表示机会性订阅
///
/// # 示例
/// ```rust
/// use ims_presence::utils::parse_subscriptions;
///
/// let subs = parse_subscriptions("1,2:o").unwrap();
/// assert_eq!(subs.len(), 2);
/// assert!(subs[1].is_opportunistic);
/// ```
pub fn parse_subscriptions(input: &str) -> Result<Vec<SubscriptionInfo>, ConfigError> {
    input
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            let (id, opportunistic) = match item.split_once(':') {
                Some((id, "o")) => (id, true),
                Some((_, flag)) => {
                    return Err(ConfigError::Parse(format!("unknown subscription flag: {}", flag)))
                }
                None => (item, false),
            };
            let id: i32 = id
                .trim()
                .parse()
                .map_err(|_| ConfigError::Parse(format!("invalid subscription id: {}", id)))?;
            if id < 0 {
                return Err(ConfigError::Invalid(format!("negative subscription id: {}", id)));
            }
            Ok(SubscriptionInfo::new(id, opportunistic))
        })
        .collect()
}
