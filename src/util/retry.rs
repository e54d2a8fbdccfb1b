/// 固定間隔の再試行ポリシー。
///
/// facts API は一時的な失敗が多いため、試行回数の上限と一定の待機時間だけを持つ。
use std::time::Duration;

/// 再試行戦略の設定。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// 最大試行回数（初回を含む）
    pub max_attempts: usize,
    /// 試行間の待機時間
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub const fn new(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// 指定された試行回数の前に待機すべき時間（初回は待たない）。
    ///
    /// # Arguments
    /// * `attempt` - 試行回数（0から開始）
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            Duration::ZERO
        } else {
            self.delay
        }
    }

    /// この試行回数が再試行可能かどうかを判定する。
    #[must_use]
    pub const fn can_retry(&self, attempt: usize) -> bool {
        attempt < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_facts_api_policy() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.delay, Duration::from_secs(2));
    }

    #[test]
    fn delay_for_attempt_is_fixed_after_first() {
        let config = RetryConfig::new(5, Duration::from_millis(150));

        assert_eq!(config.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(150));
        assert_eq!(config.delay_for_attempt(4), Duration::from_millis(150));
    }

    #[test]
    fn can_retry_respects_max_attempts() {
        let config = RetryConfig::new(3, Duration::from_millis(100));

        assert!(config.can_retry(0));
        assert!(config.can_retry(1));
        assert!(config.can_retry(2));
        assert!(!config.can_retry(3));
        assert!(!config.can_retry(4));
    }
}
