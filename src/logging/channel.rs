//! `logger` 服务：带名称和最低级别的日志通道
//!
//! 输出目的地由调用方安装的 tracing subscriber 决定。

use parking_lot::RwLock;
use tracing::Level;

/// 日志通道
#[derive(Debug)]
pub struct ChannelLogger {
    channel: String,
    min_level: RwLock<Level>,
}

impl ChannelLogger {
    pub fn new(channel: impl Into<String>, min_level: Level) -> Self {
        Self {
            channel: channel.into(),
            min_level: RwLock::new(min_level),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn level(&self) -> Level {
        *self.min_level.read()
    }

    /// 获取服务后由调用方调整
    pub fn set_level(&self, level: Level) {
        *self.min_level.write() = level;
    }

    /// tracing 中越详细的级别越大
    pub fn enabled(&self, level: Level) -> bool {
        level <= self.level()
    }

    pub fn log(&self, level: Level, message: &str) {
        if !self.enabled(level) {
            return;
        }
        let channel = self.channel.as_str();
        match level {
            Level::ERROR => tracing::error!(channel, "{}", message),
            Level::WARN => tracing::warn!(channel, "{}", message),
            Level::INFO => tracing::info!(channel, "{}", message),
            Level::DEBUG => tracing::debug!(channel, "{}", message),
            _ => tracing::trace!(channel, "{}", message),
        }
    }

    pub fn error(&self, message: &str) {
        self.log(Level::ERROR, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(Level::WARN, message);
    }

    pub fn info(&self, message: &str) {
        self.log(Level::INFO, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(Level::DEBUG, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_threshold() {
        let logger = ChannelLogger::new("app", Level::INFO);

        assert!(logger.enabled(Level::ERROR));
        assert!(logger.enabled(Level::INFO));
        assert!(!logger.enabled(Level::DEBUG));

        logger.set_level(Level::TRACE);
        assert!(logger.enabled(Level::DEBUG));
        assert_eq!(logger.channel(), "app");
    }
}
