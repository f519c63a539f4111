use chrono::NaiveTime;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::assignment::strategy::STRATEGY_NAMES;

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("MAX_TICKETS_PER_AGENT must be greater than 0")]
    ZeroCapacity,

    #[error("SLA_WARNING_THRESHOLD must be in (0, 1], got {0}")]
    InvalidWarningThreshold(f64),

    #[error("SLA_SWEEP_INTERVAL_SECS must be greater than 0")]
    ZeroSweepInterval,

    #[error("Unknown assignment strategy: {0}")]
    UnknownStrategy(String),

    #[error("Invalid business hours {0}: expected HH:MM")]
    InvalidBusinessHours(String),
}

/// Business hours window (parsed and validated, see [`Config::validate`])
#[derive(Debug, Clone)]
pub struct BusinessHours {
    pub enabled: bool,
    pub start: String,
    pub end: String,
}

impl BusinessHours {
    /// Parse the window into times
    pub fn window(&self) -> Result<(NaiveTime, NaiveTime), ConfigError> {
        let parse = |s: &str| {
            NaiveTime::parse_from_str(s, "%H:%M")
                .map_err(|_| ConfigError::InvalidBusinessHours(s.to_string()))
        };
        let start = parse(&self.start)?;
        let end = parse(&self.end)?;
        if end <= start {
            return Err(ConfigError::InvalidBusinessHours(format!(
                "{}-{}",
                self.start, self.end
            )));
        }
        Ok((start, end))
    }
}

/// 服务器配置
///
/// # 环境变量
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | ./data | 工作目录 (desk.redb) |
/// | HTTP_PORT | 3080 | HTTP 管理接口端口 |
/// | ENVIRONMENT | development | 运行环境 |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_DIR | (unset) | 滚动日志目录 |
/// | MAX_TICKETS_PER_AGENT | 10 | 每个坐席的最大并发工单数 |
/// | AUTO_ASSIGN_ENABLED | true | 是否自动分配 |
/// | AUTO_ASSIGN_STRATEGY | least_loaded | 自动分配策略 |
/// | SLA_SWEEP_INTERVAL_SECS | 60 | SLA 巡检间隔(秒) |
/// | SLA_WARNING_THRESHOLD | 0.8 | 预警阈值 (已用时间比例) |
/// | SLA_BUSINESS_HOURS_ENABLED | false | 是否按工作时间计算 |
/// | SLA_BUSINESS_HOURS_START | 09:00 | 工作时间开始 |
/// | SLA_BUSINESS_HOURS_END | 17:00 | 工作时间结束 |
///
/// # 示例
///
/// ```ignore
/// WORK_DIR=/data/desk MAX_TICKETS_PER_AGENT=5 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录，存储数据库文件
    pub work_dir: String,
    pub http_port: u16,
    /// 运行环境: development | staging | production
    pub environment: String,
    pub log_level: String,
    pub log_dir: Option<String>,

    /// 每个坐席的容量
    pub max_tickets_per_agent: u32,
    pub auto_assign_enabled: bool,
    pub auto_assign_strategy: String,

    pub sla_sweep_interval_secs: u64,
    /// 已用时间比例达到此值时预警
    pub sla_warning_threshold: f64,
    pub business_hours: BusinessHours,
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "./data".into()),
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3080),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_dir: std::env::var("LOG_DIR").ok(),

            max_tickets_per_agent: std::env::var("MAX_TICKETS_PER_AGENT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            auto_assign_enabled: std::env::var("AUTO_ASSIGN_ENABLED")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
            auto_assign_strategy: std::env::var("AUTO_ASSIGN_STRATEGY")
                .unwrap_or_else(|_| "least_loaded".into()),

            sla_sweep_interval_secs: std::env::var("SLA_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            sla_warning_threshold: std::env::var("SLA_WARNING_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.8),
            business_hours: BusinessHours {
                enabled: std::env::var("SLA_BUSINESS_HOURS_ENABLED")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(false),
                start: std::env::var("SLA_BUSINESS_HOURS_START")
                    .unwrap_or_else(|_| "09:00".into()),
                end: std::env::var("SLA_BUSINESS_HOURS_END").unwrap_or_else(|_| "17:00".into()),
            },
        }
    }

    /// 使用自定义值覆盖部分配置
    ///
    /// 常用于测试场景
    pub fn with_overrides(work_dir: impl Into<String>, max_tickets_per_agent: u32) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.max_tickets_per_agent = max_tickets_per_agent;
        config
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_tickets_per_agent == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if !(self.sla_warning_threshold > 0.0 && self.sla_warning_threshold <= 1.0) {
            return Err(ConfigError::InvalidWarningThreshold(
                self.sla_warning_threshold,
            ));
        }
        if self.sla_sweep_interval_secs == 0 {
            return Err(ConfigError::ZeroSweepInterval);
        }
        if !STRATEGY_NAMES.contains(&self.auto_assign_strategy.as_str()) {
            return Err(ConfigError::UnknownStrategy(
                self.auto_assign_strategy.clone(),
            ));
        }
        self.business_hours.window()?;
        Ok(())
    }

    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("desk.redb")
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sla_sweep_interval_secs)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        Config {
            work_dir: "./data".into(),
            http_port: 3080,
            environment: "development".into(),
            log_level: "info".into(),
            log_dir: None,
            max_tickets_per_agent: 10,
            auto_assign_enabled: true,
            auto_assign_strategy: "least_loaded".into(),
            sla_sweep_interval_secs: 60,
            sla_warning_threshold: 0.8,
            business_hours: BusinessHours {
                enabled: false,
                start: "09:00".into(),
                end: "17:00".into(),
            },
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(valid().validate().is_ok());
        assert!(valid().db_path().ends_with("desk.redb"));
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut c = valid();
        c.max_tickets_per_agent = 0;
        assert!(matches!(c.validate(), Err(ConfigError::ZeroCapacity)));

        let mut c = valid();
        c.sla_warning_threshold = 1.5;
        assert!(matches!(
            c.validate(),
            Err(ConfigError::InvalidWarningThreshold(_))
        ));

        let mut c = valid();
        c.auto_assign_strategy = "skill_match".into();
        assert!(matches!(c.validate(), Err(ConfigError::UnknownStrategy(_))));

        let mut c = valid();
        c.business_hours.end = "08:00".into();
        assert!(matches!(
            c.validate(),
            Err(ConfigError::InvalidBusinessHours(_))
        ));

        let mut c = valid();
        c.business_hours.start = "nine".into();
        assert!(c.validate().is_err());
    }
}
