//! 核心模块
//!
//! # 结构
//!
//! - [`config`] - 环境变量配置
//! - [`error`] - 启动/运行错误
//! - [`state`] - 服务器状态 (引擎组件)
//! - [`server`] - HTTP 服务器
//! - [`tasks`] - 后台任务管理

pub mod config;
pub mod error;
pub mod server;
pub mod state;
pub mod tasks;

pub use config::{BusinessHours, Config, ConfigError};
pub use error::{Result, ServerError};
pub use server::Server;
pub use state::ServerState;
pub use tasks::{BackgroundTasks, TaskKind};
