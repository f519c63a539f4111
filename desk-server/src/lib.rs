//! Desk Server - 客服工单分配与 SLA 引擎
//!
//! # 架构概述
//!
//! - **坐席工作量** (`workload`): 每个坐席的并发工单计数与可用状态
//! - **分配** (`assignment`): 分配台账 (手动/自动/改派/取消) 与自动分配策略
//! - **SLA** (`sla`): 规则解析、单工单计时、定时巡检
//! - **工单入口** (`intake`): 工单子系统的创建/优先级/响应/解决回调
//! - **事件** (`events`): 分配、预警、违约通知 (fire-and-forget)
//! - **存储** (`storage`): 嵌入式 redb
//! - **HTTP API** (`api`): 管理接口
//!
//! # 模块结构
//!
//! ```text
//! desk-server/src/
//! ├── core/          # 配置、状态、错误、后台任务
//! ├── api/           # HTTP 路由和处理器
//! ├── assignment/    # 分配台账与策略
//! ├── sla/           # SLA 规则、跟踪、巡检
//! ├── utils/         # 日志、校验
//! ├── workload.rs    # 坐席工作量
//! ├── intake.rs      # 工单入口
//! ├── events.rs      # 事件总线
//! ├── storage.rs     # redb 存储
//! └── error.rs       # 引擎错误
//! ```

pub mod api;
pub mod assignment;
pub mod core;
pub mod error;
pub mod events;
pub mod intake;
pub mod sla;
pub mod storage;
pub mod utils;
pub mod workload;

// Re-export 公共类型
pub use assignment::{AssignmentLedger, AutoAssignOutcome};
pub use core::{Config, Server, ServerError, ServerState};
pub use error::{DeskError, DeskResult};
pub use events::EventBus;
pub use intake::TicketIntake;
pub use sla::{SlaBreachSweeper, SlaRuleResolver, SlaTracker, SweepReport};
pub use storage::DeskStorage;
pub use workload::AgentWorkloadRegistry;

// Re-export unified error types from shared
pub use utils::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

/// 设置运行环境: 加载 .env，初始化日志
pub fn setup_environment() {
    // .env 不存在时使用进程环境变量
    let _ = dotenv::dotenv();

    let log_level = std::env::var("LOG_LEVEL").ok();
    let log_dir = std::env::var("LOG_DIR").ok();
    init_logger_with_file(log_level.as_deref(), log_dir.as_deref());
}

pub fn print_banner() {
    println!(
        r#"
    ____            __
   / __ \___  _____/ /__
  / / / / _ \/ ___/ //_/
 / /_/ /  __(__  ) ,<
/_____/\___/____/_/|_|
    "#
    );
}
