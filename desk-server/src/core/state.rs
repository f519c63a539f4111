use std::sync::Arc;
use std::time::Instant;

use crate::assignment::{AssignmentLedger, strategy_from_name};
use crate::core::config::ConfigError;
use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::core::{Config, Result};
use crate::events::{EventBus, NotificationForwarder};
use crate::intake::TicketIntake;
use crate::sla::{SlaBreachSweeper, SlaRuleResolver, SlaTracker};
use crate::storage::DeskStorage;
use crate::workload::AgentWorkloadRegistry;

/// 服务器状态 - 持有所有引擎组件
///
/// 所有字段 Clone 开销很小（内部共享同一个 redb 句柄和事件通道），
/// 直接作为 axum `State` 使用。
///
/// ```ignore
/// let state = ServerState::initialize(&config)?;
/// let tasks = state.start_background_tasks();
/// ```
#[derive(Clone, Debug)]
pub struct ServerState {
    pub config: Config,
    pub storage: DeskStorage,
    pub events: EventBus,
    pub registry: AgentWorkloadRegistry,
    pub resolver: SlaRuleResolver,
    pub tracker: SlaTracker,
    pub ledger: Arc<AssignmentLedger>,
    pub sweeper: SlaBreachSweeper,
    pub intake: TicketIntake,
    /// 启动时间 (health 接口)
    pub started_at: Instant,
}

impl ServerState {
    /// 初始化服务器状态
    ///
    /// 按顺序初始化：
    /// 1. 校验配置
    /// 2. 工作目录与数据库 (work_dir/desk.redb)
    /// 3. 引擎组件 (registry → resolver → tracker → ledger → sweeper → intake)
    pub fn initialize(config: &Config) -> Result<Self> {
        config.validate()?;
        if config.business_hours.enabled {
            tracing::warn!(
                start = %config.business_hours.start,
                end = %config.business_hours.end,
                "SLA business hours are configured but due times use wall-clock time"
            );
        }

        std::fs::create_dir_all(&config.work_dir)?;
        let storage = DeskStorage::open(config.db_path())?;
        tracing::info!(path = %config.db_path().display(), "Desk storage opened");

        Self::with_storage(config, storage)
    }

    /// Build every component on an already opened storage
    pub fn with_storage(config: &Config, storage: DeskStorage) -> Result<Self> {
        let strategy = strategy_from_name(&config.auto_assign_strategy)
            .ok_or_else(|| ConfigError::UnknownStrategy(config.auto_assign_strategy.clone()))?;

        let events = EventBus::new();
        let registry = AgentWorkloadRegistry::new(storage.clone(), config.max_tickets_per_agent);
        let resolver = SlaRuleResolver::new(storage.clone());
        let tracker = SlaTracker::new(
            storage.clone(),
            resolver.clone(),
            events.clone(),
            config.sla_warning_threshold,
        );
        let ledger = Arc::new(AssignmentLedger::new(
            storage.clone(),
            registry.clone(),
            strategy,
            tracker.clone(),
            events.clone(),
            config.auto_assign_enabled,
        ));
        let sweeper = SlaBreachSweeper::new(
            storage.clone(),
            events.clone(),
            config.sla_warning_threshold,
        );
        let intake = TicketIntake::new(storage.clone(), tracker.clone(), ledger.clone());

        tracing::info!(
            capacity = config.max_tickets_per_agent,
            strategy = ledger.strategy_name(),
            auto_assign = config.auto_assign_enabled,
            "Desk engine initialized"
        );

        Ok(Self {
            config: config.clone(),
            storage,
            events,
            registry,
            resolver,
            tracker,
            ledger,
            sweeper,
            intake,
            started_at: Instant::now(),
        })
    }

    /// 启动后台任务
    ///
    /// 启动的任务：
    /// - 通知转发 (NotificationForwarder)
    /// - SLA 定时巡检 (SlaBreachSweeper)
    pub fn start_background_tasks(&self) -> BackgroundTasks {
        let mut tasks = BackgroundTasks::new();
        let token = tasks.shutdown_token();

        tasks.spawn(
            "notification_forwarder",
            TaskKind::Listener,
            NotificationForwarder::new(&self.events).run(token.clone()),
        );
        tasks.spawn(
            "sla_sweeper",
            TaskKind::Periodic,
            self.sweeper
                .clone()
                .run(self.config.sweep_interval(), token),
        );

        tasks.log_summary();
        tasks
    }
}
