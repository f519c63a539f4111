use thiserror::Error;

use crate::core::config::ConfigError;
use crate::error::DeskError;
use crate::storage::StorageError;

/// 启动与运行错误
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    #[error("存储初始化失败: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Desk(#[from] DeskError),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;
