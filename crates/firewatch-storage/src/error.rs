use std::time::Duration;
use thiserror::Error;

/// 持久化错误类型
#[derive(Error, Debug)]
pub enum PersistError {
    /// 数据库错误（事务已回滚）
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// 任务执行超时（事务随之回滚）
    #[error("Persistence job timed out after {0:?}")]
    Timeout(Duration),

    /// 任务队列已关闭
    #[error("Persistence queue is closed")]
    QueueClosed,
}

/// 持久化结果类型
pub type Result<T> = std::result::Result<T, PersistError>;
