use crate::error::Result;
use crate::metrics;
use crate::repository::{ReadingRepository, UpsertOutcome};
use chrono::{SubsecRound, Utc};
use firewatch_types::DeviceReading;
use std::time::Duration;
use tracing::{error, info};

/// 持久化执行器
///
/// 每个任务一个事务，带超时。超时的任务在仓储内显式回滚，
/// 提交只在时限内的工作完成后进行。
#[derive(Clone)]
pub struct PersistenceExecutor {
    repository: ReadingRepository,
    job_timeout: Duration,
}

impl PersistenceExecutor {
    pub fn new(repository: ReadingRepository, job_timeout: Duration) -> Self {
        Self {
            repository,
            job_timeout,
        }
    }

    pub fn repository(&self) -> &ReadingRepository {
        &self.repository
    }

    /// 执行一次持久化任务
    ///
    /// 缺少时间戳的读数使用执行时刻。时间戳截断到微秒，
    /// 保证不同后端下同一自然键可比较。
    pub async fn execute(&self, reading: DeviceReading) -> Result<UpsertOutcome> {
        let timestamp = reading.timestamp.unwrap_or_else(Utc::now).trunc_subsecs(6);

        let result = self
            .repository
            .upsert_within(&reading, timestamp, self.job_timeout)
            .await;

        match &result {
            Ok(outcome) => {
                metrics::record_job_succeeded();
                info!(
                    device_name = %reading.device_name,
                    device_type = %reading.device_type,
                    outcome = ?outcome,
                    "Reading persisted"
                );
            }
            Err(e) => {
                metrics::record_job_failed();
                error!(
                    device_name = %reading.device_name,
                    error = %e,
                    "Failed to persist reading"
                );
            }
        }

        result
    }
}
