use crate::error::{PersistError, Result};
use chrono::{DateTime, Utc};
use firewatch_core::entity::device_data;
use firewatch_types::DeviceReading;
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    DbBackend, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// upsert 结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// 设备读数仓储
///
/// 以 `(device_name, timestamp)` 为自然键：同键写入覆盖可变字段，
/// `device_type` 与键本身保持不变。
///
/// SQLite 的延迟事务在“先读后写”时无法升级写锁，多个连接并发写入会直接返回
/// `SQLITE_BUSY`，因此 SQLite 后端的写事务在进程内串行执行。
#[derive(Clone)]
pub struct ReadingRepository {
    db: Arc<DatabaseConnection>,
    write_lock: Option<Arc<Mutex<()>>>,
}

impl ReadingRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        let write_lock = match db.get_database_backend() {
            DbBackend::Sqlite => Some(Arc::new(Mutex::new(()))),
            _ => None,
        };
        Self { db, write_lock }
    }

    /// 获取数据库连接
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// 在独立事务中执行 upsert
    ///
    /// 查询、更新/插入任一步失败都会回滚，不提交任何部分写入。
    pub async fn upsert(
        &self,
        reading: &DeviceReading,
        timestamp: DateTime<Utc>,
    ) -> Result<UpsertOutcome> {
        self.upsert_bounded(reading, timestamp, None).await
    }

    /// 带时限的 upsert
    ///
    /// 时限覆盖等待写锁与查询、写入阶段，不覆盖提交。超时后显式回滚并返回
    /// [`PersistError::Timeout`]，已报告超时的任务不会被提交。
    pub async fn upsert_within(
        &self,
        reading: &DeviceReading,
        timestamp: DateTime<Utc>,
        limit: Duration,
    ) -> Result<UpsertOutcome> {
        self.upsert_bounded(reading, timestamp, Some(limit)).await
    }

    async fn upsert_bounded(
        &self,
        reading: &DeviceReading,
        timestamp: DateTime<Utc>,
        limit: Option<Duration>,
    ) -> Result<UpsertOutcome> {
        let deadline = limit.map(|limit| (Instant::now() + limit, limit));

        let _guard = match &self.write_lock {
            Some(lock) => Some(within(deadline, lock.lock()).await?),
            None => None,
        };

        let txn = self.db.begin().await?;

        let result = within(deadline, Self::upsert_in(&txn, reading, timestamp))
            .await
            .and_then(|result| result);

        match result {
            Ok(outcome) => {
                txn.commit().await?;
                Ok(outcome)
            }
            Err(e) => {
                if let Err(rollback_err) = txn.rollback().await {
                    warn!(
                        device_name = %reading.device_name,
                        error = %rollback_err,
                        "Rollback failed"
                    );
                }
                Err(e)
            }
        }
    }

    async fn upsert_in(
        txn: &DatabaseTransaction,
        reading: &DeviceReading,
        timestamp: DateTime<Utc>,
    ) -> Result<UpsertOutcome> {
        let existing = device_data::Entity::find()
            .filter(device_data::Column::DeviceName.eq(reading.device_name.as_str()))
            .filter(device_data::Column::Timestamp.eq(timestamp))
            .one(txn)
            .await?;

        match existing {
            Some(model) => {
                let id = model.id;
                let mut active: device_data::ActiveModel = model.into();
                active.latitude = Set(reading.latitude);
                active.longitude = Set(reading.longitude);
                active.status = Set(reading.status.clone());
                active.water_level = Set(reading.water_level);
                active.action = Set(reading.action.clone());
                active.current_action = Set(reading.current_action.clone());
                active.update(txn).await?;

                debug!(id = id, device_name = %reading.device_name, "Reading updated");
                Ok(UpsertOutcome::Updated)
            }
            None => {
                let active = device_data::ActiveModel {
                    id: NotSet,
                    device_name: Set(reading.device_name.clone()),
                    device_type: Set(reading.device_type.clone()),
                    timestamp: Set(timestamp),
                    latitude: Set(reading.latitude),
                    longitude: Set(reading.longitude),
                    status: Set(reading.status.clone()),
                    water_level: Set(reading.water_level),
                    action: Set(reading.action.clone()),
                    current_action: Set(reading.current_action.clone()),
                };
                device_data::Entity::insert(active).exec(txn).await?;

                debug!(device_name = %reading.device_name, "Reading inserted");
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    /// 设备最新读数
    pub async fn latest(&self, device_name: &str) -> Result<Option<DeviceReading>> {
        let model = device_data::Entity::find()
            .filter(device_data::Column::DeviceName.eq(device_name))
            .order_by_desc(device_data::Column::Timestamp)
            .order_by_desc(device_data::Column::Id)
            .one(&*self.db)
            .await?;

        Ok(model.map(DeviceReading::from))
    }

    /// 闭区间 `[from, to]` 内的读数，按时间倒序
    pub async fn range(
        &self,
        device_name: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<DeviceReading>> {
        let models = device_data::Entity::find()
            .filter(device_data::Column::DeviceName.eq(device_name))
            .filter(device_data::Column::Timestamp.between(from, to))
            .order_by_desc(device_data::Column::Timestamp)
            .order_by_desc(device_data::Column::Id)
            .all(&*self.db)
            .await?;

        debug!(
            device_name = %device_name,
            count = models.len(),
            "Queried readings in range"
        );

        Ok(models.into_iter().map(DeviceReading::from).collect())
    }

    /// 设备最近的若干条读数，按时间倒序
    pub async fn recent(&self, device_name: &str, limit: u64) -> Result<Vec<DeviceReading>> {
        let models = device_data::Entity::find()
            .filter(device_data::Column::DeviceName.eq(device_name))
            .order_by_desc(device_data::Column::Timestamp)
            .order_by_desc(device_data::Column::Id)
            .limit(limit)
            .all(&*self.db)
            .await?;

        Ok(models.into_iter().map(DeviceReading::from).collect())
    }

    /// 行数统计，`device_name` 为空时统计全部
    pub async fn count(&self, device_name: Option<&str>) -> Result<u64> {
        let mut query = device_data::Entity::find();
        if let Some(name) = device_name {
            query = query.filter(device_data::Column::DeviceName.eq(name));
        }
        Ok(query.count(&*self.db).await?)
    }
}

/// 在截止时间前等待 future 完成，未设置截止时间时不限时
async fn within<F: Future>(
    deadline: Option<(Instant, Duration)>,
    future: F,
) -> Result<F::Output> {
    match deadline {
        Some((at, limit)) => tokio::time::timeout_at(at, future)
            .await
            .map_err(|_| PersistError::Timeout(limit)),
        None => Ok(future.await),
    }
}
