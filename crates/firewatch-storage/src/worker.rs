use crate::error::{PersistError, Result};
use crate::executor::PersistenceExecutor;
use firewatch_types::DeviceReading;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// 工作池配置
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// 队列容量，满时提交方等待
    pub queue_capacity: usize,
    /// 并发执行的任务数
    pub workers: usize,
    /// 单个任务超时
    pub job_timeout: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            workers: 4,
            job_timeout: Duration::from_secs(10),
        }
    }
}

/// 持久化任务队列句柄
#[derive(Clone)]
pub struct JobQueue {
    sender: mpsc::Sender<DeviceReading>,
}

impl JobQueue {
    /// 提交任务
    ///
    /// 只等待队列容量，不等待持久化完成。
    pub async fn submit(&self, reading: DeviceReading) -> Result<()> {
        self.sender
            .send(reading)
            .await
            .map_err(|_| PersistError::QueueClosed)
    }

    /// 队列剩余容量
    pub fn capacity(&self) -> usize {
        self.sender.capacity()
    }
}

/// 持久化工作池
///
/// 所有 `JobQueue` 句柄被丢弃后，调度循环排空队列并等待在途任务结束。
pub struct PersistenceWorkerPool {
    handle: JoinHandle<()>,
}

impl PersistenceWorkerPool {
    /// 启动工作池，需在 tokio 运行时内调用
    pub fn spawn(executor: PersistenceExecutor, config: WorkerPoolConfig) -> (JobQueue, Self) {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let workers = config.workers.max(1);

        info!(
            queue_capacity = config.queue_capacity,
            workers = workers,
            job_timeout = ?config.job_timeout,
            "Starting persistence worker pool"
        );

        let handle = tokio::spawn(Self::run(executor, receiver, workers));
        (JobQueue { sender }, Self { handle })
    }

    async fn run(
        executor: PersistenceExecutor,
        mut receiver: mpsc::Receiver<DeviceReading>,
        workers: usize,
    ) {
        let permits = Arc::new(Semaphore::new(workers));

        while let Some(reading) = receiver.recv().await {
            let permit = match permits.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let executor = executor.clone();

            tokio::spawn(async move {
                // 失败已由执行器记录，不影响其他任务
                let _ = executor.execute(reading).await;
                drop(permit);
            });
        }

        debug!("Job queue closed, waiting for in-flight jobs");
        if permits.acquire_many(workers as u32).await.is_err() {
            warn!("Worker semaphore closed before drain");
        }
        info!("Persistence worker pool stopped");
    }

    /// 等待工作池排空
    pub async fn join(self) {
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Persistence worker pool task failed");
        }
    }

    /// 立即停止调度，队列中未执行的任务被丢弃
    pub async fn abort(self) {
        self.handle.abort();
        if let Err(e) = self.handle.await {
            if !e.is_cancelled() {
                warn!(error = %e, "Persistence worker pool task failed");
            }
        }
        warn!("Persistence worker pool aborted");
    }
}
