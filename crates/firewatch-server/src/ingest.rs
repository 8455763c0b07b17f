use crate::metrics;
use firewatch_core::{DedupGate, MessageIdentity};
use firewatch_mqtt::InboundMessage;
use firewatch_storage::JobQueue;
use firewatch_types::{DeviceReading, ValidationError};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// 单条消息的处理错误，只影响该消息
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Validation failed: {0}")]
    Invalid(#[from] ValidationError),

    #[error("Persistence queue is closed")]
    QueueClosed,
}

/// 入站读数处理
///
/// 解码、校验后提交持久化任务即返回，只会因队列满而等待。
#[derive(Clone)]
pub struct IngestionHandler {
    jobs: JobQueue,
}

impl IngestionHandler {
    pub fn new(jobs: JobQueue) -> Self {
        Self { jobs }
    }

    pub async fn handle(&self, payload: &[u8]) -> Result<(), IngestError> {
        let reading = DeviceReading::decode(payload)
            .map_err(|e| IngestError::MalformedPayload(e.to_string()))?;
        reading.validate()?;

        debug!(device_name = %reading.device_name, "Queueing reading for persistence");
        self.jobs
            .submit(reading)
            .await
            .map_err(|_| IngestError::QueueClosed)
    }
}

/// 入站消息消费循环
///
/// 传输层通道关闭后退出。
pub async fn run_pipeline(
    mut inbound: mpsc::Receiver<InboundMessage>,
    gate: Arc<DedupGate>,
    handler: IngestionHandler,
) {
    info!("Ingestion pipeline started");

    while let Some(message) = inbound.recv().await {
        metrics::record_message_received();

        let identity = MessageIdentity::from_message(&message.topic, &message.payload);
        if !gate.admit(&identity) {
            metrics::record_message_duplicate();
            debug!(topic = %message.topic, identity = %identity, "Duplicate message suppressed");
            continue;
        }

        match handler.handle(&message.payload).await {
            Ok(()) => {}
            Err(IngestError::MalformedPayload(e)) => {
                metrics::record_message_malformed();
                error!(topic = %message.topic, error = %e, "Dropping malformed payload");
            }
            Err(IngestError::Invalid(e)) => {
                metrics::record_message_invalid();
                warn!(topic = %message.topic, error = %e, "Dropping invalid reading");
            }
            Err(IngestError::QueueClosed) => {
                error!("Persistence queue closed, stopping ingestion pipeline");
                break;
            }
        }
    }

    info!("Ingestion pipeline stopped");
}
