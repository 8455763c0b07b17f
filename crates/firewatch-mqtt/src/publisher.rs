use async_trait::async_trait;
use bytes::Bytes;
use firewatch_core::Result;
use rumqttc::QoS;

/// 入站消息
///
/// 传输层不解析载荷，只负责把主题和原始字节推入通道。
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Bytes,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// 消息发布 trait
#[async_trait]
pub trait Publisher: Send + Sync {
    /// 向主题发布载荷
    async fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS) -> Result<()>;
}
