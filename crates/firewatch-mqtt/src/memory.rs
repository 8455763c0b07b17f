use crate::publisher::{InboundMessage, Publisher};
use async_trait::async_trait;
use firewatch_core::Result;
use rumqttc::QoS;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};

/// 进程内消息代理
///
/// 按主题精确匹配投递，供测试和单机模式使用。订阅方通道满时丢弃消息，
/// 与外部 broker 断连时的丢失语义一致。
#[derive(Clone, Default)]
pub struct MemoryBroker {
    subscribers: Arc<RwLock<HashMap<String, Vec<mpsc::Sender<InboundMessage>>>>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以一个客户端身份订阅多个主题，返回其入站通道
    pub async fn subscribe(&self, topics: &[&str], capacity: usize) -> mpsc::Receiver<InboundMessage> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let mut subscribers = self.subscribers.write().await;
        for topic in topics {
            subscribers
                .entry(topic.to_string())
                .or_default()
                .push(tx.clone());
        }
        rx
    }

    /// 主题当前的活跃订阅数
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.subscribers
            .read()
            .await
            .get(topic)
            .map(|subs| subs.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    /// 移除全部订阅，订阅方通道随之关闭
    pub async fn close(&self) {
        self.subscribers.write().await.clear();
        debug!("Memory broker closed");
    }
}

#[async_trait]
impl Publisher for MemoryBroker {
    async fn publish(&self, topic: &str, payload: Vec<u8>, _qos: QoS) -> Result<()> {
        let targets = match self.subscribers.read().await.get(topic) {
            Some(subs) => subs.clone(),
            None => {
                debug!(topic = %topic, "No subscribers for topic");
                return Ok(());
            }
        };

        let message = InboundMessage::new(topic, payload);
        for tx in targets {
            match tx.try_send(message.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(topic = %topic, "Subscriber channel full, message dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_exact_topic_delivery() {
        let broker = MemoryBroker::new();
        let mut server = broker
            .subscribe(&["fire_sensor", "water_level_detector"], 10)
            .await;
        let mut sprinkler = broker.subscribe(&["sprinkler_handler"], 10).await;

        broker
            .publish("fire_sensor", b"hello".to_vec(), QoS::ExactlyOnce)
            .await
            .unwrap();

        let msg = server.recv().await.unwrap();
        assert_eq!(msg.topic, "fire_sensor");
        assert_eq!(&msg.payload[..], b"hello");
        assert!(sprinkler.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_full_subscriber_drops() {
        let broker = MemoryBroker::new();
        let mut rx = broker.subscribe(&["fire_sensor"], 1).await;

        for i in 0..3u8 {
            broker
                .publish("fire_sensor", vec![i], QoS::AtLeastOnce)
                .await
                .unwrap();
        }

        assert_eq!(&rx.recv().await.unwrap().payload[..], &[0]);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_subscriber_ignored() {
        let broker = MemoryBroker::new();
        let rx = broker.subscribe(&["fire_sensor"], 4).await;
        assert_eq!(broker.subscriber_count("fire_sensor").await, 1);

        drop(rx);
        assert_eq!(broker.subscriber_count("fire_sensor").await, 0);
        assert!(broker
            .publish("fire_sensor", vec![1], QoS::AtMostOnce)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_close_ends_subscriptions() {
        let broker = MemoryBroker::new();
        let mut rx = broker.subscribe(&["fire_sensor"], 4).await;

        broker.close().await;
        assert!(rx.recv().await.is_none());
        assert_eq!(broker.subscriber_count("fire_sensor").await, 0);
    }
}
