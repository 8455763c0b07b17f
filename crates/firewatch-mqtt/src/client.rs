use crate::publisher::{InboundMessage, Publisher};
use async_trait::async_trait;
use firewatch_core::{FirewatchError, Result};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify, RwLock};
use tracing::{debug, info, warn};

/// MQTT 连接参数
#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    /// 心跳间隔
    pub keep_alive: Duration,
    /// 连接出错后到下一次轮询的等待时间
    pub reconnect_delay: Duration,
    /// 入站通道容量
    pub channel_capacity: usize,
}

impl MqttSettings {
    pub fn new(client_id: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            client_id: client_id.into(),
            keep_alive: Duration::from_secs(60),
            reconnect_delay: Duration::from_secs(1),
            channel_capacity: 256,
        }
    }

    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }
}

/// MQTT 传输客户端
///
/// 网络事件循环运行在独立任务中，收到的每条消息推入有界通道，由单一消费者处理。
/// 连接断开后按固定间隔无限重试，重连成功时重新订阅全部主题。
#[derive(Clone)]
pub struct MqttTransport {
    client: AsyncClient,

    /// 已订阅主题，重连后据此恢复
    subscriptions: Arc<RwLock<Vec<(String, QoS)>>>,

    shutdown: Arc<Notify>,
}

impl MqttTransport {
    /// 建立连接并启动事件循环
    ///
    /// 必须在 tokio 运行时内调用。
    pub fn connect(settings: &MqttSettings) -> (Self, mpsc::Receiver<InboundMessage>) {
        let mut mqtt_options =
            MqttOptions::new(&settings.client_id, &settings.host, settings.port);
        mqtt_options.set_keep_alive(settings.keep_alive);
        mqtt_options.set_clean_session(true);

        let (client, eventloop) = AsyncClient::new(mqtt_options, 10);
        let (tx, rx) = mpsc::channel(settings.channel_capacity.max(1));

        let subscriptions = Arc::new(RwLock::new(Vec::new()));
        let shutdown = Arc::new(Notify::new());

        tokio::spawn(Self::handle_events(
            eventloop,
            client.clone(),
            subscriptions.clone(),
            tx,
            settings.reconnect_delay,
            shutdown.clone(),
        ));

        info!(
            broker = %format!("{}:{}", settings.host, settings.port),
            client_id = %settings.client_id,
            keep_alive_secs = settings.keep_alive.as_secs(),
            "MQTT transport created"
        );

        (
            Self {
                client,
                subscriptions,
                shutdown,
            },
            rx,
        )
    }

    /// 订阅主题
    pub async fn subscribe(&self, topic: &str, qos: QoS) -> Result<()> {
        {
            let mut subscriptions = self.subscriptions.write().await;
            if !subscriptions.iter().any(|(t, _)| t == topic) {
                subscriptions.push((topic.to_string(), qos));
            }
        }

        self.client
            .subscribe(topic, qos)
            .await
            .map_err(|e| FirewatchError::transport(format!("subscribe {}: {}", topic, e)))?;

        info!(topic = %topic, qos = ?qos, "Subscribed to topic");
        Ok(())
    }

    /// 断开连接并停止事件循环
    pub async fn shutdown(&self) {
        if let Err(e) = self.client.disconnect().await {
            debug!(error = %e, "MQTT disconnect request failed");
        }
        self.shutdown.notify_one();
    }

    async fn handle_events(
        mut eventloop: EventLoop,
        client: AsyncClient,
        subscriptions: Arc<RwLock<Vec<(String, QoS)>>>,
        inbound: mpsc::Sender<InboundMessage>,
        reconnect_delay: Duration,
        shutdown: Arc<Notify>,
    ) {
        let mut session = SessionState::default();

        loop {
            let event = tokio::select! {
                _ = shutdown.notified() => break,
                event = eventloop.poll() => event,
            };

            match event {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    info!(code = ?ack.code, "Connected to MQTT broker");
                    let subscriptions = subscriptions.read().await.clone();
                    session.on_connack(&client, &subscriptions);
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let message = InboundMessage::new(publish.topic.clone(), publish.payload.clone());
                    if inbound.send(message).await.is_err() {
                        info!("Inbound channel closed");
                        break;
                    }
                }
                Ok(Event::Incoming(packet)) => {
                    debug!(?packet, "Received MQTT packet");
                }
                Ok(Event::Outgoing(_)) => {}
                Err(e) => {
                    warn!(
                        error = %e,
                        retry_in_ms = reconnect_delay.as_millis() as u64,
                        "MQTT connection error, will reconnect"
                    );
                    tokio::select! {
                        _ = shutdown.notified() => break,
                        _ = tokio::time::sleep(reconnect_delay) => {}
                    }
                }
            }
        }

        info!("MQTT event loop stopped");
    }
}

/// 重新下发订阅请求的目标
trait Resubscribe {
    fn resubscribe(&self, topic: &str, qos: QoS) -> Result<()>;
}

impl Resubscribe for AsyncClient {
    fn resubscribe(&self, topic: &str, qos: QoS) -> Result<()> {
        self.try_subscribe(topic, qos)
            .map_err(|e| FirewatchError::transport(format!("subscribe {}: {}", topic, e)))
    }
}

/// 连接会话状态
///
/// 首次 ConnAck 时订阅请求已在客户端队列中；之后每次 ConnAck 都是重连，
/// 需要把已记录的订阅重新下发。
#[derive(Debug, Default)]
struct SessionState {
    connected_once: bool,
}

impl SessionState {
    /// 处理 ConnAck，返回重新下发的订阅数量
    fn on_connack(&mut self, client: &impl Resubscribe, subscriptions: &[(String, QoS)]) -> usize {
        if !self.connected_once {
            self.connected_once = true;
            return 0;
        }

        info!(
            topics = subscriptions.len(),
            "Reconnected to MQTT broker, restoring subscriptions"
        );

        let mut restored = 0;
        for (topic, qos) in subscriptions {
            match client.resubscribe(topic, *qos) {
                Ok(()) => restored += 1,
                Err(e) => warn!(topic = %topic, error = %e, "Failed to restore subscription"),
            }
        }
        restored
    }
}

#[async_trait]
impl Publisher for MqttTransport {
    async fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS) -> Result<()> {
        let size = payload.len();
        self.client
            .publish(topic, qos, false, payload)
            .await
            .map_err(|e| FirewatchError::transport(format!("publish {}: {}", topic, e)))?;

        debug!(topic = %topic, bytes = size, "Published message");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingClient {
        requests: Mutex<Vec<(String, QoS)>>,
        fail_topic: Option<&'static str>,
    }

    impl Resubscribe for RecordingClient {
        fn resubscribe(&self, topic: &str, qos: QoS) -> Result<()> {
            if self.fail_topic == Some(topic) {
                return Err(FirewatchError::transport("request queue full"));
            }
            self.requests.lock().unwrap().push((topic.to_string(), qos));
            Ok(())
        }
    }

    fn recorded() -> Vec<(String, QoS)> {
        vec![
            ("fire_sensor".to_string(), QoS::ExactlyOnce),
            ("water_level_detector".to_string(), QoS::AtLeastOnce),
        ]
    }

    #[test]
    fn test_first_connack_does_not_resubscribe() {
        let client = RecordingClient::default();
        let mut session = SessionState::default();

        assert_eq!(session.on_connack(&client, &recorded()), 0);
        assert!(client.requests.lock().unwrap().is_empty());
    }

    #[test]
    fn test_reconnect_restores_every_subscription() {
        let client = RecordingClient::default();
        let mut session = SessionState::default();

        session.on_connack(&client, &recorded());
        assert_eq!(session.on_connack(&client, &recorded()), 2);
        assert_eq!(*client.requests.lock().unwrap(), recorded());

        // 每次重连都重新下发
        session.on_connack(&client, &recorded());
        assert_eq!(client.requests.lock().unwrap().len(), 4);
    }

    #[test]
    fn test_failed_restore_does_not_stop_others() {
        let client = RecordingClient {
            fail_topic: Some("fire_sensor"),
            ..Default::default()
        };
        let mut session = SessionState::default();

        session.on_connack(&client, &recorded());
        assert_eq!(session.on_connack(&client, &recorded()), 1);
        assert_eq!(
            *client.requests.lock().unwrap(),
            vec![("water_level_detector".to_string(), QoS::AtLeastOnce)]
        );
    }

    #[test]
    fn test_settings_defaults() {
        let settings = MqttSettings::new("firewatch-server", "localhost", 1883);
        assert_eq!(settings.keep_alive, Duration::from_secs(60));
        assert_eq!(settings.reconnect_delay, Duration::from_secs(1));

        let settings = settings
            .with_keep_alive(Duration::from_secs(30))
            .with_channel_capacity(8);
        assert_eq!(settings.keep_alive, Duration::from_secs(30));
        assert_eq!(settings.channel_capacity, 8);
    }

    #[tokio::test]
    async fn test_subscriptions_recorded_once() {
        // 未连接时请求进入客户端队列，不需要真实 broker
        let settings = MqttSettings::new("firewatch-test", "127.0.0.1", 1);
        let (transport, _rx) = MqttTransport::connect(&settings);

        transport.subscribe("fire_sensor", QoS::ExactlyOnce).await.unwrap();
        transport.subscribe("fire_sensor", QoS::ExactlyOnce).await.unwrap();
        transport
            .subscribe("water_level_detector", QoS::ExactlyOnce)
            .await
            .unwrap();

        assert_eq!(transport.subscriptions.read().await.len(), 2);
        transport.shutdown().await;
    }
}
