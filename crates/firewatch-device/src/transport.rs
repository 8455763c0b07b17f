use crate::device::TelemetryDevice;
use firewatch_core::Result;
use firewatch_mqtt::{InboundMessage, MemoryBroker, MqttSettings, MqttTransport, Publisher, QoS};
use firewatch_types::DeviceReading;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// 模拟设备的接入方式
#[derive(Clone)]
pub enum DeviceTransport {
    /// 外部 broker，`client_id` 按设备替换
    Mqtt(MqttSettings),
    /// 进程内 broker
    Memory(MemoryBroker),
}

impl DeviceTransport {
    /// 设备客户端标识
    pub fn client_id(device_name: &str) -> String {
        format!("{}_1", device_name)
    }

    /// 为设备建立连接，接收指令的设备同时订阅其主题
    pub async fn connect(&self, device: &dyn TelemetryDevice) -> Result<DeviceLink> {
        let topic = device.topic().to_string();

        match self {
            DeviceTransport::Mqtt(settings) => {
                let mut settings = settings.clone();
                settings.client_id = Self::client_id(device.device_name());

                let (transport, rx) = MqttTransport::connect(&settings);
                if device.accepts_commands() {
                    transport.subscribe(&topic, QoS::ExactlyOnce).await?;
                }

                Ok(DeviceLink {
                    topic,
                    publisher: Arc::new(transport.clone()),
                    commands: Some(rx),
                    mqtt: Some(transport),
                })
            }
            DeviceTransport::Memory(broker) => {
                let commands = if device.accepts_commands() {
                    Some(broker.subscribe(&[topic.as_str()], 16).await)
                } else {
                    None
                };

                Ok(DeviceLink {
                    topic,
                    publisher: Arc::new(broker.clone()),
                    commands,
                    mqtt: None,
                })
            }
        }
    }
}

/// 单个设备的连接
pub struct DeviceLink {
    topic: String,
    publisher: Arc<dyn Publisher>,
    commands: Option<mpsc::Receiver<InboundMessage>>,
    mqtt: Option<MqttTransport>,
}

impl DeviceLink {
    /// 发布读数到设备主题
    pub async fn publish(&self, reading: &DeviceReading) -> Result<()> {
        let payload = reading.encode()?;
        self.publisher
            .publish(&self.topic, payload, QoS::AtLeastOnce)
            .await
    }

    /// 下一条指令主题消息，未订阅时永不返回
    pub async fn next_command(&mut self) -> InboundMessage {
        loop {
            match self.commands.as_mut() {
                Some(rx) => match rx.recv().await {
                    Some(message) => return message,
                    None => {
                        debug!(topic = %self.topic, "Command channel closed");
                        self.commands = None;
                    }
                },
                None => std::future::pending::<()>().await,
            }
        }
    }

    pub async fn close(self) {
        if let Some(transport) = self.mqtt {
            transport.shutdown().await;
        }
    }
}
