use crate::metrics;
use firewatch_core::Result;
use firewatch_mqtt::{Publisher, QoS};
use firewatch_types::topics::command_topic;
use firewatch_types::{CommandAction, DeviceCommand};
use std::sync::Arc;
use tracing::{debug, info};

/// 执行器指令分发
///
/// 指令以 QoS 2 发布到设备同名主题。动作非法时直接返回错误，不发布任何消息。
#[derive(Clone)]
pub struct CommandDispatcher {
    publisher: Arc<dyn Publisher>,
    qos: QoS,
}

impl CommandDispatcher {
    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        Self {
            publisher,
            qos: QoS::ExactlyOnce,
        }
    }

    pub fn with_qos(mut self, qos: QoS) -> Self {
        self.qos = qos;
        self
    }

    /// 向设备发送动作指令，返回已发布的指令
    pub async fn dispatch(&self, device_name: &str, action: &str) -> Result<DeviceCommand> {
        let action: CommandAction = action.parse()?;
        let command = DeviceCommand::new(device_name, action);
        let payload = command.encode()?;
        let topic = command_topic(device_name);

        debug!(topic = %topic, bytes = payload.len(), "Publishing command");
        self.publisher.publish(&topic, payload, self.qos).await?;

        metrics::record_command_dispatched();
        info!(
            device_name = %device_name,
            action = %action,
            "Command dispatched"
        );

        Ok(command)
    }
}
