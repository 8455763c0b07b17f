use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 执行器指令动作
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CommandAction {
    Start,
    Stop,
}

impl CommandAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandAction::Start => "start",
            CommandAction::Stop => "stop",
        }
    }

    /// 执行器确认该动作后上报的 `current_action`
    pub fn resulting_state(&self) -> &'static str {
        match self {
            CommandAction::Start => "started",
            CommandAction::Stop => "stopped",
        }
    }
}

impl fmt::Display for CommandAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandAction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(CommandAction::Start),
            "stop" => Ok(CommandAction::Stop),
            other => Err(ValidationError::InvalidAction(other.to_string())),
        }
    }
}

/// 设备指令
///
/// 只以发布消息的形式存在，不直接持久化；执行效果通过随后带
/// `current_action` 的读数观察到。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceCommand {
    pub device_name: String,
    pub device_type: String,
    pub action: CommandAction,
    #[serde(with = "crate::timestamp::required")]
    pub timestamp: DateTime<Utc>,
    /// 占位坐标
    pub latitude: f64,
    pub longitude: f64,
}

impl DeviceCommand {
    pub fn new(device_name: impl Into<String>, action: CommandAction) -> Self {
        let device_name = device_name.into();
        Self {
            device_type: device_name.clone(),
            device_name,
            action,
            timestamp: Utc::now(),
            latitude: 0.0,
            longitude: 0.0,
        }
    }

    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}
