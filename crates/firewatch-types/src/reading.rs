use crate::error::{Result, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 字符串字段最大长度
pub const MAX_FIELD_LEN: usize = 50;

/// 水位上限（百分比）
pub const MAX_WATER_LEVEL: i32 = 100;

/// 设备读数
///
/// 传感器观测值与执行器状态回报共用同一结构。`(device_name, timestamp)`
/// 是持久化的自然键，`timestamp` 为设备侧的逻辑事件时间而非入库时间。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceReading {
    pub device_name: String,

    pub device_type: String,

    /// 缺省时由持久化任务在执行时刻补齐
    #[serde(
        default,
        with = "crate::timestamp::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<DateTime<Utc>>,

    pub latitude: f64,

    pub longitude: f64,

    /// 传感器状态，如 `fire_detected` / `no_fire`
    #[serde(default)]
    pub status: Option<String>,

    /// 水位 0-100
    #[serde(default)]
    pub water_level: Option<i32>,

    /// 请求的执行动作（`start` / `stop`）
    #[serde(default)]
    pub action: Option<String>,

    /// 执行器确认后的当前状态
    #[serde(default)]
    pub current_action: Option<String>,
}

impl DeviceReading {
    pub fn new(device_name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        let device_name = device_name.into();
        Self {
            device_type: device_name.clone(),
            device_name,
            timestamp: Some(Utc::now()),
            latitude,
            longitude,
            status: None,
            water_level: None,
            action: None,
            current_action: None,
        }
    }

    pub fn with_device_type(mut self, device_type: impl Into<String>) -> Self {
        self.device_type = device_type.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn without_timestamp(mut self) -> Self {
        self.timestamp = None;
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_water_level(mut self, water_level: i32) -> Self {
        self.water_level = Some(water_level);
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_current_action(mut self, current_action: impl Into<String>) -> Self {
        self.current_action = Some(current_action.into());
        self
    }

    /// 从 UTF-8 JSON 载荷解码
    pub fn decode(payload: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(payload)
    }

    /// 编码为 JSON 载荷
    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// 校验字段范围与长度
    ///
    /// 经纬度边界包含在内，NaN 视为越界。时间戳允许缺省。
    pub fn validate(&self) -> Result<()> {
        check_required("device_name", &self.device_name)?;
        check_required("device_type", &self.device_type)?;

        check_range("latitude", self.latitude, -90.0, 90.0)?;
        check_range("longitude", self.longitude, -180.0, 180.0)?;

        if let Some(level) = self.water_level {
            check_range("water_level", level as f64, 0.0, MAX_WATER_LEVEL as f64)?;
        }

        check_optional("status", self.status.as_deref())?;
        check_optional("action", self.action.as_deref())?;
        check_optional("current_action", self.current_action.as_deref())?;

        Ok(())
    }

    /// 严格校验：在 [`validate`](Self::validate) 基础上要求时间戳存在
    pub fn validate_strict(&self) -> Result<()> {
        self.validate()?;
        if self.timestamp.is_none() {
            return Err(ValidationError::MissingField("timestamp"));
        }
        Ok(())
    }
}

fn check_required(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    check_optional(field, Some(value))
}

fn check_optional(field: &'static str, value: Option<&str>) -> Result<()> {
    match value {
        Some(v) if v.chars().count() > MAX_FIELD_LEN => Err(ValidationError::TooLong {
            field,
            max: MAX_FIELD_LEN,
        }),
        _ => Ok(()),
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<()> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            field,
            min,
            max,
            value,
        })
    }
}
