use firewatch_types::DeviceReading;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 设备读数实体
///
/// `(device_name, timestamp)` 上建有唯一索引，见 storage 的 schema 初始化。
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "device_data")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub device_name: String,
    pub device_type: String,
    pub timestamp: DateTimeUtc,
    pub latitude: f64,
    pub longitude: f64,
    pub status: Option<String>,
    pub water_level: Option<i32>,
    pub action: Option<String>,
    pub current_action: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for DeviceReading {
    fn from(model: Model) -> Self {
        Self {
            device_name: model.device_name,
            device_type: model.device_type,
            timestamp: Some(model.timestamp),
            latitude: model.latitude,
            longitude: model.longitude,
            status: model.status,
            water_level: model.water_level,
            action: model.action,
            current_action: model.current_action,
        }
    }
}
