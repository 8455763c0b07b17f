use crate::error::Result;
use firewatch_core::entity::device_data;
use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, DatabaseConnection, Schema};
use tracing::info;

const NATURAL_KEY_INDEX: &str = "idx_device_data_name_timestamp";

/// 建表并创建 `(device_name, timestamp)` 唯一索引，可重复执行
pub async fn ensure_schema(db: &DatabaseConnection) -> Result<()> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let table = schema
        .create_table_from_entity(device_data::Entity)
        .if_not_exists()
        .to_owned();
    db.execute(backend.build(&table)).await?;

    let index = Index::create()
        .name(NATURAL_KEY_INDEX)
        .table(device_data::Entity)
        .col(device_data::Column::DeviceName)
        .col(device_data::Column::Timestamp)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(backend.build(&index)).await?;

    info!(backend = ?backend, "Database schema ready");
    Ok(())
}
