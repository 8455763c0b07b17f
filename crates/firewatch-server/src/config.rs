use config::{Config, Environment, File};
use firewatch_core::dedup::DedupConfig;
use firewatch_core::{FirewatchError, Result};
use firewatch_mqtt::MqttSettings;
use firewatch_storage::WorkerPoolConfig;
use sea_orm::ConnectOptions;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// 环境变量前缀，如 `FIREWATCH__SERVER__PORT=8080`
pub const ENV_PREFIX: &str = "FIREWATCH";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub dedup: DedupSection,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MqttConfig {
    #[serde(default = "default_mqtt_host")]
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    #[serde(default = "default_mqtt_client_id")]
    pub client_id: String,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// 使用进程内 broker，不连接外部 MQTT 服务
    #[serde(default)]
    pub embedded: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DedupSection {
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PersistenceConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SimulatorConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_simulator_interval_secs")]
    pub interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_listen")]
    pub listen: String,
}

// 默认值函数
fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    5000
}

fn default_database_url() -> String {
    "sqlite::memory:".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_mqtt_host() -> String {
    "localhost".to_string()
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_mqtt_client_id() -> String {
    "firewatch-server".to_string()
}

fn default_keep_alive_secs() -> u64 {
    60
}

fn default_reconnect_delay_secs() -> u64 {
    1
}

fn default_channel_capacity() -> usize {
    256
}

fn default_retention_secs() -> u64 {
    600
}

fn default_max_entries() -> usize {
    100_000
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_workers() -> usize {
    4
}

fn default_job_timeout_secs() -> u64 {
    10
}

fn default_simulator_interval_secs() -> u64 {
    1
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_listen() -> String {
    "0.0.0.0:9000".to_string()
}

// Default trait 实现
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            client_id: default_mqtt_client_id(),
            keep_alive_secs: default_keep_alive_secs(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
            channel_capacity: default_channel_capacity(),
            embedded: false,
        }
    }
}

impl Default for DedupSection {
    fn default() -> Self {
        Self {
            retention_secs: default_retention_secs(),
            max_entries: default_max_entries(),
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            workers: default_workers(),
            job_timeout_secs: default_job_timeout_secs(),
        }
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_simulator_interval_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: default_metrics_listen(),
        }
    }
}

impl AppConfig {
    /// 加载配置文件并叠加环境变量，文件不存在时使用默认值
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| FirewatchError::Config(e.to_string()))?;

        let app_config: AppConfig = config
            .try_deserialize()
            .map_err(|e| FirewatchError::Config(e.to_string()))?;
        app_config.validate()?;

        Ok(app_config)
    }

    /// 检查取值范围
    pub fn validate(&self) -> Result<()> {
        if self.persistence.workers == 0 {
            return Err(FirewatchError::Config(
                "persistence.workers must be > 0".to_string(),
            ));
        }
        if self.persistence.queue_capacity == 0 {
            return Err(FirewatchError::Config(
                "persistence.queue_capacity must be > 0".to_string(),
            ));
        }
        if self.persistence.job_timeout_secs == 0 {
            return Err(FirewatchError::Config(
                "persistence.job_timeout_secs must be > 0".to_string(),
            ));
        }
        if self.dedup.max_entries == 0 {
            return Err(FirewatchError::Config(
                "dedup.max_entries must be > 0".to_string(),
            ));
        }
        if self.simulator.enabled && self.simulator.interval_secs == 0 {
            return Err(FirewatchError::Config(
                "simulator.interval_secs must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl DatabaseConfig {
    /// 内存 SQLite 每个连接各自一份数据库，只能使用单连接
    pub fn is_in_memory(&self) -> bool {
        self.url.starts_with("sqlite") && self.url.contains(":memory:")
    }

    pub fn connect_options(&self) -> ConnectOptions {
        let max_connections = if self.is_in_memory() {
            1
        } else {
            self.max_connections.max(1)
        };

        let mut options = ConnectOptions::new(self.url.clone());
        options
            .max_connections(max_connections)
            .sqlx_logging(false);
        options
    }
}

impl MqttConfig {
    pub fn settings(&self) -> MqttSettings {
        MqttSettings::new(&self.client_id, &self.host, self.port)
            .with_keep_alive(Duration::from_secs(self.keep_alive_secs))
            .with_reconnect_delay(Duration::from_secs(self.reconnect_delay_secs))
            .with_channel_capacity(self.channel_capacity)
    }
}

impl DedupSection {
    pub fn gate_config(&self) -> DedupConfig {
        DedupConfig {
            retention: Duration::from_secs(self.retention_secs),
            max_entries: self.max_entries,
        }
    }
}

impl PersistenceConfig {
    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    pub fn pool_config(&self) -> WorkerPoolConfig {
        WorkerPoolConfig {
            queue_capacity: self.queue_capacity,
            workers: self.workers,
            job_timeout: self.job_timeout(),
        }
    }
}

impl SimulatorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}
