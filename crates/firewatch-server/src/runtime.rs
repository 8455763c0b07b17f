use crate::config::AppConfig;
use crate::ingest::{run_pipeline, IngestionHandler};
use crate::metrics::init_metrics;
use crate::shutdown::shutdown_signal;
use crate::{api, AppState};
use anyhow::Context;
use axum::Router;
use firewatch_control::CommandDispatcher;
use firewatch_core::DedupGate;
use firewatch_device::{standard_fleet, DeviceSimulator, DeviceTransport, SimulatorHandle};
use firewatch_mqtt::{MemoryBroker, MqttTransport, Publisher, QoS};
use firewatch_storage::{
    ensure_schema, PersistenceExecutor, PersistenceWorkerPool, ReadingRepository,
};
use firewatch_types::topics::SUBSCRIBED_TOPICS;
use sea_orm::Database;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// 服务端使用的消息通道
enum BrokerLink {
    Mqtt(MqttTransport),
    Memory(MemoryBroker),
}

/// 运行中的服务组件
///
/// 关闭顺序：模拟设备 → 传输层 → 消费循环 → 持久化队列。
pub struct Runtime {
    state: Arc<AppState>,
    broker: BrokerLink,
    pipeline: JoinHandle<()>,
    pool: PersistenceWorkerPool,
    simulator: Option<SimulatorHandle>,
    drain_timeout: Duration,
}

impl Runtime {
    pub async fn start(config: &AppConfig) -> anyhow::Result<Self> {
        let db = Database::connect(config.database.connect_options())
            .await
            .with_context(|| format!("Failed to connect to database {}", config.database.url))?;
        ensure_schema(&db).await?;

        let repository = ReadingRepository::new(Arc::new(db));
        let executor =
            PersistenceExecutor::new(repository.clone(), config.persistence.job_timeout());
        let (jobs, pool) = PersistenceWorkerPool::spawn(executor, config.persistence.pool_config());

        let (broker, inbound, publisher, device_transport) = if config.mqtt.embedded {
            let broker = MemoryBroker::new();
            let inbound = broker
                .subscribe(&SUBSCRIBED_TOPICS, config.mqtt.channel_capacity)
                .await;
            info!("Using embedded in-process broker");

            let publisher: Arc<dyn Publisher> = Arc::new(broker.clone());
            (
                BrokerLink::Memory(broker.clone()),
                inbound,
                publisher,
                DeviceTransport::Memory(broker),
            )
        } else {
            let settings = config.mqtt.settings();
            let (transport, inbound) = MqttTransport::connect(&settings);
            for topic in SUBSCRIBED_TOPICS {
                transport.subscribe(topic, QoS::ExactlyOnce).await?;
            }

            let publisher: Arc<dyn Publisher> = Arc::new(transport.clone());
            (
                BrokerLink::Mqtt(transport),
                inbound,
                publisher,
                DeviceTransport::Mqtt(settings),
            )
        };

        let gate = Arc::new(DedupGate::new(config.dedup.gate_config()));
        let pipeline = tokio::spawn(run_pipeline(
            inbound,
            gate,
            IngestionHandler::new(jobs.clone()),
        ));

        let simulator = if config.simulator.enabled {
            let fleet = standard_fleet(&mut rand::thread_rng());
            let handle = DeviceSimulator::new(fleet, device_transport, config.simulator.interval())
                .start()
                .await?;
            Some(handle)
        } else {
            None
        };

        let state = Arc::new(AppState {
            repository,
            jobs,
            dispatcher: CommandDispatcher::new(publisher),
        });

        Ok(Self {
            state,
            broker,
            pipeline,
            pool,
            simulator,
            drain_timeout: config.persistence.job_timeout() * 2,
        })
    }

    pub fn state(&self) -> Arc<AppState> {
        self.state.clone()
    }

    pub fn router(&self) -> Router {
        api::create_router(self.state.clone())
    }

    /// 嵌入模式下的进程内 broker
    pub fn memory_broker(&self) -> Option<&MemoryBroker> {
        match &self.broker {
            BrokerLink::Memory(broker) => Some(broker),
            BrokerLink::Mqtt(_) => None,
        }
    }

    /// 按依赖顺序停止各组件，等待已入队的任务落库
    pub async fn shutdown(self) {
        info!("Shutting down");

        if let Some(simulator) = self.simulator {
            simulator.stop().await;
        }

        match &self.broker {
            BrokerLink::Mqtt(transport) => transport.shutdown().await,
            BrokerLink::Memory(broker) => broker.close().await,
        }

        if let Err(e) = self.pipeline.await {
            warn!(error = %e, "Ingestion pipeline task failed");
        }

        drop(self.state);
        if tokio::time::timeout(self.drain_timeout, self.pool.join())
            .await
            .is_err()
        {
            warn!(
                timeout = ?self.drain_timeout,
                "Timed out waiting for persistence queue to drain"
            );
        }

        info!("Shutdown complete");
    }
}

/// 启动全部组件并提供 HTTP 服务，收到关闭信号后依序退出
pub async fn serve(config: AppConfig) -> anyhow::Result<()> {
    if config.metrics.enabled {
        let addr: SocketAddr = config
            .metrics
            .listen
            .parse()
            .with_context(|| format!("Invalid metrics listen address {}", config.metrics.listen))?;
        init_metrics(addr)?;
    }

    let runtime = Runtime::start(&config).await?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(addr = %addr, "HTTP API listening");

    let result = axum::serve(listener, runtime.router())
        .with_graceful_shutdown(shutdown_signal())
        .await;

    runtime.shutdown().await;
    result.context("HTTP server error")
}
