use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// 初始化 Prometheus metrics exporter
pub fn init_metrics(addr: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;

    describe_metrics();

    tracing::info!("Metrics exporter started on http://{}/metrics", addr);
    Ok(())
}

/// 描述所有指标
fn describe_metrics() {
    // 入站消息
    describe_counter!(
        "firewatch_messages_received_total",
        "Total number of messages received from the transport"
    );
    describe_counter!(
        "firewatch_messages_duplicate_total",
        "Total number of duplicate messages suppressed"
    );
    describe_counter!(
        "firewatch_messages_malformed_total",
        "Total number of undecodable payloads dropped"
    );
    describe_counter!(
        "firewatch_messages_invalid_total",
        "Total number of readings rejected by validation"
    );

    // 持久化
    describe_counter!(
        "firewatch_jobs_succeeded_total",
        "Total number of persistence jobs committed"
    );
    describe_counter!(
        "firewatch_jobs_failed_total",
        "Total number of persistence jobs rolled back"
    );

    // 指令
    describe_counter!(
        "firewatch_commands_dispatched_total",
        "Total number of actuator commands published"
    );
}

/// 记录入站消息
pub fn record_message_received() {
    counter!("firewatch_messages_received_total", 1);
}

/// 记录重复消息
pub fn record_message_duplicate() {
    counter!("firewatch_messages_duplicate_total", 1);
}

/// 记录无法解码的载荷
pub fn record_message_malformed() {
    counter!("firewatch_messages_malformed_total", 1);
}

/// 记录校验失败的读数
pub fn record_message_invalid() {
    counter!("firewatch_messages_invalid_total", 1);
}
