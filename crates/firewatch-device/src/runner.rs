use crate::device::{SimulatedDevice, TelemetryDevice};
use crate::transport::{DeviceLink, DeviceTransport};
use firewatch_core::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{info, warn};

/// 设备模拟器
///
/// 设备轮流上报：相邻两次上报间隔 `interval`，单个设备的上报周期为
/// `interval * 设备数`。
pub struct DeviceSimulator {
    devices: Vec<SimulatedDevice>,
    transport: DeviceTransport,
    interval: Duration,
}

impl DeviceSimulator {
    pub fn new(
        devices: Vec<SimulatedDevice>,
        transport: DeviceTransport,
        interval: Duration,
    ) -> Self {
        Self {
            devices,
            transport,
            interval,
        }
    }

    /// 连接全部设备并启动上报任务
    ///
    /// 返回时指令订阅已经生效。
    pub async fn start(self) -> Result<SimulatorHandle> {
        let (shutdown_tx, _) = broadcast::channel(1);
        let count = self.devices.len().max(1) as u32;
        let period = (self.interval * count).max(Duration::from_millis(1));
        let mut tasks = Vec::with_capacity(self.devices.len());

        for (index, device) in self.devices.into_iter().enumerate() {
            let link = self.transport.connect(&device).await?;
            let start = Instant::now() + self.interval * index as u32;
            let shutdown = shutdown_tx.subscribe();

            info!(
                device_name = %device.device_name(),
                client_id = %DeviceTransport::client_id(device.device_name()),
                period_ms = period.as_millis() as u64,
                "Starting simulated device"
            );

            tasks.push(tokio::spawn(run_device(device, link, start, period, shutdown)));
        }

        Ok(SimulatorHandle { shutdown_tx, tasks })
    }
}

async fn run_device(
    mut device: SimulatedDevice,
    mut link: DeviceLink,
    start: Instant,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut rng = StdRng::from_entropy();
    let mut ticker = time::interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            _ = ticker.tick() => {
                let reading = device.sample(&mut rng);
                if let Err(e) = link.publish(&reading).await {
                    warn!(device_name = %device.device_name(), error = %e, "Failed to publish reading");
                }
            }
            message = link.next_command() => {
                if let Some(report) = device.handle_command(&message.payload) {
                    if let Err(e) = link.publish(&report).await {
                        warn!(device_name = %device.device_name(), error = %e, "Failed to publish status report");
                    }
                }
            }
        }
    }

    link.close().await;
    info!(device_name = %device.device_name(), "Simulated device stopped");
}

/// 运行中的模拟器
pub struct SimulatorHandle {
    shutdown_tx: broadcast::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
}

impl SimulatorHandle {
    /// 停止全部设备并等待任务结束
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Simulated device task failed");
            }
        }
    }
}
