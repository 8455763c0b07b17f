use firewatch_types::topics::{FIRE_SENSOR, SPRINKLER_HANDLER, WATER_LEVEL_DETECTOR};
use firewatch_types::reading::MAX_WATER_LEVEL;
use firewatch_types::{CommandAction, DeviceReading};
use rand::{Rng, RngCore};
use serde::Deserialize;
use tracing::{debug, info, warn};

/// 模拟设备
pub trait TelemetryDevice: Send {
    fn device_name(&self) -> &str;

    /// 上报主题，默认与设备名相同
    fn topic(&self) -> &str {
        self.device_name()
    }

    /// 是否接收指令
    fn accepts_commands(&self) -> bool {
        false
    }

    /// 生成一条读数
    fn sample(&mut self, rng: &mut dyn RngCore) -> DeviceReading;

    /// 处理指令主题上的消息，收到有效指令时返回确认读数
    fn handle_command(&mut self, _payload: &[u8]) -> Option<DeviceReading> {
        None
    }
}

/// 随机坐标
fn random_location(rng: &mut dyn RngCore) -> (f64, f64) {
    (rng.gen_range(-90.0..=90.0), rng.gen_range(-180.0..=180.0))
}

/// 火情传感器
pub struct FireSensor {
    name: String,
    location: (f64, f64),
}

impl FireSensor {
    pub const STATUSES: [&'static str; 2] = ["fire_detected", "no_fire"];

    pub fn new(rng: &mut dyn RngCore) -> Self {
        Self {
            name: FIRE_SENSOR.to_string(),
            location: random_location(rng),
        }
    }
}

impl TelemetryDevice for FireSensor {
    fn device_name(&self) -> &str {
        &self.name
    }

    fn sample(&mut self, rng: &mut dyn RngCore) -> DeviceReading {
        let status = Self::STATUSES[rng.gen_range(0..Self::STATUSES.len())];
        DeviceReading::new(&self.name, self.location.0, self.location.1).with_status(status)
    }
}

/// 水位检测器
pub struct WaterLevelDetector {
    name: String,
    location: (f64, f64),
}

impl WaterLevelDetector {
    pub fn new(rng: &mut dyn RngCore) -> Self {
        Self {
            name: WATER_LEVEL_DETECTOR.to_string(),
            location: random_location(rng),
        }
    }
}

impl TelemetryDevice for WaterLevelDetector {
    fn device_name(&self) -> &str {
        &self.name
    }

    fn sample(&mut self, rng: &mut dyn RngCore) -> DeviceReading {
        let level = rng.gen_range(0..=MAX_WATER_LEVEL);
        DeviceReading::new(&self.name, self.location.0, self.location.1).with_water_level(level)
    }
}

/// 喷淋执行器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SprinklerState {
    #[default]
    Stopped,
    Started,
}

impl SprinklerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SprinklerState::Stopped => "stopped",
            SprinklerState::Started => "started",
        }
    }

    /// 应用动作后的状态，重复动作保持不变
    pub fn apply(self, action: CommandAction) -> Self {
        match action {
            CommandAction::Start => SprinklerState::Started,
            CommandAction::Stop => SprinklerState::Stopped,
        }
    }
}

/// 指令主题上的消息
///
/// 设备自身的状态上报也会出现在该主题上，这类消息不带 `action`。
#[derive(Debug, Deserialize)]
struct CommandEnvelope {
    device_name: String,
    #[serde(default)]
    action: Option<String>,
}

/// 喷淋执行器
pub struct SprinklerHandler {
    name: String,
    location: (f64, f64),
    state: SprinklerState,
}

impl SprinklerHandler {
    pub fn new(rng: &mut dyn RngCore) -> Self {
        Self {
            name: SPRINKLER_HANDLER.to_string(),
            location: random_location(rng),
            state: SprinklerState::default(),
        }
    }

    pub fn state(&self) -> SprinklerState {
        self.state
    }

    fn status_report(&self) -> DeviceReading {
        DeviceReading::new(&self.name, self.location.0, self.location.1)
            .with_current_action(self.state.as_str())
    }
}

impl TelemetryDevice for SprinklerHandler {
    fn device_name(&self) -> &str {
        &self.name
    }

    fn accepts_commands(&self) -> bool {
        true
    }

    fn sample(&mut self, _rng: &mut dyn RngCore) -> DeviceReading {
        self.status_report()
    }

    fn handle_command(&mut self, payload: &[u8]) -> Option<DeviceReading> {
        let envelope: CommandEnvelope = match serde_json::from_slice(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(device_name = %self.name, error = %e, "Undecodable command payload");
                return None;
            }
        };

        if envelope.device_name != self.name {
            return None;
        }

        let raw = envelope.action?;
        let action: CommandAction = match raw.parse() {
            Ok(action) => action,
            Err(e) => {
                warn!(device_name = %self.name, error = %e, "Ignoring command");
                return None;
            }
        };

        let previous = self.state;
        self.state = previous.apply(action);

        if previous == self.state {
            debug!(device_name = %self.name, state = self.state.as_str(), "State unchanged");
        } else {
            info!(
                device_name = %self.name,
                from = previous.as_str(),
                to = self.state.as_str(),
                "Actuator state changed"
            );
        }

        Some(self.status_report())
    }
}

/// 模拟设备集合
pub enum SimulatedDevice {
    FireSensor(FireSensor),
    WaterLevelDetector(WaterLevelDetector),
    SprinklerHandler(SprinklerHandler),
}

impl SimulatedDevice {
    fn inner(&self) -> &dyn TelemetryDevice {
        match self {
            SimulatedDevice::FireSensor(d) => d,
            SimulatedDevice::WaterLevelDetector(d) => d,
            SimulatedDevice::SprinklerHandler(d) => d,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn TelemetryDevice {
        match self {
            SimulatedDevice::FireSensor(d) => d,
            SimulatedDevice::WaterLevelDetector(d) => d,
            SimulatedDevice::SprinklerHandler(d) => d,
        }
    }
}

impl TelemetryDevice for SimulatedDevice {
    fn device_name(&self) -> &str {
        self.inner().device_name()
    }

    fn topic(&self) -> &str {
        self.inner().topic()
    }

    fn accepts_commands(&self) -> bool {
        self.inner().accepts_commands()
    }

    fn sample(&mut self, rng: &mut dyn RngCore) -> DeviceReading {
        self.inner_mut().sample(rng)
    }

    fn handle_command(&mut self, payload: &[u8]) -> Option<DeviceReading> {
        self.inner_mut().handle_command(payload)
    }
}

/// 默认设备组：火情传感器、水位检测器、喷淋执行器
pub fn standard_fleet(rng: &mut dyn RngCore) -> Vec<SimulatedDevice> {
    vec![
        SimulatedDevice::FireSensor(FireSensor::new(rng)),
        SimulatedDevice::WaterLevelDetector(WaterLevelDetector::new(rng)),
        SimulatedDevice::SprinklerHandler(SprinklerHandler::new(rng)),
    ]
}
