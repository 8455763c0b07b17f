pub mod device;
pub mod runner;
pub mod transport;

pub use device::{
    standard_fleet, FireSensor, SimulatedDevice, SprinklerHandler, SprinklerState,
    TelemetryDevice, WaterLevelDetector,
};
pub use runner::{DeviceSimulator, SimulatorHandle};
pub use transport::{DeviceLink, DeviceTransport};
