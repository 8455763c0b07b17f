pub mod client;
pub mod memory;
pub mod publisher;

pub use client::{MqttSettings, MqttTransport};
pub use memory::MemoryBroker;
pub use publisher::{InboundMessage, Publisher};
pub use rumqttc::QoS;
