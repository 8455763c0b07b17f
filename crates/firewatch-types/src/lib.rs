pub mod command;
pub mod error;
pub mod reading;
pub mod timestamp;
pub mod topics;

pub use command::{CommandAction, DeviceCommand};
pub use error::{Result, ValidationError};
pub use reading::DeviceReading;
