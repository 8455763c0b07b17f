//! 设备主题定义
//!
//! 每类设备使用与设备名同名的主题，指令也发布在目标设备的主题上。

pub const FIRE_SENSOR: &str = "fire_sensor";
pub const WATER_LEVEL_DETECTOR: &str = "water_level_detector";
pub const SPRINKLER_HANDLER: &str = "sprinkler_handler";

/// 服务端订阅的全部主题
pub const SUBSCRIBED_TOPICS: [&str; 3] = [FIRE_SENSOR, WATER_LEVEL_DETECTOR, SPRINKLER_HANDLER];

/// 可接收指令的执行器
pub const ACTUATORS: [&str; 1] = [SPRINKLER_HANDLER];

/// 构建设备指令主题
pub fn command_topic(device_name: &str) -> String {
    device_name.to_string()
}

/// 设备是否为可接收指令的执行器
pub fn is_actuator(device_name: &str) -> bool {
    ACTUATORS.contains(&device_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_topic_matches_device_name() {
        assert_eq!(command_topic(SPRINKLER_HANDLER), "sprinkler_handler");
    }

    #[test]
    fn test_is_actuator() {
        assert!(is_actuator("sprinkler_handler"));
        assert!(!is_actuator("fire_sensor"));
    }
}
