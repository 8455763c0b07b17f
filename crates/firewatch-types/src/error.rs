use thiserror::Error;

/// 数据校验错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// 缺少必填字段
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// 字段超出允许范围（边界包含在内）
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },

    /// 字段长度超限
    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },

    /// 不支持的指令动作
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    /// 无法解析的时间戳
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

/// 校验结果类型
pub type Result<T> = std::result::Result<T, ValidationError>;
