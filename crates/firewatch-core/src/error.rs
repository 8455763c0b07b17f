use firewatch_types::ValidationError;
use thiserror::Error;

/// Firewatch 统一错误类型
#[derive(Error, Debug)]
pub enum FirewatchError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, FirewatchError>;

impl FirewatchError {
    pub fn transport(msg: impl Into<String>) -> Self {
        FirewatchError::Transport(msg.into())
    }

    /// 是否属于调用方输入问题（对外映射为 4xx）
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            FirewatchError::Validation(_) | FirewatchError::MalformedPayload(_)
        )
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for FirewatchError {
    fn from(err: tokio::sync::mpsc::error::SendError<T>) -> Self {
        FirewatchError::ChannelClosed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_classification() {
        let err: FirewatchError = ValidationError::InvalidAction("pause".into()).into();
        assert!(err.is_client_error());
        assert_eq!(err.to_string(), "Validation error: Invalid action: pause");

        assert!(!FirewatchError::transport("broker unreachable").is_client_error());
    }
}
