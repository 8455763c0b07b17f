pub mod api;
pub mod config;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod metrics;
pub mod runtime;
pub mod shutdown;

use firewatch_control::CommandDispatcher;
use firewatch_storage::{JobQueue, ReadingRepository};

pub use api::create_router;
pub use config::AppConfig;
pub use runtime::Runtime;

/// 请求处理共享状态
pub struct AppState {
    pub repository: ReadingRepository,
    pub jobs: JobQueue,
    pub dispatcher: CommandDispatcher,
}
