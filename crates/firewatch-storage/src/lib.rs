pub mod error;
pub mod executor;
mod metrics;
pub mod repository;
pub mod schema;
pub mod worker;

pub use error::{PersistError, Result};
pub use executor::PersistenceExecutor;
pub use repository::{ReadingRepository, UpsertOutcome};
pub use schema::ensure_schema;
pub use worker::{JobQueue, PersistenceWorkerPool, WorkerPoolConfig};
