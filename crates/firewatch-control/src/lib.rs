pub mod dispatcher;
mod metrics;

pub use dispatcher::CommandDispatcher;
