pub mod annotate;
pub mod block_executor;
pub mod cli;
pub mod config;
pub mod console;
pub mod context;
pub mod executor;
pub mod formatter;
pub mod indexer;
pub mod markdown;
pub mod parser;
pub mod runner;
pub mod store;
pub mod transpile;
pub mod types;

// Re-export main types
pub use types::*;

pub use block_executor::BlockExecutor;
pub use runner::{DocumentTestRunner, RunReport};
