//! Executor type definitions

pub mod ast;
