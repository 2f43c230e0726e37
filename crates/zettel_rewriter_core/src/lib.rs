pub mod batch;
pub mod config;
pub mod rewrite;
pub mod runtime;
