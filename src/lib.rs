pub mod backend;
pub mod config;
pub mod embedding;
pub mod errors;
pub mod logging;
pub mod rerank;
pub mod search;
