pub mod compile;
pub mod engine;
pub mod error;
pub mod export;
pub mod memory;
pub mod probe;
pub mod progress;
pub mod session;
