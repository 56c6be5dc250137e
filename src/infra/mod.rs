//! Infrastructure adapters and runtime bootstrap.

pub mod assets;
pub mod error;
pub mod gemini;
pub mod http;
pub mod store;
pub mod telemetry;
