//! Transaction classification: the tiered decision engine, the human
//! validation step, and oracle clients

pub mod engine;
#[cfg(feature = "http-oracle")]
pub mod http;
pub mod validation;

pub use engine::*;
#[cfg(feature = "http-oracle")]
pub use http::*;
pub use validation::*;
