//! Ledger module containing transactions, categories, budget views and the
//! treasury orchestrator

pub mod category;
pub mod core;
pub mod health;
pub mod transaction;
pub mod tree;

pub use category::*;
pub use self::core::*;
pub use health::*;
pub use transaction::*;
pub use tree::*;
