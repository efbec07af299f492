//! # Association Treasury
//!
//! Treasury core for student associations: a hybrid transaction classifier
//! and a monthly bank-reconciliation ledger.
//!
//! ## Features
//!
//! - **Hybrid classification**: explicit category, then keyword rules, then an
//!   external oracle whose suggestions wait for a treasurer's validation
//! - **Validation workflow**: single and batch confirmation with an audit trail
//! - **Reconciliation**: month-by-month closures chained on the bank balance,
//!   with the discrepancy recorded on every closure
//! - **Budget views**: category tree with expense totals, burn rate and runway
//! - **Storage abstraction**: database-agnostic design with trait-based storage
//!
//! ## Quick Start
//!
//! ```rust
//! use asso_treasury::{Actor, MemoryStorage, NoOracle, Role, TransactionDraft, Treasury};
//! use chrono::NaiveDate;
//! use uuid::Uuid;
//!
//! # async fn run() -> asso_treasury::LedgerResult<()> {
//! let treasury = Treasury::new(MemoryStorage::new(), NoOracle);
//! let actor = Actor::new(Uuid::new_v4(), Uuid::new_v4(), Role::Member);
//!
//! let date = NaiveDate::from_ymd_opt(2024, 9, 12).unwrap();
//! let draft = TransactionDraft::builder("Cotisation Léa", date)
//!     .cents(2000)
//!     .income()
//!     .build()?;
//! let transaction = treasury.record_transaction(&actor, draft).await?;
//! assert_eq!(transaction.amount, 2000);
//! # Ok(())
//! # }
//! ```

pub mod access;
pub mod classification;
pub mod ledger;
pub mod money;
pub mod month;
pub mod reconciliation;
pub mod settings;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use access::{Actor, Role};
pub use classification::{Classification, ClassificationInput, Classifier, ValidationService};
#[cfg(feature = "http-oracle")]
pub use classification::{ChatCompletionOracle, ChatCompletionOracleBuilder};
pub use ledger::*;
pub use month::Month;
pub use reconciliation::{
    BalancePreview, ClosureOutcome, ExpectedBalance, LedgerSummary, ReconciliationLedger,
};
pub use settings::Settings;
pub use traits::*;
pub use types::*;
pub use utils::MemoryStorage;
