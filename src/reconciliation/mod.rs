//! Monthly bank reconciliation
//!
//! Each month is closed against the bank statement. The expected balance of
//! a month is the previous month's *bank* balance plus the signed sum of the
//! month's transactions; the gap between that and the statement is kept as
//! the closure's delta. The first closure of an organization is an initial
//! declaration with no predecessor.

pub mod ledger;

pub use ledger::*;
