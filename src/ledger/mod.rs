//! Fjall-backed persistence for the asset index and the contact directory
//!
//! One embedded keyspace holds three partitions:
//!
//! - `assets`: registry entries with their pending/final state
//! - `contacts`: directory records, including the assigned ringtone reference
//! - `phones`: lookup index from normalized phone number to contact id
//!
//! Asset bytes are not stored here; they live in the object store next to it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tonebox::ledger::Ledger;
//!
//! let ledger = Ledger::open("data/ledger")?;
//! ledger.put_json(ledger.assets(), key, &record)?;
//! ```

pub mod error;
pub mod partitions;
pub mod store;

pub use error::{LedgerError, Result};
pub use store::{Ledger, LedgerStats};
