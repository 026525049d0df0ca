pub mod client;
pub mod interface;
pub mod local_ledger;

pub use client::LocalLedgerClient;
pub use interface::{LedgerClient, LedgerEvent};
pub use local_ledger::{LocalLedger, SignedTransaction, TxPayload};
