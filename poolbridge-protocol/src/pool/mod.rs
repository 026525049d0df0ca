pub mod ledger;
pub mod math;

pub use ledger::{Pool, PoolLedger};
