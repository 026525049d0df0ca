// Settlement engine: constant-product pools, HTLC atomic swaps, and the
// off-ledger relayer that bridges them across two independent ledgers.

pub mod config;
pub mod crypto;
pub mod data_structures;
pub mod error;
pub mod htlc;
pub mod onchain;
pub mod pool;
pub mod relayer;
pub mod routing;
pub mod token;
