// Ledger connection abstraction. The relayer only ever talks to a ledger
// through this trait, so a real chain client can slot in behind it.

use crate::data_structures::{AccountId, AssetId, Quote, SwapId};
use crate::error::LedgerError;
use crate::htlc::SwapRecord;
use async_trait::async_trait;
use tokio::sync::broadcast;

/// Swap lifecycle notifications pushed by a ledger connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LedgerEvent {
    SwapInitiated { chain_id: u64, swap_id: SwapId },
    SwapCompleted { chain_id: u64, swap_id: SwapId },
    SwapRefunded { chain_id: u64, swap_id: SwapId },
}

impl LedgerEvent {
    pub fn swap_id(&self) -> SwapId {
        match self {
            LedgerEvent::SwapInitiated { swap_id, .. }
            | LedgerEvent::SwapCompleted { swap_id, .. }
            | LedgerEvent::SwapRefunded { swap_id, .. } => *swap_id,
        }
    }
}

#[async_trait]
pub trait LedgerClient: Send + Sync {
    fn chain_id(&self) -> u64;

    /// Read-only price quote from this ledger's pools.
    async fn quote(
        &self,
        asset_in: &AssetId,
        asset_out: &AssetId,
        amount_in: u64,
    ) -> Result<Quote, LedgerError>;

    /// Fetches a swap record, including any revealed secret.
    async fn get_swap(&self, id: &SwapId) -> Result<Option<SwapRecord>, LedgerError>;

    /// Event stream for this ledger. Each call returns a fresh receiver.
    fn subscribe(&self) -> broadcast::Receiver<LedgerEvent>;

    /// Submits a lock transaction signed with this client's credential.
    async fn submit_initiate(
        &self,
        participant: &AccountId,
        asset: &AssetId,
        amount: u64,
        secret_hash: [u8; 32],
        timelock: i64,
    ) -> Result<SwapId, LedgerError>;

    /// Submits a completion transaction revealing the preimage.
    async fn submit_complete(&self, id: &SwapId, preimage: &[u8]) -> Result<(), LedgerError>;
}
