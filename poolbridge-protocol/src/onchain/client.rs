// LedgerClient over an in-process LocalLedger. Holds the relayer's signing
// credential for that ledger and bounds every call with a timeout so a stuck
// ledger surfaces as a transient error instead of hanging the coordinator.

use crate::crypto::SecretKey;
use crate::data_structures::{AccountId, AssetId, Quote, SwapId};
use crate::error::LedgerError;
use crate::htlc::SwapRecord;
use crate::onchain::interface::{LedgerClient, LedgerEvent};
use crate::onchain::local_ledger::{LocalLedger, SignedTransaction, TxPayload};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

pub struct LocalLedgerClient {
    ledger: Arc<LocalLedger>,
    signer: SecretKey,
    call_timeout: Duration,
}

impl LocalLedgerClient {
    pub fn new(ledger: Arc<LocalLedger>, signer: SecretKey, call_timeout: Duration) -> Self {
        LocalLedgerClient { ledger, signer, call_timeout }
    }

    /// The account this client signs as on its ledger.
    pub fn account(&self) -> AccountId {
        AccountId {
            chain_id: self.ledger.chain_id(),
            address: crate::crypto::derive_address(&self.signer.verifying_key()),
        }
    }

    async fn bounded<T>(
        &self,
        call: impl std::future::Future<Output = Result<T, LedgerError>>,
    ) -> Result<T, LedgerError> {
        tokio::time::timeout(self.call_timeout, call)
            .await
            .map_err(|_| LedgerError::Timeout)?
    }
}

#[async_trait]
impl LedgerClient for LocalLedgerClient {
    fn chain_id(&self) -> u64 {
        self.ledger.chain_id()
    }

    async fn quote(
        &self,
        asset_in: &AssetId,
        asset_out: &AssetId,
        amount_in: u64,
    ) -> Result<Quote, LedgerError> {
        self.bounded(async {
            let amount_out = self.ledger.pools.quote(asset_in, asset_out, amount_in)?;
            Ok(Quote {
                asset_in: asset_in.clone(),
                asset_out: asset_out.clone(),
                amount_in,
                amount_out,
                chain_id: self.ledger.chain_id(),
            })
        })
        .await
    }

    async fn get_swap(&self, id: &SwapId) -> Result<Option<SwapRecord>, LedgerError> {
        self.bounded(async { Ok(self.ledger.htlc.get(id)) }).await
    }

    fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.ledger.subscribe()
    }

    async fn submit_initiate(
        &self,
        participant: &AccountId,
        asset: &AssetId,
        amount: u64,
        secret_hash: [u8; 32],
        timelock: i64,
    ) -> Result<SwapId, LedgerError> {
        self.bounded(async {
            let tx = SignedTransaction::sign(
                TxPayload::InitiateSwap {
                    participant: participant.clone(),
                    asset: asset.clone(),
                    amount,
                    secret_hash,
                    timelock,
                },
                &self.signer,
            );
            match self.ledger.submit(&tx)? {
                Some(id) => Ok(id),
                None => Err(LedgerError::SwapNotFound),
            }
        })
        .await
    }

    async fn submit_complete(&self, id: &SwapId, preimage: &[u8]) -> Result<(), LedgerError> {
        self.bounded(async {
            let tx = SignedTransaction::sign(
                TxPayload::CompleteSwap { swap_id: *id, preimage: preimage.to_vec() },
                &self.signer,
            );
            self.ledger.submit(&tx)?;
            Ok(())
        })
        .await
    }
}
