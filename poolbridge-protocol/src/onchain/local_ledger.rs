// In-process ledger node: token ledger + pools + HTLCs behind a signed
// transaction interface, with a broadcast channel standing in for the
// chain's event log.

use crate::crypto::{self, PublicKey, SecretKey};
use crate::data_structures::{AccountId, AssetId, SwapId};
use crate::error::LedgerError;
use crate::htlc::{HtlcLedger, TimeSource};
use crate::onchain::interface::LedgerEvent;
use crate::pool::PoolLedger;
use crate::token::TokenLedger;
use ed25519_dalek::Signature;
use std::sync::Arc;
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Clone, Debug)]
pub enum TxPayload {
    InitiateSwap {
        participant: AccountId,
        asset: AssetId,
        amount: u64,
        secret_hash: [u8; 32],
        timelock: i64,
    },
    CompleteSwap {
        swap_id: SwapId,
        preimage: Vec<u8>,
    },
    RefundSwap {
        swap_id: SwapId,
    },
}

impl TxPayload {
    // Deterministic byte encoding covered by the transaction signature.
    fn signing_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        match self {
            TxPayload::InitiateSwap { participant, asset, amount, secret_hash, timelock } => {
                bytes.extend_from_slice(b"initiate");
                bytes.extend_from_slice(&participant.chain_id.to_be_bytes());
                bytes.extend_from_slice(participant.address.as_bytes());
                bytes.extend_from_slice(&asset.chain_id.to_be_bytes());
                bytes.extend_from_slice(asset.symbol.as_bytes());
                bytes.extend_from_slice(&amount.to_be_bytes());
                bytes.extend_from_slice(secret_hash);
                bytes.extend_from_slice(&timelock.to_be_bytes());
            }
            TxPayload::CompleteSwap { swap_id, preimage } => {
                bytes.extend_from_slice(b"complete");
                bytes.extend_from_slice(&swap_id.0);
                bytes.extend_from_slice(preimage);
            }
            TxPayload::RefundSwap { swap_id } => {
                bytes.extend_from_slice(b"refund");
                bytes.extend_from_slice(&swap_id.0);
            }
        }
        bytes
    }
}

#[derive(Clone, Debug)]
pub struct SignedTransaction {
    pub payload: TxPayload,
    pub signer: PublicKey,
    pub signature: Signature,
}

impl SignedTransaction {
    pub fn sign(payload: TxPayload, key: &SecretKey) -> SignedTransaction {
        let signature = crypto::sign(&payload.signing_bytes(), key);
        SignedTransaction {
            payload,
            signer: key.verifying_key(),
            signature,
        }
    }
}

pub struct LocalLedger {
    chain_id: u64,
    pub tokens: Arc<TokenLedger>,
    pub pools: PoolLedger,
    pub htlc: HtlcLedger,
    events: broadcast::Sender<LedgerEvent>,
}

impl LocalLedger {
    pub fn new(
        chain_id: u64,
        fee_bps: u16,
        authority: AccountId,
        clock: Arc<dyn TimeSource>,
    ) -> Result<Self, LedgerError> {
        let tokens = Arc::new(TokenLedger::new());
        let pools = PoolLedger::new(chain_id, fee_bps, authority, tokens.clone())?;
        let htlc = HtlcLedger::new(chain_id, tokens.clone(), clock);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(LocalLedger { chain_id, tokens, pools, htlc, events })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    /// Verifies the signature, derives the caller account from the signing
    /// key, and dispatches. Returns the new swap id for lock transactions.
    pub fn submit(&self, tx: &SignedTransaction) -> Result<Option<SwapId>, LedgerError> {
        if !crypto::verify(&tx.payload.signing_bytes(), &tx.signature, &tx.signer) {
            return Err(LedgerError::BadSignature);
        }
        let caller = AccountId {
            chain_id: self.chain_id,
            address: crypto::derive_address(&tx.signer),
        };

        match &tx.payload {
            TxPayload::InitiateSwap { participant, asset, amount, secret_hash, timelock } => {
                let swap_id =
                    self.htlc
                        .initiate(&caller, participant, asset, *amount, *secret_hash, *timelock)?;
                self.emit(LedgerEvent::SwapInitiated { chain_id: self.chain_id, swap_id });
                Ok(Some(swap_id))
            }
            TxPayload::CompleteSwap { swap_id, preimage } => {
                self.htlc.complete(&caller, swap_id, preimage)?;
                self.emit(LedgerEvent::SwapCompleted { chain_id: self.chain_id, swap_id: *swap_id });
                Ok(None)
            }
            TxPayload::RefundSwap { swap_id } => {
                self.htlc.refund(&caller, swap_id)?;
                self.emit(LedgerEvent::SwapRefunded { chain_id: self.chain_id, swap_id: *swap_id });
                Ok(None)
            }
        }
    }

    fn emit(&self, event: LedgerEvent) {
        // No subscribers is fine; the event log is best-effort.
        let _ = self.events.send(event);
    }
}
