// Hash time-locked atomic swaps. A swap record moves Created -> Completed or
// Created -> Refunded exactly once; terminal states are immutable, which is
// what makes duplicate completion attempts from the relayer a safe no-op.

use crate::crypto::hash_secret;
use crate::data_structures::{AccountId, AssetId, SwapId};
use crate::error::LedgerError;
use crate::token::TokenLedger;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwapState {
    Created,
    Completed,
    Refunded,
}

#[derive(Clone, Debug)]
pub struct SwapRecord {
    pub id: SwapId,
    pub initiator: AccountId,
    pub participant: AccountId,
    pub asset: AssetId,
    // The actually received (escrowed) amount, not the caller's nominal.
    pub amount: u64,
    pub secret_hash: [u8; 32],
    pub timelock: i64, // unix seconds
    pub state: SwapState,
    // Populated on completion so a ledger-history re-scan can recover the
    // preimage the way a relayer reads a completing transaction's arguments.
    pub revealed_secret: Option<Vec<u8>>,
}

/// Clock abstraction so timelock behaviour is testable without sleeping.
pub trait TimeSource: Send + Sync {
    fn unix_now(&self) -> i64;
}

pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn unix_now(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

pub struct HtlcLedger {
    chain_id: u64,
    tokens: Arc<TokenLedger>,
    clock: Arc<dyn TimeSource>,
    // Registry lock guards lookup/insert only; each swap has its own mutex.
    swaps: Mutex<HashMap<SwapId, Arc<Mutex<SwapRecord>>>>,
}

impl HtlcLedger {
    pub fn new(chain_id: u64, tokens: Arc<TokenLedger>, clock: Arc<dyn TimeSource>) -> Self {
        HtlcLedger {
            chain_id,
            tokens,
            clock,
            swaps: Mutex::new(HashMap::new()),
        }
    }

    // Escrow account holding one swap's funds. Derived from the lock terms,
    // so it exists before the (received-amount-dependent) swap id does.
    fn escrow_account(&self, initiator: &AccountId, secret_hash: &[u8; 32], timelock: i64) -> AccountId {
        let mut tag = Sha256::new();
        tag.update(b"escrow");
        tag.update(initiator.address.as_bytes());
        tag.update(secret_hash);
        tag.update(timelock.to_be_bytes());
        AccountId {
            chain_id: self.chain_id,
            address: format!("htlc:{}", hex::encode(tag.finalize())),
        }
    }

    /// Locks funds under a hash commitment. The id is derived from the
    /// amount the escrow actually received, binding it to real value.
    pub fn initiate(
        &self,
        initiator: &AccountId,
        participant: &AccountId,
        asset: &AssetId,
        amount: u64,
        secret_hash: [u8; 32],
        timelock: i64,
    ) -> Result<SwapId, LedgerError> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        if timelock <= self.clock.unix_now() {
            return Err(LedgerError::InvalidTimelock);
        }

        let escrow = self.escrow_account(initiator, &secret_hash, timelock);
        let before = self.tokens.balance_of(&escrow, asset);
        self.tokens.transfer(initiator, &escrow, asset, amount)?;
        let received = self.tokens.balance_of(&escrow, asset) - before;

        let id = SwapId::derive(initiator, participant, asset, received, &secret_hash, timelock);

        let mut swaps = self.swaps.lock().unwrap();
        if swaps.contains_key(&id) {
            // Undo the pull; the lock was never recorded.
            let _ = self.tokens.transfer(&escrow, initiator, asset, received);
            return Err(LedgerError::SwapAlreadyExists);
        }
        swaps.insert(
            id,
            Arc::new(Mutex::new(SwapRecord {
                id,
                initiator: initiator.clone(),
                participant: participant.clone(),
                asset: asset.clone(),
                amount: received,
                secret_hash,
                timelock,
                state: SwapState::Created,
                revealed_secret: None,
            })),
        );
        log::info!("htlc {}: locked {} {} until {}", id, received, asset.symbol, timelock);
        Ok(id)
    }

    /// Releases escrow to the participant against the correct preimage.
    /// The record is marked Completed before funds move, closing the
    /// reentrancy window and making a second attempt fail on state.
    pub fn complete(&self, caller: &AccountId, id: &SwapId, preimage: &[u8]) -> Result<(), LedgerError> {
        let record = self.get_entry(id)?;
        let mut record = record.lock().unwrap();

        if record.state != SwapState::Created {
            return Err(LedgerError::SwapNotPending);
        }
        if *caller != record.participant {
            return Err(LedgerError::Unauthorized);
        }
        if self.clock.unix_now() > record.timelock {
            return Err(LedgerError::TimelockExpired);
        }
        if hash_secret(preimage) != record.secret_hash {
            return Err(LedgerError::SecretMismatch);
        }

        record.state = SwapState::Completed;
        record.revealed_secret = Some(preimage.to_vec());

        let escrow = self.escrow_account(&record.initiator, &record.secret_hash, record.timelock);
        if let Err(e) = self.tokens.transfer(&escrow, &record.participant, &record.asset, record.amount) {
            // Escrow payout cannot legitimately fail; restore the record so
            // the call stays all-or-nothing.
            record.state = SwapState::Created;
            record.revealed_secret = None;
            return Err(e);
        }
        log::info!("htlc {id}: completed");
        Ok(())
    }

    /// Returns escrow to the initiator once the timelock has passed.
    pub fn refund(&self, caller: &AccountId, id: &SwapId) -> Result<(), LedgerError> {
        let record = self.get_entry(id)?;
        let mut record = record.lock().unwrap();

        if record.state != SwapState::Created {
            return Err(LedgerError::SwapNotPending);
        }
        if *caller != record.initiator {
            return Err(LedgerError::Unauthorized);
        }
        if self.clock.unix_now() <= record.timelock {
            return Err(LedgerError::TimelockNotExpired);
        }

        record.state = SwapState::Refunded;
        let escrow = self.escrow_account(&record.initiator, &record.secret_hash, record.timelock);
        if let Err(e) = self.tokens.transfer(&escrow, &record.initiator, &record.asset, record.amount) {
            record.state = SwapState::Created;
            return Err(e);
        }
        log::info!("htlc {id}: refunded");
        Ok(())
    }

    pub fn get(&self, id: &SwapId) -> Option<SwapRecord> {
        let swaps = self.swaps.lock().unwrap();
        swaps.get(id).map(|record| record.lock().unwrap().clone())
    }

    fn get_entry(&self, id: &SwapId) -> Result<Arc<Mutex<SwapRecord>>, LedgerError> {
        let swaps = self.swaps.lock().unwrap();
        swaps.get(id).cloned().ok_or(LedgerError::SwapNotFound)
    }
}
