// In-process token ledger. Models plain tokens and tokens that silently
// deduct a transfer fee, which is why pool and HTLC accounting must always
// measure the actual received delta instead of trusting nominal amounts.

use crate::data_structures::{AccountId, AssetId};
use crate::error::LedgerError;
use std::collections::HashMap;
use std::sync::Mutex;

const BPS_DENOMINATOR: u128 = 10_000;

#[derive(Debug, Default)]
pub struct TokenLedger {
    balances: Mutex<HashMap<(AccountId, AssetId), u64>>,
    // Per-asset transfer fee in basis points; absent means 0 (plain token).
    transfer_fee_bps: Mutex<HashMap<AssetId, u16>>,
}

impl TokenLedger {
    pub fn new() -> Self {
        Default::default()
    }

    /// Registers a fee-on-transfer asset. The fee is deducted from every
    /// transfer, so the recipient receives less than the nominal amount.
    /// Clamped to 100%: a fee above that would credit a negative amount.
    pub fn set_transfer_fee(&self, asset: AssetId, fee_bps: u16) {
        let fee_bps = fee_bps.min(BPS_DENOMINATOR as u16);
        self.transfer_fee_bps.lock().unwrap().insert(asset, fee_bps);
    }

    /// Credits freshly minted tokens to an account (genesis / test setup).
    pub fn mint(&self, account: &AccountId, asset: &AssetId, amount: u64) {
        let mut balances = self.balances.lock().unwrap();
        let entry = balances.entry((account.clone(), asset.clone())).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    pub fn balance_of(&self, account: &AccountId, asset: &AssetId) -> u64 {
        self.balances
            .lock()
            .unwrap()
            .get(&(account.clone(), asset.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// Moves `amount` out of `from`; the recipient is credited the nominal
    /// amount minus the asset's transfer fee. Returns the credited amount.
    /// Debit and credit happen under one lock, so a failed precondition
    /// leaves both balances untouched.
    pub fn transfer(
        &self,
        from: &AccountId,
        to: &AccountId,
        asset: &AssetId,
        amount: u64,
    ) -> Result<u64, LedgerError> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let fee_bps = self
            .transfer_fee_bps
            .lock()
            .unwrap()
            .get(asset)
            .copied()
            .unwrap_or(0);
        let fee = (amount as u128 * fee_bps as u128 / BPS_DENOMINATOR) as u64;
        let credited = amount - fee;

        let mut balances = self.balances.lock().unwrap();
        let from_key = (from.clone(), asset.clone());
        let from_balance = balances.get(&from_key).copied().unwrap_or(0);
        if from_balance < amount {
            return Err(LedgerError::InsufficientBalance);
        }
        balances.insert(from_key, from_balance - amount);
        let to_entry = balances.entry((to.clone(), asset.clone())).or_insert(0);
        *to_entry = to_entry.saturating_add(credited);
        Ok(credited)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(addr: &str) -> AccountId {
        AccountId { chain_id: 1, address: addr.to_string() }
    }

    fn asset(symbol: &str) -> AssetId {
        AssetId { chain_id: 1, symbol: symbol.to_string() }
    }

    #[test]
    fn plain_transfer_credits_nominal_amount() {
        let ledger = TokenLedger::new();
        let (alice, bob, tok) = (account("alice"), account("bob"), asset("TOK"));
        ledger.mint(&alice, &tok, 1_000);

        let credited = ledger.transfer(&alice, &bob, &tok, 400).unwrap();
        assert_eq!(credited, 400);
        assert_eq!(ledger.balance_of(&alice, &tok), 600);
        assert_eq!(ledger.balance_of(&bob, &tok), 400);
    }

    #[test]
    fn fee_on_transfer_deducts_from_recipient() {
        let ledger = TokenLedger::new();
        let (alice, bob, fot) = (account("alice"), account("bob"), asset("FOT"));
        ledger.set_transfer_fee(fot.clone(), 100); // 1%
        ledger.mint(&alice, &fot, 10_000);

        // Nominal 1,000 arrives as 990
        let credited = ledger.transfer(&alice, &bob, &fot, 1_000).unwrap();
        assert_eq!(credited, 990);
        assert_eq!(ledger.balance_of(&alice, &fot), 9_000); // sender pays full nominal
        assert_eq!(ledger.balance_of(&bob, &fot), 990);
    }

    #[test]
    fn transfer_fee_is_capped_at_one_hundred_percent() {
        let ledger = TokenLedger::new();
        let (alice, bob, burn) = (account("alice"), account("bob"), asset("BURN"));
        ledger.set_transfer_fee(burn.clone(), 20_000); // clamps to 10,000
        ledger.mint(&alice, &burn, 1_000);

        let credited = ledger.transfer(&alice, &bob, &burn, 1_000).unwrap();
        assert_eq!(credited, 0);
        assert_eq!(ledger.balance_of(&alice, &burn), 0);
        assert_eq!(ledger.balance_of(&bob, &burn), 0);
    }

    #[test]
    fn insufficient_balance_rejected_without_mutation() {
        let ledger = TokenLedger::new();
        let (alice, bob, tok) = (account("alice"), account("bob"), asset("TOK"));
        ledger.mint(&alice, &tok, 50);

        assert_eq!(
            ledger.transfer(&alice, &bob, &tok, 100),
            Err(LedgerError::InsufficientBalance)
        );
        assert_eq!(ledger.balance_of(&alice, &tok), 50);
        assert_eq!(ledger.balance_of(&bob, &tok), 0);

        assert_eq!(
            ledger.transfer(&alice, &bob, &tok, 0),
            Err(LedgerError::InvalidAmount)
        );
    }
}
