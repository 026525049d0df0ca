// Pool ledger: reserves and share accounting for constant-product pairs.
//
// Every mutating call on a pool is serialized against every other call on
// the same pool through that pool's own mutex; unrelated pools never share a
// lock. Deposits and swap inputs are accounted at the *actually received*
// balance delta, so fee-on-transfer tokens cannot inflate reserves.

use crate::config::MAX_FEE_BPS;
use crate::data_structures::{AccountId, AssetId, PoolId};
use crate::error::LedgerError;
use crate::pool::math;
use crate::token::TokenLedger;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug)]
pub struct Pool {
    pub asset_a: AssetId, // canonical (sorted) order: asset_a < asset_b
    pub asset_b: AssetId,
    pub reserve_a: u64,
    pub reserve_b: u64,
    pub total_shares: u64,
    pub shares: HashMap<AccountId, u64>,
}

pub struct PoolLedger {
    chain_id: u64,
    fee_bps: u16,
    authority: AccountId,
    paused: AtomicBool,
    tokens: Arc<TokenLedger>,
    // Registry lock only guards pool lookup/creation; per-pool mutexes
    // serialize the actual accounting.
    pools: Mutex<HashMap<PoolId, Arc<Mutex<Pool>>>>,
}

impl PoolLedger {
    pub fn new(
        chain_id: u64,
        fee_bps: u16,
        authority: AccountId,
        tokens: Arc<TokenLedger>,
    ) -> Result<Self, LedgerError> {
        if fee_bps > MAX_FEE_BPS {
            return Err(LedgerError::InvalidAmount);
        }
        Ok(PoolLedger {
            chain_id,
            fee_bps,
            authority,
            paused: AtomicBool::new(false),
            tokens,
            pools: Mutex::new(HashMap::new()),
        })
    }

    /// Emergency pause switch; only the configured authority may flip it.
    pub fn set_pause(&self, caller: &AccountId, paused: bool) -> Result<(), LedgerError> {
        if *caller != self.authority {
            return Err(LedgerError::Unauthorized);
        }
        self.paused.store(paused, Ordering::SeqCst);
        Ok(())
    }

    fn ensure_active(&self) -> Result<(), LedgerError> {
        if self.paused.load(Ordering::SeqCst) {
            Err(LedgerError::Paused)
        } else {
            Ok(())
        }
    }

    // The escrow account holding a pool's reserves.
    fn pool_account(&self, pool_id: &PoolId) -> AccountId {
        AccountId {
            chain_id: self.chain_id,
            address: format!("pool:{pool_id}"),
        }
    }

    fn validate_pair(&self, a: &AssetId, b: &AssetId) -> Result<(), LedgerError> {
        if a == b {
            return Err(LedgerError::IdenticalAssets);
        }
        if a.chain_id != self.chain_id || b.chain_id != self.chain_id {
            return Err(LedgerError::PoolNotFound);
        }
        Ok(())
    }

    fn get_or_create(&self, a: &AssetId, b: &AssetId) -> (PoolId, Arc<Mutex<Pool>>) {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        let pool_id = PoolId::derive(first, second);
        let mut pools = self.pools.lock().unwrap();
        let pool = pools
            .entry(pool_id)
            .or_insert_with(|| {
                Arc::new(Mutex::new(Pool {
                    asset_a: first.clone(),
                    asset_b: second.clone(),
                    reserve_a: 0,
                    reserve_b: 0,
                    total_shares: 0,
                    shares: HashMap::new(),
                }))
            })
            .clone();
        (pool_id, pool)
    }

    fn get_existing(&self, a: &AssetId, b: &AssetId) -> Result<(PoolId, Arc<Mutex<Pool>>), LedgerError> {
        let pool_id = PoolId::derive(a, b);
        let pools = self.pools.lock().unwrap();
        pools
            .get(&pool_id)
            .cloned()
            .map(|pool| (pool_id, pool))
            .ok_or(LedgerError::PoolNotFound)
    }

    /// Deposits a token pair and mints liquidity shares. Tokens are pulled
    /// first and measured by balance delta; the mint is priced off what the
    /// pool actually received. A failed mint refunds the pulled tokens.
    pub fn add_liquidity(
        &self,
        caller: &AccountId,
        asset_a: &AssetId,
        asset_b: &AssetId,
        amount_a: u64,
        amount_b: u64,
        min_shares: u64,
    ) -> Result<u64, LedgerError> {
        self.ensure_active()?;
        self.validate_pair(asset_a, asset_b)?;
        if amount_a == 0 || amount_b == 0 {
            return Err(LedgerError::InvalidAmount);
        }

        // Canonicalize the caller's argument order.
        let (asset_a, asset_b, amount_a, amount_b) = if asset_a <= asset_b {
            (asset_a, asset_b, amount_a, amount_b)
        } else {
            (asset_b, asset_a, amount_b, amount_a)
        };

        let (pool_id, pool) = self.get_or_create(asset_a, asset_b);
        let pool_account = self.pool_account(&pool_id);
        let mut pool = pool.lock().unwrap();

        // Snapshot / transfer / re-snapshot: trust the delta, not the nominal.
        let before_a = self.tokens.balance_of(&pool_account, asset_a);
        let before_b = self.tokens.balance_of(&pool_account, asset_b);
        self.tokens.transfer(caller, &pool_account, asset_a, amount_a)?;
        if let Err(e) = self.tokens.transfer(caller, &pool_account, asset_b, amount_b) {
            // First leg already pulled; return it.
            let received_a = self.tokens.balance_of(&pool_account, asset_a) - before_a;
            let _ = self.tokens.transfer(&pool_account, caller, asset_a, received_a);
            return Err(e);
        }
        let received_a = self.tokens.balance_of(&pool_account, asset_a) - before_a;
        let received_b = self.tokens.balance_of(&pool_account, asset_b) - before_b;

        let minted = if pool.total_shares == 0 {
            math::initial_shares(received_a, received_b)
        } else {
            math::subsequent_shares(
                received_a,
                received_b,
                pool.reserve_a,
                pool.reserve_b,
                pool.total_shares,
            )
        };

        let refund = |err: LedgerError| {
            let _ = self.tokens.transfer(&pool_account, caller, asset_a, received_a);
            let _ = self.tokens.transfer(&pool_account, caller, asset_b, received_b);
            Err(err)
        };
        let minted = match minted {
            Ok(0) => return refund(LedgerError::InsufficientLiquidityMinted),
            Ok(m) if m < min_shares => return refund(LedgerError::SlippageExceeded),
            Ok(m) => m,
            Err(e) => return refund(e),
        };

        // Validate all three adds before touching any of them.
        let new_reserve_a = pool.reserve_a.checked_add(received_a);
        let new_reserve_b = pool.reserve_b.checked_add(received_b);
        let new_total = pool.total_shares.checked_add(minted);
        let (Some(new_reserve_a), Some(new_reserve_b), Some(new_total)) =
            (new_reserve_a, new_reserve_b, new_total)
        else {
            return refund(LedgerError::Overflow);
        };
        pool.reserve_a = new_reserve_a;
        pool.reserve_b = new_reserve_b;
        pool.total_shares = new_total;
        *pool.shares.entry(caller.clone()).or_insert(0) += minted;
        Ok(minted)
    }

    /// Burns shares and pays out the pro-rata slice of both reserves.
    /// Returns amounts in the caller's argument order.
    pub fn remove_liquidity(
        &self,
        caller: &AccountId,
        asset_a: &AssetId,
        asset_b: &AssetId,
        shares: u64,
    ) -> Result<(u64, u64), LedgerError> {
        self.ensure_active()?;
        self.validate_pair(asset_a, asset_b)?;
        if shares == 0 {
            return Err(LedgerError::InvalidAmount);
        }

        let (pool_id, pool) = self.get_existing(asset_a, asset_b)?;
        let pool_account = self.pool_account(&pool_id);
        let mut pool = pool.lock().unwrap();

        let held = pool.shares.get(caller).copied().unwrap_or(0);
        if held < shares {
            return Err(LedgerError::InsufficientShares);
        }

        let out_a = math::redemption_amount(shares, pool.reserve_a, pool.total_shares)?;
        let out_b = math::redemption_amount(shares, pool.reserve_b, pool.total_shares)?;

        // Burn and decrement atomically with the payout bookkeeping.
        if held == shares {
            pool.shares.remove(caller);
        } else {
            pool.shares.insert(caller.clone(), held - shares);
        }
        pool.total_shares -= shares;
        pool.reserve_a -= out_a;
        pool.reserve_b -= out_b;

        if out_a > 0 {
            self.tokens.transfer(&pool_account, caller, &pool.asset_a, out_a)?;
        }
        if out_b > 0 {
            self.tokens.transfer(&pool_account, caller, &pool.asset_b, out_b)?;
        }

        // Map back to the caller's argument order.
        if asset_a <= asset_b {
            Ok((out_a, out_b))
        } else {
            Ok((out_b, out_a))
        }
    }

    /// Constant-product swap. `min_amount_out` is required: the ledger never
    /// substitutes a zero default that would disable slippage protection.
    pub fn swap(
        &self,
        caller: &AccountId,
        asset_in: &AssetId,
        asset_out: &AssetId,
        amount_in: u64,
        min_amount_out: u64,
    ) -> Result<u64, LedgerError> {
        self.ensure_active()?;
        self.validate_pair(asset_in, asset_out)?;
        if amount_in == 0 {
            return Err(LedgerError::InvalidAmount);
        }

        let (pool_id, pool) = self.get_existing(asset_in, asset_out)?;
        let pool_account = self.pool_account(&pool_id);
        let mut pool = pool.lock().unwrap();

        let in_is_a = *asset_in == pool.asset_a;
        let (reserve_in, reserve_out) = if in_is_a {
            (pool.reserve_a, pool.reserve_b)
        } else {
            (pool.reserve_b, pool.reserve_a)
        };
        if reserve_in == 0 || reserve_out == 0 {
            return Err(LedgerError::InsufficientLiquidity);
        }

        // Pull the input and account for what actually arrived.
        let before = self.tokens.balance_of(&pool_account, asset_in);
        self.tokens.transfer(caller, &pool_account, asset_in, amount_in)?;
        let received = self.tokens.balance_of(&pool_account, asset_in) - before;

        let refund = |err: LedgerError| {
            let _ = self.tokens.transfer(&pool_account, caller, asset_in, received);
            Err(err)
        };
        let amount_out = match math::swap_output(received, reserve_in, reserve_out, self.fee_bps) {
            Ok(out) if out < min_amount_out => return refund(LedgerError::SlippageExceeded),
            Ok(out) if out >= reserve_out => return refund(LedgerError::InsufficientLiquidity),
            Ok(out) => out,
            Err(e) => return refund(e),
        };

        let Some(new_reserve_in) = reserve_in.checked_add(received) else {
            return refund(LedgerError::Overflow);
        };
        if in_is_a {
            pool.reserve_a = new_reserve_in;
            pool.reserve_b -= amount_out;
        } else {
            pool.reserve_b = new_reserve_in;
            pool.reserve_a -= amount_out;
        }
        self.tokens.transfer(&pool_account, caller, asset_out, amount_out)?;
        Ok(amount_out)
    }

    /// Read-only quote using the same swap math over a reserve snapshot.
    pub fn quote(
        &self,
        asset_in: &AssetId,
        asset_out: &AssetId,
        amount_in: u64,
    ) -> Result<u64, LedgerError> {
        self.validate_pair(asset_in, asset_out)?;
        if amount_in == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let (_, pool) = self.get_existing(asset_in, asset_out)?;
        let pool = pool.lock().unwrap();
        let (reserve_in, reserve_out) = if *asset_in == pool.asset_a {
            (pool.reserve_a, pool.reserve_b)
        } else {
            (pool.reserve_b, pool.reserve_a)
        };
        if reserve_in == 0 || reserve_out == 0 {
            return Err(LedgerError::InsufficientLiquidity);
        }
        let out = math::swap_output(amount_in, reserve_in, reserve_out, self.fee_bps)?;
        if out >= reserve_out {
            return Err(LedgerError::InsufficientLiquidity);
        }
        Ok(out)
    }

    /// Reserve snapshot for a pair plus total shares. Reserves come back in
    /// the caller's argument order, like `remove_liquidity` payouts.
    pub fn reserves(&self, asset_a: &AssetId, asset_b: &AssetId) -> Result<(u64, u64, u64), LedgerError> {
        let (_, pool) = self.get_existing(asset_a, asset_b)?;
        let pool = pool.lock().unwrap();
        if *asset_a == pool.asset_a {
            Ok((pool.reserve_a, pool.reserve_b, pool.total_shares))
        } else {
            Ok((pool.reserve_b, pool.reserve_a, pool.total_shares))
        }
    }
}
