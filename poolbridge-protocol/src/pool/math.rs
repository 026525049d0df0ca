// Constant-product swap math. Unsigned fixed-point integer arithmetic only:
// u64 amounts, checked u128 intermediates, floor truncation everywhere.

use crate::error::LedgerError;

const BPS_DENOMINATOR: u128 = 10_000;

/// Floor integer square root (Newton's method).
pub fn integer_sqrt(value: u128) -> u128 {
    if value < 2 {
        return value;
    }
    let mut x = value;
    let mut y = (x + 1) / 2;
    while y < x {
        x = y;
        y = (x + value / x) / 2;
    }
    x
}

/// Shares minted by the first deposit into an empty pool:
/// floor(sqrt(received_a * received_b)).
pub fn initial_shares(received_a: u64, received_b: u64) -> Result<u64, LedgerError> {
    let product = (received_a as u128)
        .checked_mul(received_b as u128)
        .ok_or(LedgerError::Overflow)?;
    u64::try_from(integer_sqrt(product)).map_err(|_| LedgerError::Overflow)
}

/// Shares minted by a deposit into a non-empty pool:
/// min(received_a * total / reserve_a, received_b * total / reserve_b).
pub fn subsequent_shares(
    received_a: u64,
    received_b: u64,
    reserve_a: u64,
    reserve_b: u64,
    total_shares: u64,
) -> Result<u64, LedgerError> {
    let via_a = (received_a as u128)
        .checked_mul(total_shares as u128)
        .ok_or(LedgerError::Overflow)?
        / reserve_a as u128;
    let via_b = (received_b as u128)
        .checked_mul(total_shares as u128)
        .ok_or(LedgerError::Overflow)?
        / reserve_b as u128;
    u64::try_from(via_a.min(via_b)).map_err(|_| LedgerError::Overflow)
}

/// Pro-rata redemption for a share burn: floor(shares * reserve / total).
pub fn redemption_amount(shares: u64, reserve: u64, total_shares: u64) -> Result<u64, LedgerError> {
    let amount = (shares as u128)
        .checked_mul(reserve as u128)
        .ok_or(LedgerError::Overflow)?
        / total_shares as u128;
    u64::try_from(amount).map_err(|_| LedgerError::Overflow)
}

/// Output amount for a constant-product swap with the fee retained in the
/// pool: out = eff_in * reserve_out / (reserve_in * 10000 + eff_in) where
/// eff_in = received * (10000 - fee_bps). The result is always strictly
/// below reserve_out, so the u64 cast cannot truncate.
pub fn swap_output(
    amount_in_received: u64,
    reserve_in: u64,
    reserve_out: u64,
    fee_bps: u16,
) -> Result<u64, LedgerError> {
    let fee_multiplier = BPS_DENOMINATOR - fee_bps as u128;
    let effective_in = (amount_in_received as u128)
        .checked_mul(fee_multiplier)
        .ok_or(LedgerError::Overflow)?;
    let numerator = effective_in
        .checked_mul(reserve_out as u128)
        .ok_or(LedgerError::Overflow)?;
    let denominator = (reserve_in as u128)
        .checked_mul(BPS_DENOMINATOR)
        .ok_or(LedgerError::Overflow)?
        .checked_add(effective_in)
        .ok_or(LedgerError::Overflow)?;
    u64::try_from(numerator / denominator).map_err(|_| LedgerError::Overflow)
}
