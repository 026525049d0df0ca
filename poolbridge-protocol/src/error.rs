// Error taxonomy for the settlement engine.
//
// On-ledger failures (`LedgerError`) always abort the whole call with no
// partial state change. Off-ledger failures (`RelayerError`) additionally
// distinguish transient conditions, which the reconciliation worker retries,
// from resource conditions, which are reported via the status surface.

use thiserror::Error;

// Broad classification used by callers that only care about the failure
// class (API status mapping, retry policy).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    State,
    Security,
    Transient,
    Resource,
}

// Errors raised by the pool ledger and the atomic swap state machine.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    // Validation
    #[error("invalid amount")]
    InvalidAmount,
    #[error("identical assets")]
    IdenticalAssets,
    #[error("insufficient liquidity minted")]
    InsufficientLiquidityMinted,
    #[error("slippage tolerance exceeded")]
    SlippageExceeded,
    #[error("insufficient liquidity")]
    InsufficientLiquidity,
    #[error("insufficient share balance")]
    InsufficientShares,
    #[error("insufficient token balance")]
    InsufficientBalance,
    #[error("timelock is not in the future")]
    InvalidTimelock,
    #[error("arithmetic overflow")]
    Overflow,

    // State
    #[error("pool not found")]
    PoolNotFound,
    #[error("ledger is paused")]
    Paused,
    #[error("swap already exists")]
    SwapAlreadyExists,
    #[error("swap not found")]
    SwapNotFound,
    #[error("swap is not in the Created state")]
    SwapNotPending,
    #[error("timelock has expired")]
    TimelockExpired,
    #[error("timelock has not yet expired")]
    TimelockNotExpired,

    // Security
    #[error("unauthorized caller")]
    Unauthorized,
    #[error("secret does not match the committed hash")]
    SecretMismatch,
    #[error("bad transaction signature")]
    BadSignature,

    // Transient (only surfaces through ledger clients, never on-ledger)
    #[error("ledger call timed out")]
    Timeout,
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        use LedgerError::*;
        match self {
            InvalidAmount | IdenticalAssets | InsufficientLiquidityMinted
            | SlippageExceeded | InsufficientLiquidity | InsufficientShares
            | InsufficientBalance | InvalidTimelock | Overflow => ErrorKind::Validation,
            PoolNotFound | Paused | SwapAlreadyExists | SwapNotFound | SwapNotPending
            | TimelockExpired | TimelockNotExpired => ErrorKind::State,
            Unauthorized | SecretMismatch | BadSignature => ErrorKind::Security,
            Timeout => ErrorKind::Transient,
        }
    }
}

// Errors raised by the relayer coordinator and its API surface.
#[derive(Debug, Error)]
pub enum RelayerError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("rate limit exceeded")]
    RateLimited,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("transient failure: {0}")]
    Transient(String),
    #[error("resource failure: {0}")]
    Resource(String),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl RelayerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RelayerError::Validation(_) | RelayerError::NotFound(_) => ErrorKind::Validation,
            RelayerError::Unauthorized(_) | RelayerError::RateLimited => ErrorKind::Security,
            RelayerError::Transient(_) => ErrorKind::Transient,
            RelayerError::Resource(_) => ErrorKind::Resource,
            RelayerError::Ledger(e) => e.kind(),
        }
    }
}
