// Composition root for a relayer process. Everything configurable is
// wired here from one SystemConfig: the durable mapping store (with its
// optional at-rest key), the request limiter, the coordinator, and the
// HTTP surface.

use crate::config::SystemConfig;
use crate::crypto::SecretKey;
use crate::data_structures::AccountId;
use crate::error::{LedgerError, RelayerError};
use crate::htlc::SystemTimeSource;
use crate::onchain::{LedgerClient, LocalLedger, LocalLedgerClient};
use crate::relayer::api::{self, ApiState};
use crate::relayer::coordinator::RelayerCoordinator;
use crate::relayer::ratelimit::RateLimiter;
use crate::relayer::store::{parse_key_hex, MappingStore};
use axum::Router;
use std::sync::Arc;

/// Boots an in-process ledger node with the configured pool swap fee.
pub fn local_ledger(
    config: &SystemConfig,
    chain_id: u64,
    authority: AccountId,
) -> Result<Arc<LocalLedger>, LedgerError> {
    let ledger =
        LocalLedger::new(chain_id, config.swap_fee_bps, authority, Arc::new(SystemTimeSource))?;
    Ok(Arc::new(ledger))
}

/// Connects to a ledger as the given signer, bounding every outbound
/// call by the configured timeout.
pub fn connect_local(
    config: &SystemConfig,
    ledger: Arc<LocalLedger>,
    signer: SecretKey,
) -> Arc<dyn LedgerClient> {
    Arc::new(LocalLedgerClient::new(ledger, signer, config.ledger_call_timeout))
}

pub struct RelayerService {
    coordinator: Arc<RelayerCoordinator>,
    api_state: Arc<ApiState>,
    bind_addr: String,
}

impl std::fmt::Debug for RelayerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayerService")
            .field("bind_addr", &self.bind_addr)
            .finish_non_exhaustive()
    }
}

impl RelayerService {
    /// Assembles the store, limiter, coordinator, and API state. Fails
    /// only on a malformed store key; a missing or corrupt store file is
    /// surfaced through the status endpoint instead.
    pub fn build(
        config: SystemConfig,
        ledgers: Vec<Arc<dyn LedgerClient>>,
    ) -> Result<RelayerService, RelayerError> {
        let key = config
            .mapping_store_key_hex
            .as_deref()
            .map(parse_key_hex)
            .transpose()?;
        let store = Arc::new(MappingStore::open(&config.mapping_store_path, key));
        let limiter = Arc::new(RateLimiter::new(
            config.rate_limit_window,
            config.rate_limit_max_requests,
        ));
        let api_token = config.api_token.clone();
        let bind_addr = config.api_bind_addr.clone();
        let coordinator = Arc::new(RelayerCoordinator::new(config, ledgers, store));
        let api_state = Arc::new(ApiState {
            coordinator: coordinator.clone(),
            limiter,
            api_token,
        });
        Ok(RelayerService { coordinator, api_state, bind_addr })
    }

    pub fn coordinator(&self) -> &Arc<RelayerCoordinator> {
        &self.coordinator
    }

    pub fn router(&self) -> Router {
        api::router(self.api_state.clone())
    }

    /// Starts the event watchers and the periodic reconciler, then serves
    /// the API on the configured address until the listener fails.
    pub async fn run(self) -> std::io::Result<()> {
        let _watchers = self.coordinator.spawn_watchers();
        let _reconciler = self.coordinator.spawn_reconciler();
        api::serve(self.api_state, &self.bind_addr).await
    }
}
