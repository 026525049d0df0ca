// Relayer coordinator: watches swap events on every connected ledger,
// keeps the durable origin->counterpart mapping, and drives completions.
//
// Delivery is at-least-once by design. The watch task and the periodic
// reconciliation pass can both attempt the same completion; the ledgers'
// terminal-state check turns the duplicate into a state error the
// coordinator treats as success.

use crate::config::SystemConfig;
use crate::data_structures::{AccountId, AssetId, SwapId};
use crate::error::{LedgerError, RelayerError};
use crate::htlc::{SwapRecord, SwapState};
use crate::onchain::{LedgerClient, LedgerEvent};
use crate::relayer::store::{MappingEntry, MappingStore};
use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

#[derive(Clone, Debug, Serialize)]
pub struct RelayerStatus {
    pub connected_chains: Vec<u64>,
    pub tracked_mappings: usize,
    pub reconcile_passes: u64,
    pub completions_submitted: u64,
    pub auto_complete: bool,
    pub event_watch_active: bool,
    pub store_load_error: Option<String>,
    pub last_resource_error: Option<String>,
}

pub struct RelayerCoordinator {
    config: SystemConfig,
    ledgers: Vec<Arc<dyn LedgerClient>>,
    store: Arc<MappingStore>,
    reconcile_passes: AtomicU64,
    completions_submitted: AtomicU64,
    event_watch_active: AtomicBool,
    last_resource_error: Mutex<Option<String>>,
}

impl RelayerCoordinator {
    pub fn new(
        config: SystemConfig,
        ledgers: Vec<Arc<dyn LedgerClient>>,
        store: Arc<MappingStore>,
    ) -> Self {
        RelayerCoordinator {
            config,
            ledgers,
            store,
            reconcile_passes: AtomicU64::new(0),
            completions_submitted: AtomicU64::new(0),
            event_watch_active: AtomicBool::new(false),
            last_resource_error: Mutex::new(None),
        }
    }

    pub fn ledgers(&self) -> &[Arc<dyn LedgerClient>] {
        &self.ledgers
    }

    fn client_for(&self, chain_id: u64) -> Result<&Arc<dyn LedgerClient>, RelayerError> {
        self.ledgers
            .iter()
            .find(|c| c.chain_id() == chain_id)
            .ok_or_else(|| RelayerError::Validation(format!("no ledger connection for chain {chain_id}")))
    }

    fn record_resource_error(&self, err: &RelayerError) {
        if let RelayerError::Resource(msg) = err {
            *self.last_resource_error.lock().unwrap() = Some(msg.clone());
        }
    }

    /// Registers a mapping between an existing origin swap and an existing
    /// counterpart swap so reconciliation starts tracking the pair.
    pub async fn start_watch(
        &self,
        origin_chain_id: u64,
        origin_swap_id: SwapId,
        counterpart_chain_id: u64,
        counterpart_swap_id: SwapId,
    ) -> Result<(), RelayerError> {
        let origin = self
            .client_for(origin_chain_id)?
            .get_swap(&origin_swap_id)
            .await?
            .ok_or_else(|| RelayerError::NotFound(format!("origin swap {origin_swap_id}")))?;
        if origin.state != SwapState::Created {
            return Err(RelayerError::Validation("origin swap is already terminal".to_string()));
        }
        let counterpart = self
            .client_for(counterpart_chain_id)?
            .get_swap(&counterpart_swap_id)
            .await?
            .ok_or_else(|| RelayerError::NotFound(format!("counterpart swap {counterpart_swap_id}")))?;
        if counterpart.secret_hash != origin.secret_hash {
            return Err(RelayerError::Validation(
                "counterpart swap commits to a different secret".to_string(),
            ));
        }

        let entry = MappingEntry {
            counterpart_swap_id,
            origin_chain_id,
            counterpart_chain_id,
            participant: counterpart.participant,
            asset: counterpart.asset,
            created_at: Utc::now(),
        };
        let result = self.store.insert(origin_swap_id, entry);
        if let Err(e) = &result {
            self.record_resource_error(e);
        }
        result
    }

    /// Locks the counterpart leg on `counterpart_chain_id` under the origin
    /// swap's secret hash and records the mapping. The counterpart timelock
    /// must expire before the origin's, otherwise the counterpart could be
    /// claimed after our own claim window on the origin has closed.
    #[allow(clippy::too_many_arguments)]
    pub async fn initiate_counterpart(
        &self,
        origin_chain_id: u64,
        origin_swap_id: SwapId,
        counterpart_chain_id: u64,
        participant: AccountId,
        asset: AssetId,
        amount: u64,
        timelock: i64,
    ) -> Result<SwapId, RelayerError> {
        let origin = self
            .client_for(origin_chain_id)?
            .get_swap(&origin_swap_id)
            .await?
            .ok_or_else(|| RelayerError::NotFound(format!("origin swap {origin_swap_id}")))?;
        if origin.state != SwapState::Created {
            return Err(RelayerError::Validation("origin swap is already terminal".to_string()));
        }
        if timelock >= origin.timelock {
            return Err(RelayerError::Validation(
                "counterpart timelock must expire before the origin timelock".to_string(),
            ));
        }

        let counterpart_swap_id = self
            .client_for(counterpart_chain_id)?
            .submit_initiate(&participant, &asset, amount, origin.secret_hash, timelock)
            .await?;

        let entry = MappingEntry {
            counterpart_swap_id,
            origin_chain_id,
            counterpart_chain_id,
            participant,
            asset,
            created_at: Utc::now(),
        };
        if let Err(e) = self.store.insert(origin_swap_id, entry) {
            // The counterpart lock already exists on ledger but reconciliation
            // can no longer see it; surface the durability failure loudly.
            log::error!("mapping for {origin_swap_id} could not be persisted: {e}");
            self.record_resource_error(&e);
            return Err(e);
        }
        log::info!(
            "counterpart {counterpart_swap_id} locked on chain {counterpart_chain_id} for origin {origin_swap_id}"
        );
        Ok(counterpart_swap_id)
    }

    /// Manual secret submission: completes whichever connected ledger holds
    /// the swap in its pending state. Returns the chain it completed on.
    pub async fn submit_secret(&self, swap_id: SwapId, preimage: &[u8]) -> Result<u64, RelayerError> {
        for client in &self.ledgers {
            match client.get_swap(&swap_id).await {
                Ok(Some(record)) if record.state == SwapState::Created => {
                    client.submit_complete(&swap_id, preimage).await?;
                    self.completions_submitted.fetch_add(1, Ordering::SeqCst);
                    return Ok(client.chain_id());
                }
                Ok(Some(_)) => {
                    return Err(RelayerError::Validation("swap is already terminal".to_string()))
                }
                Ok(None) => continue,
                Err(LedgerError::Timeout) => continue, // try the remaining ledgers
                Err(e) => return Err(e.into()),
            }
        }
        Err(RelayerError::NotFound(format!("swap {swap_id}")))
    }

    /// Completes the origin leg, then drops the mapping. The secret comes
    /// from the caller when supplied, otherwise from the reveal recorded by
    /// the completed counterpart swap.
    pub async fn complete_from_counterpart(
        &self,
        origin_swap_id: SwapId,
        secret_override: Option<&[u8]>,
    ) -> Result<(), RelayerError> {
        let entry = self
            .store
            .get(&origin_swap_id)
            .ok_or_else(|| RelayerError::NotFound(format!("mapping {origin_swap_id}")))?;

        let secret = match secret_override {
            Some(secret) => secret.to_vec(),
            None => {
                let counterpart = self
                    .client_for(entry.counterpart_chain_id)?
                    .get_swap(&entry.counterpart_swap_id)
                    .await?
                    .ok_or_else(|| {
                        RelayerError::NotFound(format!(
                            "counterpart swap {}",
                            entry.counterpart_swap_id
                        ))
                    })?;
                if counterpart.state != SwapState::Completed {
                    return Err(RelayerError::Validation(
                        "counterpart swap has not revealed a secret yet".to_string(),
                    ));
                }
                counterpart.revealed_secret.ok_or_else(|| {
                    RelayerError::Validation(
                        "counterpart swap record is missing its secret".to_string(),
                    )
                })?
            }
        };

        match self
            .client_for(entry.origin_chain_id)?
            .submit_complete(&origin_swap_id, &secret)
            .await
        {
            Ok(()) => {
                self.completions_submitted.fetch_add(1, Ordering::SeqCst);
                log::info!("origin {origin_swap_id} completed from counterpart reveal");
            }
            // A parallel attempt got there first; the outcome is the same.
            Err(LedgerError::SwapNotPending) => {}
            Err(e) => return Err(e.into()),
        }
        if let Err(e) = self.store.remove(&origin_swap_id) {
            self.record_resource_error(&e);
            return Err(e);
        }
        Ok(())
    }

    async fn handle_event(&self, event: LedgerEvent) {
        match event {
            LedgerEvent::SwapCompleted { swap_id, .. } => {
                if self.store.get(&swap_id).is_some() {
                    // Our origin leg was completed; the mapping is spent.
                    if let Err(e) = self.store.remove(&swap_id) {
                        self.record_resource_error(&e);
                    }
                    return;
                }
                if let Some(origin_id) = self.origin_for_counterpart(&swap_id) {
                    if self.config.auto_complete {
                        if let Err(e) = self.complete_from_counterpart(origin_id, None).await {
                            // Keep the mapping; the reconciler retries.
                            log::warn!("auto-complete for {origin_id} deferred: {e}");
                        }
                    }
                }
            }
            LedgerEvent::SwapRefunded { swap_id, .. } => {
                // A refunded leg on either side makes the pair dead.
                let origin_id = if self.store.get(&swap_id).is_some() {
                    Some(swap_id)
                } else {
                    self.origin_for_counterpart(&swap_id)
                };
                if let Some(origin_id) = origin_id {
                    if let Err(e) = self.store.remove(&origin_id) {
                        self.record_resource_error(&e);
                    }
                }
            }
            LedgerEvent::SwapInitiated { .. } => {}
        }
    }

    fn origin_for_counterpart(&self, counterpart_swap_id: &SwapId) -> Option<SwapId> {
        self.store
            .list()
            .into_iter()
            .find(|(_, entry)| entry.counterpart_swap_id == *counterpart_swap_id)
            .map(|(origin_id, _)| origin_id)
    }

    /// One reconciliation pass over every tracked mapping. Transient
    /// failures leave the entry in place for the next pass.
    pub async fn reconcile_once(&self) {
        for (origin_id, entry) in self.store.list() {
            // Origin already terminal: the mapping is spent regardless of how.
            if let Some(record) = self.lookup(entry.origin_chain_id, &origin_id).await {
                if record.state != SwapState::Created {
                    if let Err(e) = self.store.remove(&origin_id) {
                        self.record_resource_error(&e);
                    }
                    continue;
                }
            }

            match self.lookup(entry.counterpart_chain_id, &entry.counterpart_swap_id).await {
                Some(record) if record.state == SwapState::Completed => {
                    if self.config.auto_complete {
                        if let Err(e) = self.complete_from_counterpart(origin_id, None).await {
                            log::warn!("reconcile: completion of {origin_id} deferred: {e}");
                        }
                    }
                }
                Some(record) if record.state == SwapState::Refunded => {
                    if let Err(e) = self.store.remove(&origin_id) {
                        self.record_resource_error(&e);
                    }
                }
                _ => {}
            }
        }
        self.reconcile_passes.fetch_add(1, Ordering::SeqCst);
    }

    async fn lookup(&self, chain_id: u64, swap_id: &SwapId) -> Option<SwapRecord> {
        let client = self.client_for(chain_id).ok()?;
        client.get_swap(swap_id).await.ok().flatten()
    }

    /// Spawns one watch task per connected ledger and marks the live
    /// event watch active for the status surface.
    pub fn spawn_watchers(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        self.event_watch_active.store(true, Ordering::SeqCst);
        self.ledgers
            .iter()
            .map(|client| {
                let mut events = client.subscribe();
                let chain_id = client.chain_id();
                let coordinator = self.clone();
                tokio::spawn(async move {
                    loop {
                        match events.recv().await {
                            Ok(event) => coordinator.handle_event(event).await,
                            Err(RecvError::Lagged(missed)) => {
                                // Dropped events are recovered by reconciliation.
                                log::warn!("chain {chain_id} watcher lagged by {missed} events");
                            }
                            Err(RecvError::Closed) => break,
                        }
                    }
                })
            })
            .collect()
    }

    /// Spawns the periodic reconciler. A single loop runs the passes, so
    /// two passes never overlap even when one runs long.
    pub fn spawn_reconciler(self: &Arc<Self>) -> JoinHandle<()> {
        let coordinator = self.clone();
        let period = self.config.reconcile_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                coordinator.reconcile_once().await;
            }
        })
    }

    pub fn status(&self) -> RelayerStatus {
        RelayerStatus {
            connected_chains: self.ledgers.iter().map(|c| c.chain_id()).collect(),
            tracked_mappings: self.store.len(),
            reconcile_passes: self.reconcile_passes.load(Ordering::SeqCst),
            completions_submitted: self.completions_submitted.load(Ordering::SeqCst),
            auto_complete: self.config.auto_complete,
            event_watch_active: self.event_watch_active.load(Ordering::SeqCst),
            store_load_error: self.store.load_error(),
            last_resource_error: self.last_resource_error.lock().unwrap().clone(),
        }
    }

    pub fn mappings(&self) -> Vec<(SwapId, MappingEntry)> {
        self.store.list()
    }

    pub fn remove_mapping(&self, origin_swap_id: &SwapId) -> Result<bool, RelayerError> {
        let removed = self.store.remove(origin_swap_id);
        if let Err(e) = &removed {
            self.record_resource_error(e);
        }
        Ok(removed?.is_some())
    }
}
