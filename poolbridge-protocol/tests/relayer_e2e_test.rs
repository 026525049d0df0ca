// Full relayer flow across two in-process ledgers: lock on the origin
// chain, counterpart lock, user reveal, event-driven completion, and
// mapping durability across a coordinator restart.

use poolbridge_protocol::config::SystemConfig;
use poolbridge_protocol::crypto::{self, generate_keypair, hash_secret, SecretKey};
use poolbridge_protocol::data_structures::{AccountId, AssetId};
use poolbridge_protocol::htlc::{SwapState, SystemTimeSource, TimeSource};
use poolbridge_protocol::onchain::{LedgerClient, LocalLedger, LocalLedgerClient};
use poolbridge_protocol::relayer::{MappingStore, RelayerCoordinator};
use poolbridge_protocol::routing::find_best_route;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn account_for(key: &SecretKey, chain_id: u64) -> AccountId {
    AccountId {
        chain_id,
        address: crypto::derive_address(&key.verifying_key()),
    }
}

fn tok(chain_id: u64) -> AssetId {
    AssetId { chain_id, symbol: "TOK".to_string() }
}

fn far(seconds: i64) -> i64 {
    SystemTimeSource.unix_now() + seconds
}

fn new_ledger(chain_id: u64) -> Arc<LocalLedger> {
    Arc::new(
        LocalLedger::new(
            chain_id,
            30,
            AccountId { chain_id, address: "authority".to_string() },
            Arc::new(SystemTimeSource),
        )
        .unwrap(),
    )
}

fn client(ledger: &Arc<LocalLedger>, key: SecretKey) -> LocalLedgerClient {
    LocalLedgerClient::new(ledger.clone(), key, Duration::from_secs(5))
}

fn coordinator(
    store_path: &Path,
    origin: &Arc<LocalLedger>,
    counterpart: &Arc<LocalLedger>,
    origin_key: SecretKey,
    counterpart_key: SecretKey,
) -> Arc<RelayerCoordinator> {
    let clients: Vec<Arc<dyn LedgerClient>> = vec![
        Arc::new(client(origin, origin_key)),
        Arc::new(client(counterpart, counterpart_key)),
    ];
    let store = Arc::new(MappingStore::open(store_path, None));
    let config = SystemConfig { auto_complete: true, ..SystemConfig::default() };
    Arc::new(RelayerCoordinator::new(config, clients, store))
}

async fn wait_for<F: Fn() -> bool>(what: &str, cond: F) {
    for _ in 0..100 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("timed out waiting for {what}");
}

#[tokio::test]
async fn watcher_relays_the_reveal_back_to_the_origin_chain() {
    let origin = new_ledger(1);
    let counterpart = new_ledger(2);

    let relayer_origin_key = generate_keypair();
    let relayer_counterpart_key = generate_keypair();
    let relayer_origin_account = account_for(&relayer_origin_key, 1);
    let relayer_counterpart_account = account_for(&relayer_counterpart_key, 2);

    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("mappings.json");
    let coordinator = coordinator(
        &store_path,
        &origin,
        &counterpart,
        relayer_origin_key,
        relayer_counterpart_key.clone(),
    );
    let _watchers = coordinator.spawn_watchers();

    // User locks 1,000 TOK on chain 1 toward the relayer.
    let user_origin_key = generate_keypair();
    let user_origin = account_for(&user_origin_key, 1);
    origin.tokens.mint(&user_origin, &tok(1), 1_000);
    let secret = b"cross-chain-secret";
    let origin_id = client(&origin, user_origin_key)
        .submit_initiate(&relayer_origin_account, &tok(1), 1_000, hash_secret(secret), far(7_200))
        .await
        .unwrap();

    // Relayer locks the counterpart leg on chain 2 toward the user, under
    // the same hash and a shorter timelock.
    counterpart.tokens.mint(&relayer_counterpart_account, &tok(2), 1_000);
    let user_counterpart_key = generate_keypair();
    let user_counterpart = account_for(&user_counterpart_key, 2);
    let counterpart_id = coordinator
        .initiate_counterpart(1, origin_id, 2, user_counterpart.clone(), tok(2), 990, far(3_600))
        .await
        .unwrap();
    assert_eq!(coordinator.mappings().len(), 1);

    // User claims chain 2, revealing the secret on ledger.
    client(&counterpart, user_counterpart_key)
        .submit_complete(&counterpart_id, secret)
        .await
        .unwrap();
    assert_eq!(counterpart.tokens.balance_of(&user_counterpart, &tok(2)), 990);

    // The watch task picks up the reveal and completes the origin leg.
    wait_for("origin completion", || {
        origin.htlc.get(&origin_id).map(|r| r.state) == Some(SwapState::Completed)
    })
    .await;
    assert_eq!(origin.tokens.balance_of(&relayer_origin_account, &tok(1)), 1_000);
    wait_for("mapping cleanup", || coordinator.mappings().is_empty()).await;

    let status = coordinator.status();
    assert_eq!(status.completions_submitted, 1);
    assert_eq!(status.tracked_mappings, 0);
    assert!(status.event_watch_active);
}

#[tokio::test]
async fn restart_recovers_pending_mappings_and_reconciles() {
    let origin = new_ledger(1);
    let counterpart = new_ledger(2);

    let relayer_origin_key = generate_keypair();
    let relayer_counterpart_key = generate_keypair();
    let relayer_origin_account = account_for(&relayer_origin_key, 1);
    let relayer_counterpart_account = account_for(&relayer_counterpart_key, 2);

    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("mappings.json");

    // First coordinator instance records the mapping, then "crashes"
    // (dropped without ever seeing the reveal).
    let first = coordinator(
        &store_path,
        &origin,
        &counterpart,
        relayer_origin_key.clone(),
        relayer_counterpart_key.clone(),
    );

    let user_origin_key = generate_keypair();
    let user_origin = account_for(&user_origin_key, 1);
    origin.tokens.mint(&user_origin, &tok(1), 1_000);
    let secret = b"survives-restart";
    let origin_id = client(&origin, user_origin_key)
        .submit_initiate(&relayer_origin_account, &tok(1), 1_000, hash_secret(secret), far(7_200))
        .await
        .unwrap();

    counterpart.tokens.mint(&relayer_counterpart_account, &tok(2), 1_000);
    let user_counterpart_key = generate_keypair();
    let user_counterpart = account_for(&user_counterpart_key, 2);
    let counterpart_id = first
        .initiate_counterpart(1, origin_id, 2, user_counterpart, tok(2), 990, far(3_600))
        .await
        .unwrap();
    drop(first);

    // The reveal happens while no coordinator is running.
    client(&counterpart, user_counterpart_key)
        .submit_complete(&counterpart_id, secret)
        .await
        .unwrap();

    // A fresh instance reloads the mapping from disk and the first
    // reconciliation pass finishes the job.
    let second = coordinator(
        &store_path,
        &origin,
        &counterpart,
        relayer_origin_key,
        relayer_counterpart_key,
    );
    assert_eq!(second.mappings().len(), 1);
    second.reconcile_once().await;

    assert_eq!(origin.htlc.get(&origin_id).unwrap().state, SwapState::Completed);
    assert!(second.mappings().is_empty());

    // Reconciliation is idempotent once the store is drained.
    second.reconcile_once().await;
    assert_eq!(second.status().reconcile_passes, 2);
    assert_eq!(second.status().completions_submitted, 1);
}

#[tokio::test]
async fn route_aggregation_spans_both_ledgers() {
    let deep = new_ledger(1);
    let shallow = new_ledger(2);

    for (ledger, depth) in [(&deep, 1_000_000u64), (&shallow, 10_000u64)] {
        let lp = AccountId { chain_id: ledger.chain_id(), address: "lp".to_string() };
        let a = AssetId { chain_id: ledger.chain_id(), symbol: "AAA".to_string() };
        let b = AssetId { chain_id: ledger.chain_id(), symbol: "BBB".to_string() };
        ledger.tokens.mint(&lp, &a, depth);
        ledger.tokens.mint(&lp, &b, depth);
        ledger.pools.add_liquidity(&lp, &a, &b, depth, depth, 0).unwrap();
    }

    let clients: Vec<Arc<dyn LedgerClient>> = vec![
        Arc::new(client(&deep, generate_keypair())),
        Arc::new(client(&shallow, generate_keypair())),
    ];

    // The deep pool has less price impact, so it wins for any real size.
    let best = find_best_route(&clients, "AAA", "BBB", 1_000).await.unwrap().unwrap();
    assert_eq!(best.chain_id, 1);
    assert_eq!(best.amount_out, 996);

    // A pair no ledger trades yields no route rather than an error.
    let none = find_best_route(&clients, "AAA", "ZZZ", 1_000).await.unwrap();
    assert!(none.is_none());
}
