// Route aggregation: ask every connected ledger for a quote on the same
// symbol pair and keep the strictly best integer output. Ledgers that
// cannot quote the pair are skipped rather than failing the aggregate.

use crate::data_structures::{AssetId, Quote};
use crate::error::RelayerError;
use crate::onchain::LedgerClient;
use futures::future::join_all;
use std::sync::Arc;

/// Best quote for `amount_in` of `symbol_in` into `symbol_out` across all
/// connections. Comparison is strictly-greater, so among equal outputs the
/// first connection queried wins. `None` means no ledger could quote.
pub async fn find_best_route(
    ledgers: &[Arc<dyn LedgerClient>],
    symbol_in: &str,
    symbol_out: &str,
    amount_in: u64,
) -> Result<Option<Quote>, RelayerError> {
    if amount_in == 0 {
        return Err(RelayerError::Validation("amount_in must be positive".to_string()));
    }

    let quotes = join_all(ledgers.iter().map(|client| {
        let asset_in = AssetId { chain_id: client.chain_id(), symbol: symbol_in.to_string() };
        let asset_out = AssetId { chain_id: client.chain_id(), symbol: symbol_out.to_string() };
        async move { client.quote(&asset_in, &asset_out, amount_in).await }
    }))
    .await;

    let mut best: Option<Quote> = None;
    for quote in quotes {
        match quote {
            Ok(quote) => {
                let better = best
                    .as_ref()
                    .map(|b| quote.amount_out > b.amount_out)
                    .unwrap_or(true);
                if better {
                    best = Some(quote);
                }
            }
            Err(e) => {
                log::debug!("route candidate skipped: {e}");
            }
        }
    }
    Ok(best)
}
