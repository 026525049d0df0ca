use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

// Represent a user account on some chain
#[derive(Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountId {
    pub chain_id: u64,
    pub address: String, // Using String for simplicity, could be a fixed-size type
}

// Represent a specific asset on a specific chain.
// Ordering is (chain_id, symbol), which is what canonical pool identity uses.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId {
    pub chain_id: u64,
    pub symbol: String, // e.g. "ETH", "USDC"
}

// Deterministic pool identity: hash of the two asset identifiers in canonical
// (sorted) order, so liquidity supplied in either argument order resolves to
// the same pool.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct PoolId(pub [u8; 32]);

impl PoolId {
    pub fn derive(a: &AssetId, b: &AssetId) -> PoolId {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        let mut hasher = Sha256::new();
        hasher.update(b"pool");
        hasher.update(first.chain_id.to_be_bytes());
        hasher.update(first.symbol.as_bytes());
        hasher.update(second.chain_id.to_be_bytes());
        hasher.update(second.symbol.as_bytes());
        PoolId(hasher.finalize().into())
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

// Deterministic atomic-swap identity. Bound to the *actually received* amount
// rather than the caller-claimed nominal amount, so the identifier always
// reflects real escrowed value.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct SwapId(pub [u8; 32]);

impl SwapId {
    pub fn derive(
        initiator: &AccountId,
        participant: &AccountId,
        asset: &AssetId,
        received_amount: u64,
        secret_hash: &[u8; 32],
        timelock: i64,
    ) -> SwapId {
        let mut hasher = Sha256::new();
        hasher.update(b"atomic_swap");
        hasher.update(initiator.chain_id.to_be_bytes());
        hasher.update(initiator.address.as_bytes());
        hasher.update(participant.address.as_bytes());
        hasher.update(asset.chain_id.to_be_bytes());
        hasher.update(asset.symbol.as_bytes());
        hasher.update(received_amount.to_be_bytes());
        hasher.update(secret_hash);
        hasher.update(timelock.to_be_bytes());
        SwapId(hasher.finalize().into())
    }

    pub fn from_hex(s: &str) -> Option<SwapId> {
        let bytes = hex::decode(s).ok()?;
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(SwapId(arr))
    }
}

impl fmt::Display for SwapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

// Serialize swap ids as hex strings so the mapping-store file and the API
// surface stay human-readable.
impl Serialize for SwapId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for SwapId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        SwapId::from_hex(&s).ok_or_else(|| serde::de::Error::custom("expected 32-byte hex swap id"))
    }
}

// A single pool quote. Ephemeral: computed on demand, never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Quote {
    pub asset_in: AssetId,
    pub asset_out: AssetId,
    pub amount_in: u64,
    pub amount_out: u64,
    pub chain_id: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn asset(chain_id: u64, symbol: &str) -> AssetId {
        AssetId { chain_id, symbol: symbol.to_string() }
    }

    #[test]
    fn account_id_equality_and_hash() {
        let acc1 = AccountId { chain_id: 1, address: "addr1".to_string() };
        let acc2 = AccountId { chain_id: 1, address: "addr1".to_string() };
        let acc3 = AccountId { chain_id: 2, address: "addr1".to_string() };

        assert_eq!(acc1, acc2);
        assert_ne!(acc1, acc3);

        let mut set = HashSet::new();
        set.insert(acc1);
        set.insert(acc2); // duplicate, should not grow the set
        set.insert(acc3);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn pool_id_is_order_insensitive() {
        let usdc = asset(1, "USDC");
        let eth = asset(1, "ETH");
        assert_eq!(PoolId::derive(&usdc, &eth), PoolId::derive(&eth, &usdc));
        assert_ne!(PoolId::derive(&usdc, &eth), PoolId::derive(&usdc, &asset(1, "DAI")));
    }

    #[test]
    fn swap_id_binds_received_amount() {
        let initiator = AccountId { chain_id: 1, address: "alice".to_string() };
        let participant = AccountId { chain_id: 1, address: "bob".to_string() };
        let tok = asset(1, "TOK");
        let hash = [7u8; 32];

        let id_nominal = SwapId::derive(&initiator, &participant, &tok, 1000, &hash, 500);
        let id_received = SwapId::derive(&initiator, &participant, &tok, 990, &hash, 500);
        assert_ne!(id_nominal, id_received);

        // Same inputs always give the same id
        assert_eq!(id_received, SwapId::derive(&initiator, &participant, &tok, 990, &hash, 500));
    }

    #[test]
    fn swap_id_hex_round_trip() {
        let id = SwapId([3u8; 32]);
        let encoded = id.to_string();
        assert_eq!(SwapId::from_hex(&encoded), Some(id));
        assert_eq!(SwapId::from_hex("not-hex"), None);
        assert_eq!(SwapId::from_hex("ff"), None); // wrong length

        let json = serde_json::to_string(&id).unwrap();
        let back: SwapId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
