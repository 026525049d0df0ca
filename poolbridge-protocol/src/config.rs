use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

// Hard safety cap on the pool swap fee (5%).
pub const MAX_FEE_BPS: u16 = 500;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SystemConfig {
    // Pool ledger
    pub swap_fee_bps: u16, // 30 = 0.3%

    // Relayer coordinator
    pub auto_complete: bool, // submit revealed secrets on the counterpart ledger
    #[serde(with = "humantime_serde")]
    pub reconcile_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub ledger_call_timeout: Duration, // bound on every outbound ledger call

    // Mapping store
    pub mapping_store_path: PathBuf,
    pub mapping_store_key_hex: Option<String>, // 32-byte hex key enables encryption at rest

    // API surface
    pub api_bind_addr: String,
    pub api_token: Option<String>, // mutating calls require this bearer token when set
    #[serde(with = "humantime_serde")]
    pub rate_limit_window: Duration,
    pub rate_limit_max_requests: usize, // per caller per window
}

impl Default for SystemConfig {
    fn default() -> Self {
        SystemConfig {
            swap_fee_bps: 30,

            auto_complete: false,
            reconcile_interval: Duration::from_secs(30),
            ledger_call_timeout: Duration::from_secs(10),

            mapping_store_path: PathBuf::from("swap_mappings.json"),
            mapping_store_key_hex: None,

            api_bind_addr: "127.0.0.1:8787".to_string(),
            api_token: None,
            rate_limit_window: Duration::from_secs(60),
            rate_limit_max_requests: 60,
        }
    }
}
