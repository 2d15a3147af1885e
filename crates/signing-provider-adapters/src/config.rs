#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub skip_lookup_network: bool,
    pub rollback_on_failed_switch: bool,
    pub rpc_timeout_ms: Option<u64>,
    pub eip1559_priority_fee_fallback_wei: u128,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            skip_lookup_network: false,
            rollback_on_failed_switch: false,
            rpc_timeout_ms: None,
            eip1559_priority_fee_fallback_wei: 1_500_000_000,
        }
    }
}

impl ProviderConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            skip_lookup_network: env_flag("SIGNING_PROVIDER_SKIP_LOOKUP_NETWORK")
                .unwrap_or(defaults.skip_lookup_network),
            rollback_on_failed_switch: env_flag("SIGNING_PROVIDER_ROLLBACK_ON_FAILED_SWITCH")
                .unwrap_or(defaults.rollback_on_failed_switch),
            rpc_timeout_ms: std::env::var("SIGNING_PROVIDER_RPC_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|ms| *ms > 0)
                .or(defaults.rpc_timeout_ms),
            eip1559_priority_fee_fallback_wei: std::env::var(
                "SIGNING_PROVIDER_PRIORITY_FEE_FALLBACK_WEI",
            )
            .ok()
            .and_then(|v| v.trim().parse::<u128>().ok())
            .unwrap_or(defaults.eip1559_priority_fee_fallback_wei),
        }
    }
}

fn env_flag(key: &str) -> Option<bool> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
