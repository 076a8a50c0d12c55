//! Configuration types for the router and its collaborators.
//!
//! Every struct deserializes with defaults for missing fields, so a host can
//! ship a partial JSON/TOML blob and only override what it cares about.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Domain of the deterministic custodial fallback address.
pub const DEFAULT_FALLBACK_DOMAIN: &str = "npub.cash";

/// Memo prepended to tokens delivered over the DM rail.
pub const DEFAULT_DM_MEMO: &str = "You received a payment";

/// Configuration for the LNURL-pay resolver.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LnurlConfig {
    /// Request timeout in seconds.
    #[serde(default = "default_lnurl_timeout")]
    pub timeout_secs: u64,

    /// Use `http://` for discovery instead of `https://`.
    ///
    /// Only meant for local test servers.
    #[serde(default)]
    pub allow_insecure_http: bool,
}

fn default_lnurl_timeout() -> u64 {
    15
}

impl Default for LnurlConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_lnurl_timeout(),
            allow_insecure_http: false,
        }
    }
}

impl LnurlConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Allow plain HTTP discovery.
    pub fn with_insecure_http(mut self, allow: bool) -> Self {
        self.allow_insecure_http = allow;
        self
    }

    /// URL scheme used for discovery requests.
    pub fn scheme(&self) -> &'static str {
        if self.allow_insecure_http {
            "http"
        } else {
            "https"
        }
    }

    pub(crate) fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Configuration for the relay-backed profile store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileStoreConfig {
    /// Relays queried for kind-0 metadata.
    #[serde(default)]
    pub relays: Vec<String>,

    /// How long to wait for stored events before giving up, in milliseconds.
    #[serde(default = "default_profile_timeout")]
    pub timeout_ms: u64,
}

fn default_profile_timeout() -> u64 {
    4000
}

impl ProfileStoreConfig {
    /// Create a configuration querying `relays`.
    pub fn new(relays: Vec<String>) -> Self {
        Self {
            relays,
            timeout_ms: default_profile_timeout(),
        }
    }

    /// Set the lookup timeout.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub(crate) fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Configuration for [`crate::routing::PaymentRouter`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Relays gift wraps are published to.
    #[serde(default)]
    pub relays: Vec<String>,

    /// Domain used to build `{npub}@{domain}` when a profile has no address.
    #[serde(default = "default_fallback_domain")]
    pub fallback_domain: String,

    /// Minimum spacing between payouts in a batch, in milliseconds.
    #[serde(default = "default_payout_interval")]
    pub payout_interval_ms: u64,

    /// Comment attached to direct and LNURL payments.
    #[serde(default)]
    pub payment_comment: Option<String>,

    /// Text placed above the token in DM deliveries.
    #[serde(default = "default_dm_memo")]
    pub dm_memo: String,
}

fn default_fallback_domain() -> String {
    DEFAULT_FALLBACK_DOMAIN.to_string()
}

fn default_payout_interval() -> u64 {
    1500
}

fn default_dm_memo() -> String {
    DEFAULT_DM_MEMO.to_string()
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            relays: Vec::new(),
            fallback_domain: default_fallback_domain(),
            payout_interval_ms: default_payout_interval(),
            payment_comment: None,
            dm_memo: default_dm_memo(),
        }
    }
}

impl RouterConfig {
    /// Create a configuration publishing to `relays`.
    pub fn new(relays: Vec<String>) -> Self {
        Self {
            relays,
            ..Self::default()
        }
    }

    /// Set the fallback address domain.
    pub fn with_fallback_domain(mut self, domain: impl Into<String>) -> Self {
        self.fallback_domain = domain.into();
        self
    }

    /// Set the spacing between batch payouts.
    pub fn with_payout_interval_ms(mut self, interval_ms: u64) -> Self {
        self.payout_interval_ms = interval_ms;
        self
    }

    /// Set the payment comment.
    pub fn with_payment_comment(mut self, comment: impl Into<String>) -> Self {
        self.payment_comment = Some(comment.into());
        self
    }

    /// Set the DM memo.
    pub fn with_dm_memo(mut self, memo: impl Into<String>) -> Self {
        self.dm_memo = memo.into();
        self
    }

    /// Build from defaults overridden by environment variables.
    ///
    /// Reads `PAYRAIL_RELAYS` (comma separated), `PAYRAIL_FALLBACK_DOMAIN`
    /// and `PAYRAIL_PAYOUT_INTERVAL_MS`. Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(relays) = std::env::var("PAYRAIL_RELAYS") {
            config.relays = parse_relay_list(&relays);
        }

        if let Ok(domain) = std::env::var("PAYRAIL_FALLBACK_DOMAIN") {
            let domain = domain.trim();
            if !domain.is_empty() {
                config = config.with_fallback_domain(domain);
            }
        }

        if let Ok(interval) = std::env::var("PAYRAIL_PAYOUT_INTERVAL_MS") {
            if let Ok(ms) = interval.trim().parse::<u64>() {
                config = config.with_payout_interval_ms(ms);
            }
        }

        config
    }

    pub(crate) fn payout_interval(&self) -> Duration {
        Duration::from_millis(self.payout_interval_ms)
    }
}

/// Split a comma separated relay list, dropping blanks.
pub fn parse_relay_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
