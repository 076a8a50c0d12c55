//! LNURL-pay (LUD-06 / LUD-16) invoice resolution.
//!
//! Two HTTP round trips turn `name@domain` into a BOLT11 invoice:
//!
//! ```text
//! GET https://{domain}/.well-known/lnurlp/{name}
//!     -> { callback, minSendable, maxSendable, metadata, commentAllowed? }
//! GET {callback}?amount={msat}[&comment=...]
//!     -> { pr }
//! ```
//!
//! Every failure is logged and collapsed to `None`; the router moves on to the
//! next rail instead of propagating errors.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::address::split_lightning_address;
use crate::config::LnurlConfig;
use crate::{PayrailError, Result};

const PAY_REQUEST_TAG: &str = "payRequest";

/// A validated LNURL-pay endpoint. Bounds are in whole sats.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedLnurlEndpoint {
    pub callback: String,
    /// `minSendable` rounded up to whole sats.
    pub min_sendable: u64,
    /// `maxSendable` rounded down to whole sats.
    pub max_sendable: u64,
    /// Raw metadata string, as committed to by the invoice description hash.
    pub metadata: String,
    /// Maximum comment length the service accepts, if any.
    pub comment_allowed: Option<usize>,
}

impl ResolvedLnurlEndpoint {
    /// Whether `amount_sats` is within the endpoint's bounds.
    pub fn accepts(&self, amount_sats: u64) -> bool {
        (self.min_sendable..=self.max_sendable).contains(&amount_sats)
    }

    /// Truncate `comment` to what the endpoint allows.
    ///
    /// Returns `None` for an empty comment or an endpoint that accepts none.
    pub fn fit_comment<'a>(&self, comment: &'a str) -> Option<&'a str> {
        if comment.is_empty() {
            return None;
        }
        match self.comment_allowed {
            Some(0) => None,
            Some(limit) => Some(match comment.char_indices().nth(limit) {
                Some((cut, _)) => &comment[..cut],
                None => comment,
            }),
            None => Some(comment),
        }
    }
}

/// Resolves Lightning addresses to invoices over HTTP.
#[derive(Clone)]
pub struct LnurlInvoiceResolver {
    config: LnurlConfig,
    client: reqwest::Client,
}

impl LnurlInvoiceResolver {
    /// Create a resolver with the given configuration.
    pub fn new(config: LnurlConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| PayrailError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Create a resolver with default configuration.
    pub fn with_defaults() -> Result<Self> {
        Self::new(LnurlConfig::default())
    }

    /// Get the configuration.
    pub fn config(&self) -> &LnurlConfig {
        &self.config
    }

    /// Well-known discovery URL for `address`.
    ///
    /// The domain must parse as the URL's whole authority and the name is
    /// appended as a single path segment.
    pub fn discovery_url(&self, address: &str) -> Option<String> {
        let (name, domain) = split_lightning_address(address)?;
        let mut url =
            reqwest::Url::parse(&format!("{}://{}/", self.config.scheme(), domain)).ok()?;
        if url.path() != "/" || url.query().is_some() || !url.username().is_empty() {
            return None;
        }
        url.path_segments_mut()
            .ok()?
            .pop_if_empty()
            .extend([".well-known", "lnurlp", name]);
        Some(url.into())
    }

    /// Fetch and validate the pay endpoint behind `address`.
    #[instrument(skip(self))]
    pub async fn resolve_address(&self, address: &str) -> Option<ResolvedLnurlEndpoint> {
        let Some(url) = self.discovery_url(address) else {
            warn!("Not a lightning address");
            return None;
        };

        let body = match self.get_json(&url).await {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "LNURL discovery failed");
                return None;
            }
        };

        match self.parse_pay_request(&body) {
            Ok(endpoint) => {
                debug!(
                    min_sats = endpoint.min_sendable,
                    max_sats = endpoint.max_sendable,
                    "Resolved LNURL endpoint"
                );
                Some(endpoint)
            }
            Err(e) => {
                warn!(error = %e, "Rejected LNURL pay response");
                None
            }
        }
    }

    /// Request an invoice for `amount_sats` from a resolved endpoint.
    #[instrument(skip(self, endpoint, comment), fields(callback = %endpoint.callback))]
    pub async fn get_invoice(
        &self,
        endpoint: &ResolvedLnurlEndpoint,
        amount_sats: u64,
        comment: Option<&str>,
    ) -> Option<String> {
        if !endpoint.accepts(amount_sats) {
            warn!(
                min_sats = endpoint.min_sendable,
                max_sats = endpoint.max_sendable,
                "Amount outside endpoint bounds"
            );
            return None;
        }

        let url = match callback_url(endpoint, amount_sats, comment) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Cannot build callback URL");
                return None;
            }
        };

        let body = match self.get_json(url.as_str()).await {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "LNURL callback failed");
                return None;
            }
        };

        if let Some(reason) = error_status(&body) {
            warn!(reason = %reason, "LNURL callback returned error");
            return None;
        }

        match body.get("pr").and_then(Value::as_str).map(str::trim) {
            Some(pr) if !pr.is_empty() => Some(pr.to_string()),
            _ => {
                warn!("LNURL callback response has no invoice");
                None
            }
        }
    }

    /// Resolve `address` and request an invoice in one go.
    ///
    /// Returns `None` without contacting the callback when `amount_sats` is
    /// outside the endpoint bounds.
    pub async fn resolve_and_get_invoice(
        &self,
        address: &str,
        amount_sats: u64,
        comment: Option<&str>,
    ) -> Option<String> {
        let endpoint = self.resolve_address(address).await?;
        if !endpoint.accepts(amount_sats) {
            warn!(
                address,
                amount_sats,
                min_sats = endpoint.min_sendable,
                max_sats = endpoint.max_sendable,
                "Amount outside LNURL bounds"
            );
            return None;
        }
        self.get_invoice(&endpoint, amount_sats, comment).await
    }

    fn parse_pay_request(&self, body: &Value) -> Result<ResolvedLnurlEndpoint> {
        if let Some(reason) = error_status(body) {
            return Err(PayrailError::ValidationFailed(format!(
                "service returned error: {}",
                reason
            )));
        }

        if let Some(tag) = body.get("tag").and_then(Value::as_str) {
            if tag != PAY_REQUEST_TAG {
                return Err(PayrailError::invalid_data("tag", tag));
            }
        }

        let callback = body
            .get("callback")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| PayrailError::invalid_data("callback", "missing"))?;
        let callback_url = reqwest::Url::parse(callback)
            .map_err(|e| PayrailError::invalid_data("callback", e.to_string()))?;
        match callback_url.scheme() {
            "https" => {}
            "http" if self.config.allow_insecure_http => {}
            other => {
                return Err(PayrailError::invalid_data(
                    "callback",
                    format!("unsupported scheme {}", other),
                ))
            }
        }

        let min_msat = msat_field(body, "minSendable")?;
        let max_msat = msat_field(body, "maxSendable")?;
        if min_msat > max_msat {
            return Err(PayrailError::ValidationFailed(format!(
                "minSendable {} exceeds maxSendable {}",
                min_msat, max_msat
            )));
        }

        let min_sendable = min_msat.div_ceil(1000);
        let max_sendable = max_msat / 1000;
        if min_sendable > max_sendable {
            return Err(PayrailError::ValidationFailed(format!(
                "no whole-sat amount between {} and {} msat",
                min_msat, max_msat
            )));
        }

        let metadata = body
            .get("metadata")
            .and_then(Value::as_str)
            .ok_or_else(|| PayrailError::invalid_data("metadata", "missing"))?
            .to_string();

        let comment_allowed = body
            .get("commentAllowed")
            .and_then(Value::as_u64)
            .map(|n| n as usize);

        Ok(ResolvedLnurlEndpoint {
            callback: callback.to_string(),
            min_sendable,
            max_sendable,
            metadata,
            comment_allowed,
        })
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e, url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PayrailError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| PayrailError::Serialization(format!("Failed to parse LNURL response: {}", e)))
    }

    fn map_reqwest_error(&self, e: reqwest::Error, url: &str) -> PayrailError {
        if e.is_timeout() {
            PayrailError::ConnectionTimeout {
                operation: "LNURL request".to_string(),
                timeout_ms: self.config.timeout_secs * 1000,
            }
        } else if e.is_connect() {
            PayrailError::ConnectionFailed {
                target: url.to_string(),
                reason: e.to_string(),
            }
        } else {
            PayrailError::Transport(format!("LNURL request failed: {}", e))
        }
    }
}

/// Callback URL with `amount` (msat) and optional `comment` appended to any
/// query the service already put there.
fn callback_url(
    endpoint: &ResolvedLnurlEndpoint,
    amount_sats: u64,
    comment: Option<&str>,
) -> Result<reqwest::Url> {
    let amount_msat = amount_sats
        .checked_mul(1000)
        .ok_or_else(|| PayrailError::invalid_data("amount_sats", "overflows millisats"))?;
    let mut url = reqwest::Url::parse(&endpoint.callback)
        .map_err(|e| PayrailError::invalid_data("callback", e.to_string()))?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("amount", &amount_msat.to_string());
        if let Some(comment) = comment.and_then(|c| endpoint.fit_comment(c)) {
            query.append_pair("comment", comment);
        }
    }
    Ok(url)
}

/// `reason` of an LNURL `{"status":"ERROR"}` body.
fn error_status(body: &Value) -> Option<String> {
    let status = body.get("status").and_then(Value::as_str)?;
    if !status.eq_ignore_ascii_case("ERROR") {
        return None;
    }
    Some(
        body.get("reason")
            .and_then(Value::as_str)
            .unwrap_or("unspecified")
            .to_string(),
    )
}

/// Millisat amount that may arrive as an integer or an integral float.
fn msat_field(body: &Value, field: &str) -> Result<u64> {
    let value = body
        .get(field)
        .ok_or_else(|| PayrailError::invalid_data(field, "missing"))?;
    if let Some(n) = value.as_u64() {
        return Ok(n);
    }
    match value.as_f64() {
        Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => Ok(f as u64),
        _ => Err(PayrailError::invalid_data(field, "not a non-negative integer")),
    }
}
