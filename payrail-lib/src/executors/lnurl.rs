use std::sync::Arc;

use tracing::{info, warn};

use super::{InvoiceSettlement, LnurlResult};
use crate::address::LightningAddressRecord;
use crate::lnurl::LnurlInvoiceResolver;
use crate::PayrailError;

/// Pays a Lightning address by fetching an LNURL invoice and melting ecash
/// against it.
#[derive(Clone)]
pub struct LnurlExecutor {
    resolver: LnurlInvoiceResolver,
    settlement: Option<Arc<dyn InvoiceSettlement>>,
}

impl LnurlExecutor {
    pub fn new(
        resolver: LnurlInvoiceResolver,
        settlement: Option<Arc<dyn InvoiceSettlement>>,
    ) -> Self {
        Self {
            resolver,
            settlement,
        }
    }

    /// Whether an invoice settlement capability is configured.
    pub fn can_settle(&self) -> bool {
        self.settlement.is_some()
    }

    pub async fn execute(
        &self,
        record: &LightningAddressRecord,
        amount_sats: u64,
        comment: Option<&str>,
    ) -> LnurlResult {
        let mut result = LnurlResult {
            success: false,
            address: record.address.clone(),
            source: record.source,
            invoice: None,
            error: None,
        };

        let Some(settlement) = &self.settlement else {
            result.error = Some(PayrailError::Unsupported("invoice settlement").to_string());
            return result;
        };

        let Some(invoice) = self
            .resolver
            .resolve_and_get_invoice(&record.address, amount_sats, comment)
            .await
        else {
            result.error = Some(format!("could not obtain invoice from {}", record.address));
            return result;
        };
        result.invoice = Some(invoice.clone());

        match settlement.melt_invoice_to_payment(&invoice).await {
            Ok(true) => {
                info!(address = %record.address, source = %record.source, amount_sats, "Paid via LNURL");
                result.success = true;
            }
            Ok(false) => {
                warn!(address = %record.address, "Invoice melt was refused");
                result.error =
                    Some(PayrailError::payment("lnurl", "invoice melt was refused").to_string());
            }
            Err(e) => {
                warn!(address = %record.address, error = %e, "Invoice melt failed");
                result.error = Some(e.to_string());
            }
        }
        result
    }
}
