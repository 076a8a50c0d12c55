use std::sync::Arc;

use tracing::{info, warn};

use super::{DmResult, TokenMint};
use crate::gift_wrap::GiftWrapCodec;
use crate::nostr::{Keys, PublicKey};
use crate::PayrailError;

/// Mints a bearer token and delivers it inside a gift-wrapped DM.
#[derive(Clone)]
pub struct DmExecutor {
    codec: GiftWrapCodec,
    sender: Option<Keys>,
    mint: Option<Arc<dyn TokenMint>>,
    relays: Vec<String>,
    memo: String,
}

impl DmExecutor {
    pub fn new(
        codec: GiftWrapCodec,
        sender: Option<Keys>,
        mint: Option<Arc<dyn TokenMint>>,
        relays: Vec<String>,
        memo: impl Into<String>,
    ) -> Self {
        Self {
            codec,
            sender,
            mint,
            relays,
            memo: memo.into(),
        }
    }

    /// Whether both a mint and a sender identity are configured.
    pub fn is_available(&self) -> bool {
        self.mint.is_some() && self.sender.is_some()
    }

    pub async fn execute(&self, recipient: &PublicKey, amount_sats: u64) -> DmResult {
        let Some(mint) = &self.mint else {
            return DmResult::failed(*recipient, PayrailError::Unsupported("token mint").to_string());
        };
        let Some(sender) = &self.sender else {
            return DmResult::failed(
                *recipient,
                PayrailError::Unsupported("sender identity").to_string(),
            );
        };

        let token = match mint.mint_transferable_token(amount_sats).await {
            Ok(token) => token,
            Err(e) => {
                warn!(recipient = %recipient, error = %e, "Token mint failed");
                return DmResult::failed(*recipient, e.to_string());
            }
        };

        let content = format!("{}\n\n{}", self.memo, token);
        let gift_wrap = match GiftWrapCodec::wrap(&content, sender, recipient) {
            Ok(event) => event,
            Err(e) => {
                warn!(recipient = %recipient, amount_sats, error = %e, "Could not wrap minted token; returning it to the caller");
                return DmResult::undelivered(*recipient, token, e.to_string());
            }
        };

        match self.codec.publish(&gift_wrap, &self.relays).await {
            Ok(report) => {
                info!(
                    recipient = %recipient,
                    amount_sats,
                    accepted = report.accepted.len(),
                    "Delivered token via gift-wrapped DM"
                );
                DmResult {
                    success: true,
                    recipient: *recipient,
                    event_id: Some(gift_wrap.id),
                    accepted_relays: report.accepted,
                    error: None,
                    undelivered_token: None,
                }
            }
            Err(e) => {
                warn!(recipient = %recipient, amount_sats, error = %e, "Minted token was not delivered; returning it to the caller");
                DmResult::undelivered(*recipient, token, e.to_string())
            }
        }
    }
}
