use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{DirectResult, DirectWallet};

/// Pays through the host's self-custodial Lightning wallet.
#[derive(Clone)]
pub struct DirectWalletExecutor {
    wallet: Arc<dyn DirectWallet>,
}

impl DirectWalletExecutor {
    pub fn new(wallet: Arc<dyn DirectWallet>) -> Self {
        Self { wallet }
    }

    /// Whether the wallet is ready and can cover `amount_sats`.
    ///
    /// A balance lookup failure counts as not eligible.
    pub async fn is_eligible(&self, amount_sats: u64) -> bool {
        if !self.wallet.is_initialized().await {
            debug!("Direct wallet not initialized");
            return false;
        }
        match self.wallet.balance_sats().await {
            Ok(balance) if balance >= amount_sats => true,
            Ok(balance) => {
                debug!(balance, amount_sats, "Direct wallet balance too low");
                false
            }
            Err(e) => {
                warn!(error = %e, "Direct wallet balance lookup failed");
                false
            }
        }
    }

    /// Pay `address`.
    pub async fn execute(
        &self,
        address: &str,
        amount_sats: u64,
        comment: Option<&str>,
    ) -> DirectResult {
        let result = self.wallet.pay_address(address, amount_sats, comment).await;
        if result.success {
            info!(address, amount_sats, "Paid via direct wallet");
        } else {
            warn!(
                address,
                amount_sats,
                error = result.error.as_deref().unwrap_or("unknown"),
                "Direct wallet payment failed"
            );
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockDirectWallet;

    #[tokio::test]
    async fn test_eligibility() {
        let ready = DirectWalletExecutor::new(Arc::new(MockDirectWallet::new().with_balance(1_000)));
        assert!(ready.is_eligible(1_000).await);
        assert!(!ready.is_eligible(1_001).await);

        let cold = DirectWalletExecutor::new(Arc::new(
            MockDirectWallet::new().with_balance(1_000).uninitialized(),
        ));
        assert!(!cold.is_eligible(1).await);

        let broken = DirectWalletExecutor::new(Arc::new(MockDirectWallet::new().with_balance_error()));
        assert!(!broken.is_eligible(1).await);
    }

    #[tokio::test]
    async fn test_execute_passes_through() {
        let wallet = Arc::new(MockDirectWallet::new().with_balance(500));
        let executor = DirectWalletExecutor::new(wallet.clone());

        let result = executor.execute("bob@example.com", 100, Some("gm")).await;
        assert!(result.success);
        assert_eq!(
            wallet.payments(),
            vec![("bob@example.com".to_string(), 100, Some("gm".to_string()))]
        );

        let failing = DirectWalletExecutor::new(Arc::new(MockDirectWallet::new().failing("no route")));
        let result = failing.execute("bob@example.com", 100, None).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("no route"));
    }
}
