//! Carrier ID resolution.
//!
//! Configured IDs win. Otherwise the account's carriers are listed once and
//! kept for the life of the process; concurrent first requests share a
//! single provider call.

use std::sync::Arc;

use moka::future::Cache;
use thiserror::Error;
use tidewater_core::CarrierId;

use super::RateProvider;
use crate::shipengine::ShipEngineError;

/// Failure to find any carrier to rate with.
#[derive(Debug, Error)]
pub enum CarrierError {
    #[error(transparent)]
    Provider(#[from] ShipEngineError),

    #[error("No carriers are connected to the shipping account")]
    NoCarriers,
}

/// Resolves the carrier IDs sent with every rate request.
#[derive(Clone)]
pub struct CarrierResolver {
    configured: Vec<CarrierId>,
    cache: Cache<(), Vec<CarrierId>>,
}

impl CarrierResolver {
    #[must_use]
    pub fn new(configured: Vec<CarrierId>) -> Self {
        Self {
            configured,
            cache: Cache::builder().max_capacity(1).build(),
        }
    }

    /// Carrier IDs to quote with.
    ///
    /// Failed lookups are not cached, so the next request retries.
    ///
    /// # Errors
    ///
    /// Returns `CarrierError` if listing carriers fails or yields none.
    pub async fn resolve(
        &self,
        provider: &dyn RateProvider,
    ) -> Result<Vec<CarrierId>, Arc<CarrierError>> {
        if !self.configured.is_empty() {
            return Ok(self.configured.clone());
        }

        self.cache
            .try_get_with((), async {
                let carriers = provider.list_carriers().await?;
                let ids: Vec<CarrierId> = carriers.into_iter().map(|c| c.carrier_id).collect();
                if ids.is_empty() {
                    return Err(CarrierError::NoCarriers);
                }
                tracing::info!(count = ids.len(), "Resolved carriers from shipping account");
                Ok(ids)
            })
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::services::Carrier;
    use crate::services::testing::FakeRates;

    fn carrier(id: &str) -> Carrier {
        Carrier {
            carrier_id: CarrierId::new(id),
            carrier_code: Some("ups".to_string()),
            friendly_name: Some("UPS".to_string()),
        }
    }

    #[tokio::test]
    async fn test_configured_ids_skip_lookup() {
        let provider = FakeRates::default();
        let resolver = CarrierResolver::new(vec![CarrierId::new("se-9")]);

        let ids = resolver.resolve(&provider).await.unwrap();

        assert_eq!(ids, vec![CarrierId::new("se-9")]);
        assert_eq!(provider.carrier_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_lookup_happens_once() {
        let provider = FakeRates {
            carriers: vec![carrier("se-1"), carrier("se-2")],
            ..FakeRates::default()
        };
        let resolver = CarrierResolver::new(vec![]);

        let first = resolver.resolve(&provider).await.unwrap();
        let second = resolver.resolve(&provider).await.unwrap();

        assert_eq!(first, vec![CarrierId::new("se-1"), CarrierId::new("se-2")]);
        assert_eq!(first, second);
        assert_eq!(provider.carrier_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_account_is_an_error_and_not_cached() {
        let provider = FakeRates::default();
        let resolver = CarrierResolver::new(vec![]);

        let err = resolver.resolve(&provider).await.unwrap_err();
        assert!(matches!(*err, CarrierError::NoCarriers));

        let _ = resolver.resolve(&provider).await;
        assert_eq!(provider.carrier_calls.load(Ordering::SeqCst), 2);
    }
}
