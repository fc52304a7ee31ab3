//! Remote catalog API boundary
//!
//! The sync pipeline talks to the remote catalog only through the
//! [`CatalogApi`] trait; [`client::HttpCatalogClient`] is the production
//! implementation over HTTP.

pub mod client;

pub use client::HttpCatalogClient;

use async_trait::async_trait;

use crate::error::SyncError;
use crate::models::{ProductDetail, ProductPage};

/// Remote catalog API
///
/// Errors are surfaced pre-classified as [`SyncError`], so the resilience
/// layer can decide retryability without knowing the transport.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Fetch one page of the product listing
    async fn list_page(&self, page: u32, lang: &str) -> Result<ProductPage, SyncError>;

    /// Fetch full detail for one product
    async fn get_product(&self, id: &str, lang: &str) -> Result<ProductDetail, SyncError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProductSummary;

    // Test 1: MockCatalogApi serves a listing page
    #[tokio::test]
    async fn test_mock_list_page() {
        let mut mock = MockCatalogApi::new();

        mock.expect_list_page()
            .withf(|page, lang| *page == 1 && lang == "en")
            .returning(|page, _| {
                Ok(ProductPage {
                    items: vec![ProductSummary {
                        id: "p-1".to_string(),
                        name: "Hammer".to_string(),
                    }],
                    page,
                    total_count: 1,
                    total_pages: 1,
                })
            });

        let page = mock.list_page(1, "en").await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.total_pages, 1);
    }

    // Test 2: MockCatalogApi surfaces classified errors
    #[tokio::test]
    async fn test_mock_error_classification() {
        let mut mock = MockCatalogApi::new();

        mock.expect_get_product()
            .returning(|_, _| Err(SyncError::ServerError(503)));

        let result = mock.get_product("p-1", "en").await;
        assert_eq!(result.unwrap_err(), SyncError::ServerError(503));
    }
}
