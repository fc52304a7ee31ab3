//! Product-related domain models
//!
//! Wire types mirror the remote catalog API responses; record types are the
//! storage-facing shapes produced by the sync pipeline's transform step.

use serde::{Deserialize, Serialize};

/// One entry of a paginated catalog listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSummary {
    /// Stable external identifier
    pub id: String,

    /// Display name
    pub name: String,
}

/// One page of the remote catalog listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPage {
    /// Items on this page
    pub items: Vec<ProductSummary>,

    /// Page number (1-based)
    pub page: u32,

    /// Total number of items in the catalog
    pub total_count: u64,

    /// Total number of pages
    pub total_pages: u32,
}

/// Full product detail as returned by the remote catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDetail {
    /// Stable external identifier
    pub id: String,

    /// Display name
    pub name: String,

    /// Category name (free-form, normalized on upsert)
    pub category: String,

    /// Descriptive text, source material for search chunks
    #[serde(default)]
    pub description: String,

    /// Stock keeping unit
    #[serde(default)]
    pub sku: String,

    /// Price in minor currency units
    pub price_cents: i64,

    /// ISO currency code
    pub currency: String,

    /// Units in stock
    pub stock_quantity: i64,
}

impl ProductDetail {
    /// Build the storage record for this product
    pub fn to_record(&self, category_id: i64) -> ProductRecord {
        ProductRecord {
            external_id: self.id.clone(),
            name: self.name.clone(),
            category_id,
            description: self.description.clone(),
            sku: self.sku.clone(),
        }
    }

    /// Build the price/stock sub-record for this product
    pub fn to_offer(&self) -> OfferRecord {
        OfferRecord {
            product_external_id: self.id.clone(),
            price_cents: self.price_cents,
            currency: self.currency.clone(),
            stock_quantity: self.stock_quantity,
        }
    }
}

/// Storage-facing catalog record, keyed by external id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Stable external identifier (upsert key)
    pub external_id: String,

    /// Display name
    pub name: String,

    /// Resolved category row id
    pub category_id: i64,

    /// Descriptive text
    pub description: String,

    /// Stock keeping unit
    pub sku: String,
}

/// Price and stock sub-record, one per product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferRecord {
    /// Owning product's external id (upsert key)
    pub product_external_id: String,

    /// Price in minor currency units
    pub price_cents: i64,

    /// ISO currency code
    pub currency: String,

    /// Units in stock
    pub stock_quantity: i64,
}

/// One search chunk derived from a product description
#[derive(Debug, Clone, PartialEq)]
pub struct SearchChunk {
    /// Owning product's external id
    pub product_external_id: String,

    /// Position of this chunk within the description (0-based)
    pub seq: u32,

    /// Chunk text, at most 500 characters
    pub content: String,

    /// Fixed-length hashed-token embedding vector
    pub embedding: Vec<f32>,
}

/// Normalize a category name into its deterministic storage key
///
/// Lowercased, trimmed, runs of non-alphanumerics collapsed into single
/// hyphens. The same display name always produces the same slug, which is
/// what makes the category upsert idempotent.
pub fn category_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_was_sep = true;

    for c in name.trim().chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
            last_was_sep = false;
        } else if !last_was_sep {
            slug.push('-');
            last_was_sep = true;
        }
    }

    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test 1: Category slug normalization
    #[test]
    fn test_category_slug() {
        assert_eq!(category_slug("Garden Tools"), "garden-tools");
        assert_eq!(category_slug("  Home & Kitchen  "), "home-kitchen");
        assert_eq!(category_slug("Électronique"), "électronique");
        assert_eq!(category_slug("A//B--C"), "a-b-c");
        assert_eq!(category_slug(""), "");
    }

    // Test 2: Same name always produces the same slug
    #[test]
    fn test_category_slug_deterministic() {
        assert_eq!(category_slug("Power Tools"), category_slug("power tools"));
        assert_eq!(category_slug("Power  Tools"), category_slug("Power Tools"));
    }

    // Test 3: ProductDetail to storage record
    #[test]
    fn test_detail_to_record() {
        let detail = ProductDetail {
            id: "p-100".to_string(),
            name: "Cordless Drill".to_string(),
            category: "Power Tools".to_string(),
            description: "18V cordless drill.".to_string(),
            sku: "CD-18".to_string(),
            price_cents: 12_999,
            currency: "EUR".to_string(),
            stock_quantity: 42,
        };

        let record = detail.to_record(7);
        assert_eq!(record.external_id, "p-100");
        assert_eq!(record.category_id, 7);
        assert_eq!(record.sku, "CD-18");

        let offer = detail.to_offer();
        assert_eq!(offer.product_external_id, "p-100");
        assert_eq!(offer.price_cents, 12_999);
        assert_eq!(offer.stock_quantity, 42);
    }

    // Test 4: ProductPage deserializes from API JSON
    #[test]
    fn test_product_page_from_json() {
        let json = r#"{
            "items": [{"id": "p-1", "name": "Hammer"}],
            "page": 2,
            "total_count": 57,
            "total_pages": 3
        }"#;
        let page: ProductPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.page, 2);
        assert_eq!(page.total_pages, 3);
    }

    // Test 5: Optional detail fields default to empty
    #[test]
    fn test_detail_optional_fields() {
        let json = r#"{
            "id": "p-2",
            "name": "Nail",
            "category": "Fasteners",
            "price_cents": 10,
            "currency": "EUR",
            "stock_quantity": 10000
        }"#;
        let detail: ProductDetail = serde_json::from_str(json).unwrap();
        assert_eq!(detail.description, "");
        assert_eq!(detail.sku, "");
    }
}
