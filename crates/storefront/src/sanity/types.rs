//! Raw Sanity documents and their conversion into domain types.

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::Deserialize;
use tidewater_core::{
    CurrencyCode, DocumentId, OptionChoice, OptionGroup, Price, ProductPricing,
};

use crate::services::ShippingMetadata;

// =============================================================================
// Shipping
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShippingFields {
    title: Option<String>,
    sku: Option<String>,
    shipping_weight: Option<f64>,
    box_dimensions: Option<String>,
    ships_alone: Option<bool>,
    shipping_class: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ShippingDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(flatten)]
    fields: ShippingFields,
    #[serde(default)]
    parent: Option<ShippingFields>,
}

impl From<ShippingDocument> for ShippingMetadata {
    fn from(document: ShippingDocument) -> Self {
        let own = document.fields;
        let parent = document.parent.unwrap_or_default();

        Self {
            id: DocumentId::new(document.id),
            title: own.title.or(parent.title),
            sku: own.sku.or(parent.sku),
            weight_lb: own
                .shipping_weight
                .or(parent.shipping_weight)
                .filter(|w| w.is_finite() && *w > 0.0),
            box_dimensions: own
                .box_dimensions
                .or(parent.box_dimensions)
                .filter(|d| !d.trim().is_empty()),
            ships_alone: own.ships_alone.or(parent.ships_alone).unwrap_or(false),
            shipping_class: own.shipping_class.or(parent.shipping_class),
        }
    }
}

// =============================================================================
// Pricing
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PricingFields {
    title: Option<String>,
    price: Option<f64>,
    currency: Option<String>,
    option_groups: Option<Vec<RawOptionGroup>>,
}

#[derive(Debug, Deserialize)]
struct RawOptionGroup {
    key: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    choices: Option<Vec<RawOptionChoice>>,
}

#[derive(Debug, Deserialize)]
struct RawOptionChoice {
    key: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    surcharge: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct PricingDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(flatten)]
    fields: PricingFields,
    #[serde(default)]
    parent: Option<PricingFields>,
}

impl PricingDocument {
    /// Merge variant and parent fields. `None` when no usable price exists.
    pub fn into_pricing(self) -> Option<ProductPricing> {
        let own = self.fields;
        let parent = self.parent.unwrap_or_default();

        let amount = own.price.or(parent.price).and_then(to_money)?;
        let currency = match own.currency.or(parent.currency) {
            Some(code) => code.parse::<CurrencyCode>().ok()?,
            None => CurrencyCode::USD,
        };
        let option_groups = own
            .option_groups
            .or(parent.option_groups)
            .unwrap_or_default()
            .into_iter()
            .map(|group| OptionGroup {
                key: group.key,
                label: group.label,
                choices: group
                    .choices
                    .unwrap_or_default()
                    .into_iter()
                    .map(|choice| OptionChoice {
                        key: choice.key,
                        label: choice.label,
                        surcharge: choice.surcharge.and_then(to_money).unwrap_or_default(),
                    })
                    .collect(),
            })
            .collect();

        Some(ProductPricing {
            title: own
                .title
                .or(parent.title)
                .unwrap_or_else(|| self.id.clone()),
            id: DocumentId::new(self.id),
            base_price: Price::new(amount, currency),
            option_groups,
        })
    }
}

/// Content-store numbers are floats; money is two-decimal.
fn to_money(value: f64) -> Option<Decimal> {
    Decimal::from_f64(value).map(|d| d.round_dp(2))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_overrides_parent_shipping_fields() {
        let document: ShippingDocument = serde_json::from_value(serde_json::json!({
            "_id": "variant-blue",
            "title": "Blue",
            "shippingWeight": null,
            "boxDimensions": "10x8x4",
            "parent": {
                "title": "Cedar Planter",
                "sku": "CP-1",
                "shippingWeight": 5,
                "boxDimensions": "20x20x20",
                "shipsAlone": true,
                "shippingClass": null
            }
        }))
        .unwrap();

        let metadata = ShippingMetadata::from(document);
        assert_eq!(metadata.id.as_str(), "variant-blue");
        assert_eq!(metadata.title.as_deref(), Some("Blue"));
        assert_eq!(metadata.sku.as_deref(), Some("CP-1"));
        assert_eq!(metadata.weight_lb, Some(5.0));
        assert_eq!(metadata.box_dimensions.as_deref(), Some("10x8x4"));
        assert!(metadata.ships_alone);
    }

    #[test]
    fn test_product_without_parent() {
        let document: ShippingDocument = serde_json::from_value(serde_json::json!({
            "_id": "sku-1",
            "shippingWeight": 0,
            "boxDimensions": "  ",
            "parent": null
        }))
        .unwrap();

        let metadata = ShippingMetadata::from(document);
        assert_eq!(metadata.weight_lb, None);
        assert_eq!(metadata.box_dimensions, None);
        assert!(!metadata.ships_alone);
    }

    #[test]
    fn test_pricing_document() {
        let document: PricingDocument = serde_json::from_value(serde_json::json!({
            "_id": "variant-large",
            "title": null,
            "price": null,
            "parent": {
                "title": "Cedar Planter",
                "price": 49.0,
                "currency": "usd",
                "optionGroups": [{
                    "key": "finish",
                    "label": "Finish",
                    "choices": [{"key": "oiled", "label": "Oiled", "surcharge": 5.5}]
                }]
            }
        }))
        .unwrap();

        let pricing = document.into_pricing().unwrap();
        assert_eq!(pricing.title, "Cedar Planter");
        assert_eq!(pricing.base_price.amount, Decimal::new(4900, 2));
        assert_eq!(pricing.base_price.currency_code, CurrencyCode::USD);
        assert_eq!(pricing.option_groups[0].choices[0].surcharge, Decimal::new(550, 2));
    }

    #[test]
    fn test_pricing_document_without_price() {
        let document: PricingDocument = serde_json::from_value(serde_json::json!({
            "_id": "draft-product",
            "title": "Draft"
        }))
        .unwrap();
        assert!(document.into_pricing().is_none());
    }
}
