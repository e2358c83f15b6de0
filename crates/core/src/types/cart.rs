//! Cart lines and price configuration.
//!
//! A product carries a base price and option groups (size, finish, add-ons)
//! whose choices add a surcharge. A cart line selects at most one choice per
//! group; the unit price is the base price plus every selected surcharge.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::id::DocumentId;
use super::price::{CurrencyCode, Price, PriceError};

/// A cart line as submitted by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    /// Product or variant document ID.
    pub id: DocumentId,
    pub quantity: u32,
    /// Selected choice key per option group key.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,
}

impl CartItem {
    /// A line without option selections.
    #[must_use]
    pub fn new(id: impl Into<DocumentId>, quantity: u32) -> Self {
        Self {
            id: id.into(),
            quantity,
            options: BTreeMap::new(),
        }
    }
}

/// Most units one cart may hold. Every unit becomes its own parcel.
pub const MAX_CART_UNITS: u32 = 500;

/// A cart holding more than [`MAX_CART_UNITS`] units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Cart holds {units} units; at most {MAX_CART_UNITS} are allowed")]
pub struct CartTooLarge {
    pub units: u64,
}

/// Total units across all lines.
///
/// # Errors
///
/// Returns `CartTooLarge` when the total exceeds [`MAX_CART_UNITS`].
pub fn cart_units(items: &[CartItem]) -> Result<u32, CartTooLarge> {
    let units: u64 = items.iter().map(|i| u64::from(i.quantity)).sum();
    match u32::try_from(units) {
        Ok(n) if n <= MAX_CART_UNITS => Ok(n),
        _ => Err(CartTooLarge { units }),
    }
}

/// Errors from pricing a cart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    /// The line selects a group the product does not have.
    #[error("{product} has no option \"{group}\"")]
    UnknownOption { product: DocumentId, group: String },
    /// The line selects a choice the group does not offer.
    #[error("option \"{group}\" of {product} has no choice \"{choice}\"")]
    UnknownChoice {
        product: DocumentId,
        group: String,
        choice: String,
    },
    /// The cart has no lines with a positive quantity.
    #[error("cart is empty")]
    EmptyCart,
    #[error(transparent)]
    Price(#[from] PriceError),
}

/// One selectable choice within an option group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionChoice {
    pub key: String,
    #[serde(default)]
    pub label: Option<String>,
    /// Added to the base price when selected; may be negative.
    #[serde(default)]
    pub surcharge: Decimal,
}

/// A named group of mutually exclusive choices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionGroup {
    pub key: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub choices: Vec<OptionChoice>,
}

/// Pricing data for one product or variant, as stored in the content store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPricing {
    pub id: DocumentId,
    pub title: String,
    pub base_price: Price,
    #[serde(default)]
    pub option_groups: Vec<OptionGroup>,
}

impl ProductPricing {
    /// Unit price for the given selections.
    ///
    /// # Errors
    ///
    /// Returns `PricingError` when a selection names an unknown group or
    /// choice.
    pub fn unit_price(&self, selections: &BTreeMap<String, String>) -> Result<Price, PricingError> {
        let mut price = self.base_price;
        for (group_key, choice_key) in selections {
            let choice = self.choice(group_key, choice_key)?;
            price = price.checked_add(Price::new(choice.surcharge, self.base_price.currency_code))?;
        }
        Ok(price)
    }

    /// Human-readable labels of the selected choices, in group order.
    fn selection_labels(&self, selections: &BTreeMap<String, String>) -> Vec<String> {
        self.option_groups
            .iter()
            .filter_map(|group| {
                let choice_key = selections.get(&group.key)?;
                let choice = group.choices.iter().find(|c| &c.key == choice_key)?;
                let group_label = group.label.as_deref().unwrap_or(&group.key);
                let choice_label = choice.label.as_deref().unwrap_or(&choice.key);
                Some(format!("{group_label}: {choice_label}"))
            })
            .collect()
    }

    fn choice(&self, group_key: &str, choice_key: &str) -> Result<&OptionChoice, PricingError> {
        let group = self
            .option_groups
            .iter()
            .find(|g| g.key == group_key)
            .ok_or_else(|| PricingError::UnknownOption {
                product: self.id.clone(),
                group: group_key.to_string(),
            })?;

        group
            .choices
            .iter()
            .find(|c| c.key == choice_key)
            .ok_or_else(|| PricingError::UnknownChoice {
                product: self.id.clone(),
                group: group_key.to_string(),
                choice: choice_key.to_string(),
            })
    }
}

/// A priced cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedLine {
    pub id: DocumentId,
    pub title: String,
    pub options: Vec<String>,
    pub unit_price: Price,
    pub quantity: u32,
    pub line_total: Price,
}

/// A fully priced cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedCart {
    pub lines: Vec<PricedLine>,
    pub subtotal: Price,
}

impl PricedCart {
    #[must_use]
    pub fn currency(&self) -> CurrencyCode {
        self.subtotal.currency_code
    }
}

/// Price every line of a cart.
///
/// Zero-quantity lines are dropped. Every line must be in the same currency.
///
/// # Errors
///
/// Returns `PricingError::EmptyCart` when nothing remains to be priced, and
/// option or currency errors from individual lines.
pub fn price_cart<'a, I>(lines: I) -> Result<PricedCart, PricingError>
where
    I: IntoIterator<Item = (&'a CartItem, &'a ProductPricing)>,
{
    let mut priced = Vec::new();
    let mut subtotal: Option<Price> = None;

    for (item, product) in lines {
        if item.quantity == 0 {
            continue;
        }
        let unit_price = product.unit_price(&item.options)?;
        let line_total = unit_price.checked_mul(item.quantity)?;
        subtotal = Some(match subtotal {
            Some(sum) => sum.checked_add(line_total)?,
            None => line_total,
        });
        priced.push(PricedLine {
            id: item.id.clone(),
            title: product.title.clone(),
            options: product.selection_labels(&item.options),
            unit_price,
            quantity: item.quantity,
            line_total,
        });
    }

    let subtotal = subtotal.ok_or(PricingError::EmptyCart)?;
    Ok(PricedCart {
        lines: priced,
        subtotal,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_units_limit() {
        let items = vec![CartItem::new("a", 200), CartItem::new("b", 300)];
        assert_eq!(cart_units(&items).unwrap(), MAX_CART_UNITS);

        let err = cart_units(&[CartItem::new("a", 301), CartItem::new("b", 200)]).unwrap_err();
        assert_eq!(err.units, 501);

        let huge = vec![CartItem::new("a", u32::MAX), CartItem::new("b", u32::MAX)];
        let err = cart_units(&huge).unwrap_err();
        assert_eq!(err.units, 2 * u64::from(u32::MAX));
        assert_eq!(
            err.to_string(),
            "Cart holds 8589934590 units; at most 500 are allowed"
        );
    }

    fn usd(cents: i64) -> Price {
        Price::new(Decimal::new(cents, 2), CurrencyCode::USD)
    }

    fn planter() -> ProductPricing {
        ProductPricing {
            id: DocumentId::new("planter"),
            title: "Cedar Planter".to_string(),
            base_price: usd(4_900),
            option_groups: vec![
                OptionGroup {
                    key: "size".to_string(),
                    label: Some("Size".to_string()),
                    choices: vec![
                        OptionChoice {
                            key: "small".to_string(),
                            label: Some("Small".to_string()),
                            surcharge: Decimal::ZERO,
                        },
                        OptionChoice {
                            key: "large".to_string(),
                            label: Some("Large".to_string()),
                            surcharge: Decimal::new(2_000, 2),
                        },
                    ],
                },
                OptionGroup {
                    key: "finish".to_string(),
                    label: None,
                    choices: vec![OptionChoice {
                        key: "oiled".to_string(),
                        label: None,
                        surcharge: Decimal::new(550, 2),
                    }],
                },
            ],
        }
    }

    #[test]
    fn test_unit_price_adds_surcharges() {
        let product = planter();
        let selections = BTreeMap::from([
            ("size".to_string(), "large".to_string()),
            ("finish".to_string(), "oiled".to_string()),
        ]);
        assert_eq!(product.unit_price(&selections).unwrap(), usd(7_450));
        assert_eq!(product.unit_price(&BTreeMap::new()).unwrap(), usd(4_900));
    }

    #[test]
    fn test_unknown_selection_is_rejected() {
        let product = planter();
        let bad_group = BTreeMap::from([("color".to_string(), "red".to_string())]);
        assert!(matches!(
            product.unit_price(&bad_group),
            Err(PricingError::UnknownOption { .. })
        ));

        let bad_choice = BTreeMap::from([("size".to_string(), "huge".to_string())]);
        assert!(matches!(
            product.unit_price(&bad_choice),
            Err(PricingError::UnknownChoice { .. })
        ));
    }

    #[test]
    fn test_price_cart_totals_lines() {
        let product = planter();
        let mut large = CartItem::new("planter", 2);
        large.options.insert("size".to_string(), "large".to_string());
        let plain = CartItem::new("planter", 1);
        let skipped = CartItem::new("planter", 0);

        let cart = price_cart([(&large, &product), (&plain, &product), (&skipped, &product)])
            .unwrap();

        assert_eq!(cart.lines.len(), 2);
        assert_eq!(cart.lines[0].line_total, usd(13_800));
        assert_eq!(cart.lines[0].options, vec!["Size: Large".to_string()]);
        assert_eq!(cart.subtotal, usd(18_700));
    }

    #[test]
    fn test_price_cart_empty() {
        let product = planter();
        let skipped = CartItem::new("planter", 0);
        assert_eq!(
            price_cart([(&skipped, &product)]),
            Err(PricingError::EmptyCart)
        );
    }

    #[test]
    fn test_price_cart_rejects_mixed_currencies() {
        let product = planter();
        let mut euro = planter();
        euro.base_price = Price::new(Decimal::new(4_500, 2), CurrencyCode::EUR);
        let item = CartItem::new("planter", 1);

        assert!(matches!(
            price_cart([(&item, &product), (&item, &euro)]),
            Err(PricingError::Price(PriceError::CurrencyMismatch(..)))
        ));
    }
}
