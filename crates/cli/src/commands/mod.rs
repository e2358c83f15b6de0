//! CLI subcommands and the YAML input files they share.

pub mod checkout;
pub mod quote;

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tidewater_core::{CartItem, Destination};

/// Errors reading cart and address files.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid YAML in {path}: {source}")]
    Yaml {
        path: String,
        source: serde_yaml::Error,
    },

    #[error("Cart file {0} has no items")]
    EmptyCart(String),
}

/// Cart file layout.
///
/// ```yaml
/// items:
///   - id: prod-hammock
///     quantity: 1
///     options:
///       color: sand
/// ```
#[derive(Debug, Deserialize)]
struct CartFile {
    #[serde(default)]
    items: Vec<CartItem>,
}

fn read(path: &Path) -> Result<String, InputError> {
    std::fs::read_to_string(path).map_err(|source| InputError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn parse_cart(path: &Path, yaml: &str) -> Result<Vec<CartItem>, InputError> {
    let cart: CartFile = serde_yaml::from_str(yaml).map_err(|source| InputError::Yaml {
        path: path.display().to_string(),
        source,
    })?;
    if cart.items.is_empty() {
        return Err(InputError::EmptyCart(path.display().to_string()));
    }
    Ok(cart.items)
}

fn parse_destination(path: &Path, yaml: &str) -> Result<Destination, InputError> {
    serde_yaml::from_str(yaml).map_err(|source| InputError::Yaml {
        path: path.display().to_string(),
        source,
    })
}

/// Load a cart file.
pub fn load_cart(path: &Path) -> Result<Vec<CartItem>, InputError> {
    parse_cart(path, &read(path)?)
}

/// Load a destination address file. Validation is left to the caller.
pub fn load_destination(path: &Path) -> Result<Destination, InputError> {
    parse_destination(path, &read(path)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cart_with_options() {
        let yaml = "items:\n  - id: prod-hammock\n    quantity: 2\n    options:\n      color: sand\n  - id: prod-stand\n    quantity: 1\n";
        let items = parse_cart(Path::new("cart.yaml"), yaml).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id.as_str(), "prod-hammock");
        assert_eq!(items[0].quantity, 2);
        assert_eq!(items[0].options.get("color").map(String::as_str), Some("sand"));
        assert!(items[1].options.is_empty());
    }

    #[test]
    fn test_parse_cart_rejects_empty() {
        let err = parse_cart(Path::new("cart.yaml"), "items: []\n").unwrap_err();
        assert!(matches!(err, InputError::EmptyCart(_)));
    }

    #[test]
    fn test_parse_destination_camel_case() {
        let yaml = "name: Ada\naddressLine1: 1 Main St\ncity: Portland\nstate: OR\npostalCode: '97201'\ncountry: US\n";
        let dest = parse_destination(Path::new("to.yaml"), yaml).unwrap();
        assert_eq!(dest.postal_code, "97201");
        assert!(dest.validate().is_ok());
    }

    #[test]
    fn test_parse_destination_partial_is_not_an_error() {
        let dest = parse_destination(Path::new("to.yaml"), "city: Portland\n").unwrap();
        assert!(dest.validate().is_err());
    }
}
