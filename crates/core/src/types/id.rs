//! Newtype IDs for type-safe entity references.
//!
//! Content-store documents and carrier-API entities are identified by
//! opaque strings. Use the `define_id!` macro to create wrappers that prevent
//! accidentally passing a carrier ID where a document ID is expected.

/// Macro to define a type-safe string ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Conversion methods: `new()`, `as_str()`, `into_inner()`
/// - `From<String>`, `From<&str>` and `Display` implementations
///
/// # Example
///
/// ```rust
/// # use tidewater_core::define_id;
/// define_id!(WarehouseId);
/// define_id!(BinId);
///
/// let warehouse = WarehouseId::new("wh-1");
/// let bin = BinId::new("wh-1");
///
/// // These are different types, so this won't compile:
/// // let _: WarehouseId = bin;
/// assert_eq!(warehouse.as_str(), bin.as_str());
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the underlying string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the ID and return the underlying string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

// Sanity document ID of a product or a product variant.
define_id!(DocumentId);
// Carrier account ID as issued by the rate provider (e.g. `se-123456`).
define_id!(CarrierId);
// Provider-issued ID of a single quoted rate.
define_id!(RateId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_id_serializes_transparently() {
        let id = DocumentId::new("sku-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"sku-1\"");

        let parsed: CarrierId = serde_json::from_str("\"se-42\"").unwrap();
        assert_eq!(parsed.as_str(), "se-42");
    }

    #[test]
    fn test_id_display_and_conversions() {
        let id: RateId = "se-rate-1".into();
        assert_eq!(id.to_string(), "se-rate-1");
        assert_eq!(id.into_inner(), "se-rate-1");
    }
}
