//! GROQ queries.
//!
//! Both queries take an `$ids` parameter holding product or variant document
//! IDs. Variants resolve their parent product either through a `product`
//! reference or by being referenced from a product's `variants` array, and
//! the parent's fields fill in whatever the variant leaves unset.

/// Shipping fields for products and variants.
pub const SHIPPING_METADATA: &str = r#"*[_id in $ids]{
  _id,
  title,
  sku,
  shippingWeight,
  boxDimensions,
  shipsAlone,
  shippingClass,
  "parent": coalesce(product->, *[_type == "product" && references(^._id)][0]){
    title,
    sku,
    shippingWeight,
    boxDimensions,
    shipsAlone,
    shippingClass
  }
}"#;

/// Price and option groups for products and variants.
pub const PRODUCT_PRICING: &str = r#"*[_id in $ids]{
  _id,
  title,
  price,
  currency,
  "optionGroups": optionGroups[]{
    "key": coalesce(key, _key),
    label,
    "choices": choices[]{ "key": coalesce(key, _key), label, surcharge }
  },
  "parent": coalesce(product->, *[_type == "product" && references(^._id)][0]){
    title,
    price,
    currency,
    "optionGroups": optionGroups[]{
      "key": coalesce(key, _key),
      label,
      "choices": choices[]{ "key": coalesce(key, _key), label, surcharge }
    }
  }
}"#;
