//! Turning cart lines into parcels.
//!
//! One package per unit of quantity. Fields resolve variant first, then the
//! parent product (already merged into [`ShippingMetadata`]), then the
//! configured defaults.

use std::collections::HashMap;

use tidewater_core::{CartItem, Dimensions, DocumentId, PackageSpec, Weight};

use super::ShippingMetadata;

/// Fallbacks for items without their own weight or box.
#[derive(Debug, Clone, Copy)]
pub struct PackageDefaults {
    pub weight_lb: f64,
    pub dimensions: Dimensions,
}

/// Packages for the found items plus the IDs that had no metadata.
#[derive(Debug, Clone, Default)]
pub struct PackagePlan {
    pub packages: Vec<PackageSpec>,
    pub missing: Vec<DocumentId>,
}

/// Build one package per unit for every cart line with metadata.
#[must_use]
pub fn build_packages(
    items: &[CartItem],
    metadata: &[ShippingMetadata],
    defaults: PackageDefaults,
) -> PackagePlan {
    let by_id: HashMap<&DocumentId, &ShippingMetadata> =
        metadata.iter().map(|m| (&m.id, m)).collect();

    let mut plan = PackagePlan::default();
    for item in items.iter().filter(|i| i.quantity > 0) {
        let Some(meta) = by_id.get(&item.id) else {
            if !plan.missing.contains(&item.id) {
                plan.missing.push(item.id.clone());
            }
            continue;
        };

        let package = package_for(meta, defaults);
        for _ in 0..item.quantity {
            plan.packages.push(package.clone());
        }
    }
    plan
}

fn package_for(meta: &ShippingMetadata, defaults: PackageDefaults) -> PackageSpec {
    let dimensions = meta
        .box_dimensions
        .as_deref()
        .and_then(|raw| match raw.parse::<Dimensions>() {
            Ok(dims) => Some(dims),
            Err(e) => {
                tracing::warn!(id = %meta.id, error = %e, "Unusable box dimensions, using default");
                None
            }
        })
        .unwrap_or(defaults.dimensions);

    PackageSpec {
        weight: Weight::pounds(meta.weight_lb.unwrap_or(defaults.weight_lb)),
        dimensions,
        sku: meta.sku.clone(),
        title: meta.title.clone(),
        ships_alone: meta.ships_alone,
        shipping_class: meta.shipping_class.clone(),
    }
}
