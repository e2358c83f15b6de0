//! `tw-cli quote`: print shipping rates for a cart.

use std::path::Path;

use tidewater_core::ShippingRate;

use super::{load_cart, load_destination};
use crate::api::{ApiClient, QuoteResponse};

/// Quote the cart in `cart_path` to the address in `to_path`.
///
/// # Errors
///
/// Returns error if either file cannot be loaded or the storefront rejects
/// the quote.
pub async fn run(
    client: &ApiClient,
    cart_path: &Path,
    to_path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let items = load_cart(cart_path)?;
    let destination = load_destination(to_path)?;
    destination.validate()?;

    let quote = client.quote(&items, &destination).await?;

    #[allow(clippy::print_stdout)]
    {
        print!("{}", render(&quote));
    }
    Ok(())
}

fn rate_line(rate: &ShippingRate) -> String {
    let days = rate
        .delivery_days
        .map_or_else(|| "-".to_string(), |d| format!("{d}d"));
    format!(
        "  {:<10} {:<32} {:>5} {}",
        rate.carrier,
        rate.service,
        days,
        rate.price()
    )
}

fn render(quote: &QuoteResponse) -> String {
    let mut out = format!(
        "Total weight: {:.2} lb, longest side: {:.1} in\n",
        quote.total_weight_lb, quote.max_dimension_in
    );
    if !quote.missing.is_empty() {
        out.push_str(&format!(
            "No shipping data for: {}\n",
            quote.missing.join(", ")
        ));
    }
    if quote.freight {
        out.push_str("This order ships by freight; contact us for a quote.\n");
        return out;
    }
    if quote.rates.is_empty() {
        out.push_str("No rates available.\n");
        return out;
    }
    for rate in &quote.rates {
        out.push_str(&rate_line(rate));
        out.push('\n');
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use tidewater_core::CurrencyCode;

    use super::*;

    fn quote(freight: bool, rates: Vec<ShippingRate>) -> QuoteResponse {
        QuoteResponse {
            missing: Vec::new(),
            freight,
            total_weight_lb: 12.5,
            max_dimension_in: 30.0,
            rates,
        }
    }

    fn rate() -> ShippingRate {
        ShippingRate {
            rate_id: None,
            carrier: "USPS".to_string(),
            carrier_id: None,
            service: "Priority Mail".to_string(),
            service_code: Some("usps_priority_mail".to_string()),
            amount: Decimal::new(1245, 2),
            currency: CurrencyCode::USD,
            delivery_days: Some(2),
            estimated_delivery_date: None,
        }
    }

    #[test]
    fn test_render_lists_rates() {
        let out = render(&quote(false, vec![rate()]));
        assert!(out.starts_with("Total weight: 12.50 lb, longest side: 30.0 in\n"));
        assert!(out.contains("Priority Mail"));
        assert!(out.contains("2d"));
        assert!(out.contains("12.45 USD"));
    }

    #[test]
    fn test_render_freight_skips_rates() {
        let out = render(&quote(true, vec![rate()]));
        assert!(out.contains("freight"));
        assert!(!out.contains("Priority Mail"));
    }
}
