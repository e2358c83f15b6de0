//! Tidewater CLI - Shipping quotes and scripted checkout.
//!
//! # Usage
//!
//! ```bash
//! # Quote a cart to an address
//! tw-cli quote --cart cart.yaml --to address.yaml
//!
//! # Walk the whole checkout funnel and print the payment URL
//! tw-cli checkout --cart cart.yaml --to address.yaml --service usps_priority_mail --email ada@example.com
//! ```
//!
//! Cart files are YAML with an `items` list of `{id, quantity, options}`;
//! address files are a YAML `Destination` (`addressLine1`, `city`, `state`,
//! `postalCode`, `country`, ...).
//!
//! # Environment Variables
//!
//! - `TIDEWATER_API_URL` - Storefront base URL (default: <http://127.0.0.1:3000>)

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use url::Url;

mod api;
mod commands;

#[derive(Parser)]
#[command(name = "tw-cli")]
#[command(author, version, about = "Tidewater CLI tools")]
struct Cli {
    /// Storefront base URL
    #[arg(long, env = "TIDEWATER_API_URL", default_value = "http://127.0.0.1:3000")]
    api_url: Url,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Quote shipping for a cart
    Quote {
        /// Cart YAML file
        #[arg(long)]
        cart: PathBuf,

        /// Destination address YAML file
        #[arg(long)]
        to: PathBuf,
    },
    /// Run the checkout funnel and print the payment URL
    Checkout {
        /// Cart YAML file
        #[arg(long)]
        cart: PathBuf,

        /// Destination address YAML file
        #[arg(long)]
        to: PathBuf,

        /// Service code or name to select (default: cheapest rate)
        #[arg(long)]
        service: Option<String>,

        /// Receipt email address
        #[arg(long)]
        email: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let client = api::ApiClient::new(cli.api_url)?;

    match cli.command {
        Commands::Quote { cart, to } => {
            commands::quote::run(&client, &cart, &to).await?;
        }
        Commands::Checkout {
            cart,
            to,
            service,
            email,
        } => {
            commands::checkout::run(&client, &cart, &to, service.as_deref(), email).await?;
        }
    }
    Ok(())
}
