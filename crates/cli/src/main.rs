//! Premium Helper CLI - drive the billing coordinator against a sandbox.
//!
//! # Usage
//!
//! ```bash
//! # List every price in the scenario's catalog
//! premium-cli prices demos/basic.yaml
//!
//! # Connect, reconcile owned purchases and show entitlements
//! premium-cli status demos/basic.yaml
//!
//! # Buy a one-time product
//! premium-cli buy demos/basic.yaml --product coins_100
//!
//! # Subscribe to a base plan (optionally with an offer)
//! premium-cli subscribe demos/basic.yaml --base-plan basic --offer trial
//!
//! # Print the subscription management link
//! premium-cli manage-url --package com.example.app --product basic
//! ```
//!
//! Product keys come from the scenario file; when it lists none they are
//! read from `PREMIUM_*` environment variables (see `BillingConfig::from_env`).

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "premium-cli")]
#[command(author, version, about = "Premium Helper sandbox tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every price in the catalog
    Prices {
        /// Sandbox scenario file (YAML)
        scenario: PathBuf,
    },
    /// Connect and show connection state and entitlements
    Status {
        /// Sandbox scenario file (YAML)
        scenario: PathBuf,
    },
    /// Buy a one-time product
    Buy {
        /// Sandbox scenario file (YAML)
        scenario: PathBuf,

        /// One-time product id
        #[arg(short, long)]
        product: String,

        /// Mark the price as personalized for this user
        #[arg(long)]
        personalized: bool,
    },
    /// Subscribe to a base plan
    Subscribe {
        /// Sandbox scenario file (YAML)
        scenario: PathBuf,

        /// Base plan id
        #[arg(short, long)]
        base_plan: String,

        /// Offer id (omit for the base plan's own offer)
        #[arg(short, long, default_value = "")]
        offer: String,
    },
    /// Print the store link for managing a subscription
    ManageUrl {
        /// Application package name
        #[arg(long)]
        package: String,

        /// Subscription product id
        #[arg(long)]
        product: String,
    },
}

#[tokio::main]
async fn main() {
    // Load .env so RUST_LOG and PREMIUM_* are visible
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("premium_billing=info,premium_cli=info")),
        )
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Prices { scenario } => commands::catalog::prices(&scenario).await?,
        Commands::Status { scenario } => commands::catalog::status(&scenario).await?,
        Commands::Buy {
            scenario,
            product,
            personalized,
        } => commands::purchase::buy(&scenario, &product, personalized).await?,
        Commands::Subscribe {
            scenario,
            base_plan,
            offer,
        } => commands::purchase::subscribe(&scenario, &base_plan, &offer).await?,
        Commands::ManageUrl { package, product } => {
            commands::catalog::manage_url(&package, &product)?;
        }
    }
    Ok(())
}
