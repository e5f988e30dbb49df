//! `mondido`: command-line access to the Mondido gateway client.
//!
//! ```text
//! mondido hash --merchant-id 123 --order-id o-1 --amount 10 --currency SEK --secret s3cret
//! mondido scrub < transcript.log
//! mondido purchase --config mondido.toml --order-id o-1 --amount 10.00 --currency SEK \
//!     --card-number 4111111111111111 --month 12 --year 2030 --cvv 200
//! ```
//!
//! Logging is configured through `RUST_LOG` and `LOG_FORMAT`; see
//! [`observability::init_observability`].

mod observability;

use std::{
    io::{self, Read},
    path::PathBuf,
    process::ExitCode,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mondido_gateway::{
    MondidoClient,
    config::{Credentials, GatewayConfig},
    operations::{CreditCard, PaymentInstrument, TransactionOptions},
    security::scrub,
    signing::{HashSigner, SignableTransaction},
};
use rust_decimal::Decimal;
use tracing::info;

use crate::observability::{LogFormat, init_observability};

#[derive(Debug, Parser)]
#[command(name = "mondido", version, about = "Mondido payment gateway client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the transaction integrity hash
    Hash {
        #[arg(long)]
        merchant_id: String,
        #[arg(long)]
        order_id: String,
        #[arg(long, default_value = "")]
        customer_ref: String,
        #[arg(long)]
        amount: Decimal,
        #[arg(long)]
        currency: String,
        /// Sign as a test transaction
        #[arg(long)]
        test: bool,
        /// Hash secret; read from MONDIDO_HASH_SECRET when omitted
        #[arg(long, env = "MONDIDO_HASH_SECRET", hide_env_values = true)]
        secret: String,
    },

    /// Scrub credentials and card data from a transcript on stdin
    Scrub,

    /// Run a card purchase and print the normalized result as JSON
    Purchase {
        /// Gateway configuration file (TOML)
        #[arg(long, short)]
        config: PathBuf,
        #[arg(long)]
        order_id: String,
        #[arg(long)]
        amount: Decimal,
        #[arg(long)]
        currency: String,
        #[arg(long)]
        card_number: String,
        #[arg(long)]
        month: u8,
        #[arg(long)]
        year: u16,
        #[arg(long)]
        cvv: Option<String>,
        #[arg(long)]
        holder: Option<String>,
        #[arg(long)]
        customer_ref: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    init_observability(LogFormat::from_env());

    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Command::Hash { merchant_id, order_id, customer_ref, amount, currency, test, secret } => {
            let signer = HashSigner::new(&Credentials::new(merchant_id.as_str(), "", secret));
            let hash = signer.sign(&SignableTransaction {
                merchant_id,
                payment_ref: order_id,
                customer_ref,
                amount,
                currency,
                test,
            });
            println!("{hash}");
            Ok(ExitCode::SUCCESS)
        }
        Command::Scrub => {
            let mut transcript = String::new();
            io::stdin().read_to_string(&mut transcript).context("failed to read stdin")?;
            print!("{}", scrub(&transcript));
            Ok(ExitCode::SUCCESS)
        }
        Command::Purchase {
            config,
            order_id,
            amount,
            currency,
            card_number,
            month,
            year,
            cvv,
            holder,
            customer_ref,
        } => {
            let config = GatewayConfig::from_file(&config)
                .with_context(|| format!("failed to load {}", config.display()))?;
            let client = MondidoClient::from_config(&config).context("invalid gateway configuration")?;
            info!(test = client.is_test(), encrypted = client.encrypts_fields(), "client ready");

            let mut card = CreditCard::new(card_number, month, year);
            if let Some(cvv) = cvv {
                card = card.with_cvv(cvv);
            }
            if let Some(holder) = holder {
                card = card.with_holder(holder);
            }
            let mut options = TransactionOptions::new(order_id);
            if let Some(customer_ref) = customer_ref {
                options = options.with_customer_ref(customer_ref);
            }

            let result = client
                .purchase(amount, &currency, &PaymentInstrument::Card(card), &options)
                .await?;
            println!("{}", serde_json::to_string_pretty(&result)?);

            Ok(if result.success() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
    }
}
