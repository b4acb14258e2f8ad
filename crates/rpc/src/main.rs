//! Cosign CLI - Main entry point

use cosign_authz::{AuthQuery, Request};
use cosign_gate::{KeyPair, Signer};
use cosign_rpc::{commands, context::load_key, AppContext};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cosign")]
#[command(about = "Cosign - multi-signature authorization for bank accounts", long_about = None)]
struct Cli {
    /// Data directory path
    #[arg(short, long, default_value = "./data")]
    data: PathBuf,

    /// Source account the request targets
    #[arg(short, long, default_value = "")]
    account: String,

    /// Key file used to sign the request (defaults to the bank key)
    #[arg(short, long)]
    key: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new signing key
    Keygen {
        /// Output file path
        #[arg(long, default_value = "initiator.key")]
        output: PathBuf,
    },

    // === Initiator rules ===

    /// Add a rule for an initiator or group
    SetRule {
        initiator: String,
        /// Rule expression, e.g. 'Amount < 13000 ? "no-action" : "deny"'
        rule: String,
    },

    /// Delete an initiator rule by hash
    DeleteRule { initiator: String, rule_hash: String },

    /// List rules of an initiator or group
    Rules { initiator: String },

    /// Add a rule that applies to every initiator of the account
    SetAccountRule { rule: String },

    /// Delete an account-level rule by hash
    DeleteAccountRule { rule_hash: String },

    /// List account-level rules
    AccountRules,

    // === Groups and keys ===

    /// Add an initiator to a group
    Join { initiator: String, group: String },

    /// Remove an initiator from a group
    Leave { initiator: String, group: String },

    /// List groups of an initiator
    Groups { initiator: String },

    /// Replace the public keys of an initiator
    SetKeys {
        initiator: String,
        #[arg(required = true)]
        public_keys: Vec<String>,
    },

    /// Remove public keys from an initiator
    DeleteKeys {
        initiator: String,
        #[arg(required = true)]
        public_keys: Vec<String>,
    },

    /// List public keys of an initiator
    Keys { initiator: String },

    // === Authorization ===

    /// Ask whether a transaction is authorized
    Query {
        initiator: String,
        /// Action name, e.g. withdraw
        action: String,
        amount: Decimal,
        #[arg(long, default_value = "")]
        recipient: String,
        #[arg(long, default_value = "")]
        dest_account: String,
        #[arg(long)]
        balance: Option<Decimal>,
    },

    /// List pending transactions awaiting an initiator's signature
    Pending { initiator: String },

    /// Co-sign a pending transaction
    Sign { initiator: String, transaction_id: String },

    /// Cancel a pending transaction (original initiator only)
    Close { initiator: String, transaction_id: String },

    /// Retire expired pending transactions
    Expire,

    // === Recipients ===

    /// Register a destination account for a recipient
    SetRecipient { recipient: String, dest_account: String },

    /// Remove a recipient's destination account
    RemoveRecipient { recipient: String, dest_account: String },

    /// List destination accounts of a recipient
    Recipients { recipient: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let ctx = AppContext::new(&cli.data)?;
    let algorithm = ctx.config.signature_algorithm;

    if let Commands::Keygen { output } = &cli.command {
        commands::keygen(output, algorithm)?;
        return Ok(());
    }

    if cli.account.is_empty() {
        anyhow::bail!("--account is required for this command");
    }
    let account = cli.account.as_str();

    let key_file: KeyPair;
    let key: &dyn Signer = match &cli.key {
        Some(path) => {
            key_file = load_key(path, algorithm)?;
            &key_file
        }
        None => ctx.bank_signer(),
    };

    let request = match cli.command {
        Commands::Keygen { .. } => return Ok(()),

        Commands::Query {
            initiator,
            action,
            amount,
            recipient,
            dest_account,
            balance,
        } => {
            let mut query =
                AuthQuery::new(account, initiator, action, amount).with_recipient(recipient, dest_account);
            if let Some(balance) = balance {
                query = query.with_balance(balance);
            }
            commands::query(&ctx, query, key).await?;
            return Ok(());
        }

        Commands::Sign {
            initiator,
            transaction_id,
        } => {
            commands::sign_pending(&ctx, account, &initiator, &transaction_id, key).await?;
            return Ok(());
        }

        Commands::Expire => {
            commands::expire(&ctx, account).await?;
            return Ok(());
        }

        Commands::SetRule { initiator, rule } => Request::set_initiator_rule(initiator, rule),
        Commands::DeleteRule {
            initiator,
            rule_hash,
        } => Request::delete_initiator_rule(initiator, rule_hash),
        Commands::Rules { initiator } => Request::list_initiator_rules(initiator),
        Commands::SetAccountRule { rule } => Request::set_account_level_rule(rule),
        Commands::DeleteAccountRule { rule_hash } => Request::delete_account_level_rule(rule_hash),
        Commands::AccountRules => Request::list_account_level_rules(),
        Commands::Join { initiator, group } => Request::add_initiator_to_group(initiator, group),
        Commands::Leave { initiator, group } => {
            Request::remove_initiator_from_group(initiator, group)
        }
        Commands::Groups { initiator } => Request::list_initiator_groups(initiator),
        Commands::SetKeys {
            initiator,
            public_keys,
        } => Request::set_initiator_pub_keys(initiator, public_keys),
        Commands::DeleteKeys {
            initiator,
            public_keys,
        } => Request::delete_initiator_pub_keys(initiator, public_keys),
        Commands::Keys { initiator } => Request::list_initiator_pub_keys(initiator),
        Commands::Pending { initiator } => Request::list_pending_tx(initiator),
        Commands::Close {
            initiator,
            transaction_id,
        } => Request::close_pending_tx(initiator, transaction_id),
        Commands::SetRecipient {
            recipient,
            dest_account,
        } => Request::set_recipient(recipient, dest_account),
        Commands::RemoveRecipient {
            recipient,
            dest_account,
        } => Request::remove_recipient(recipient, dest_account),
        Commands::Recipients { recipient } => Request::list_recipient(recipient),
    };

    commands::run(&ctx, account, request, key).await?;
    Ok(())
}
