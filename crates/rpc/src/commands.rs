//! CLI commands

use cosign_authz::{AuthQuery, Decision, Request, Response, SignatureStatus};
use cosign_core::SignatureAlgorithm;
use cosign_gate::{KeyPair, Signer};
use std::path::Path;

use crate::context::AppContext;

/// Generate a signing key and save its seed
pub fn keygen(output: &Path, algorithm: SignatureAlgorithm) -> Result<String, anyhow::Error> {
    let key = KeyPair::generate(algorithm);
    std::fs::write(output, key.seed_hex())?;

    println!("✅ Generated {:?} key", algorithm);
    println!("   Seed saved to: {}", output.display());
    println!("   Public key: {}", key.public_key_hex());
    Ok(key.public_key_hex())
}

/// Run a request and print what it produced
pub async fn run(
    ctx: &AppContext,
    account: &str,
    request: Request,
    signer: &dyn Signer,
) -> Result<Response, anyhow::Error> {
    let kind = request.kind();
    let response = ctx.submit(account, request, signer).await?;
    print_response(&kind.to_string(), &response)?;
    Ok(response)
}

/// Evaluate a transaction for authorization
pub async fn query(
    ctx: &AppContext,
    query: AuthQuery,
    signer: &dyn Signer,
) -> Result<Decision, anyhow::Error> {
    let account = query.source_account.clone();
    match ctx.submit(&account, Request::query_auth(query), signer).await? {
        Response::Decision(decision) => {
            match &decision {
                Decision::Allow => println!("✅ Allowed"),
                Decision::Deny { violated_rules } => {
                    println!("❌ Denied by {} rule(s):", violated_rules.len());
                    for rule in violated_rules {
                        println!("   {}", rule);
                    }
                }
                Decision::Pending { transaction_id } => {
                    println!("⏳ Pending co-signatures");
                    println!("   Transaction: {}", transaction_id);
                }
            }
            Ok(decision)
        }
        other => anyhow::bail!("unexpected response to query: {:?}", other),
    }
}

/// Sign the stored body of a pending transaction and submit the signature
pub async fn sign_pending(
    ctx: &AppContext,
    account: &str,
    initiator: &str,
    transaction_id: &str,
    signer: &dyn Signer,
) -> Result<SignatureStatus, anyhow::Error> {
    let Some(pending) = ctx.processor.pending().get(account, transaction_id).await? else {
        anyhow::bail!("no pending transaction {}", transaction_id);
    };

    let signature = signer.sign_hex(pending.bank_transaction.as_bytes());
    let request = Request::add_sig_tx(initiator, transaction_id, signature);
    match ctx.submit(account, request, signer).await? {
        Response::Signature(status) => {
            match &status {
                SignatureStatus::Allow => println!("✅ Quorum reached, transaction allowed"),
                SignatureStatus::StillPending { remaining } => {
                    println!("✅ Signature recorded ({} still required)", remaining)
                }
            }
            Ok(status)
        }
        other => anyhow::bail!("unexpected response to signature: {:?}", other),
    }
}

/// Retire expired or settled pending transactions of an account
pub async fn expire(ctx: &AppContext, account: &str) -> Result<Vec<String>, anyhow::Error> {
    let retired = ctx.processor.pending().expire_stale(account).await?;
    println!("✅ Retired {} pending transaction(s)", retired.len());
    for id in &retired {
        println!("   {}", id);
    }
    Ok(retired)
}

fn print_response(kind: &str, response: &Response) -> Result<(), anyhow::Error> {
    match response {
        Response::Committed => println!("✅ {} committed", kind),
        Response::RuleSet { rule_hash } => println!("✅ Rule set (hash: {})", rule_hash),
        Response::Rules(rules) if rules.is_empty() => println!("No rules found"),
        Response::Rules(rules) => {
            for rule in rules {
                println!("{}  {}", rule.hash, rule.expression);
            }
        }
        Response::Groups(items) | Response::PublicKeys(items) | Response::Recipients(items) => {
            if items.is_empty() {
                println!("None");
            }
            for item in items {
                println!("{}", item);
            }
        }
        other => println!("{}", serde_json::to_string_pretty(other)?),
    }
    Ok(())
}
