//! Initiator administration: rules, groups and public keys
//!
//! Ledger layout under an account's initiator subspace:
//! - rules: one leaf per rule, `{"rule": …, "rulehash": …}`
//! - groups: one leaf per membership, holding the group name
//! - public keys: a single leaf holding a JSON list of hex keys
//!
//! Account-level rules are rules of the reserved group.

use async_trait::async_trait;
use cosign_core::{Address, Namespace, Subspace};
use cosign_ledger::{Committer, LedgerError, MutationBatch, StateEntry, StateStore};
use cosign_pending::{KeyDirectory, PendingError, PendingResult};
use cosign_rules::Rule;
use serde::de::DeserializeOwned;

use crate::error::{AuthzError, AuthzResult};

/// Rules, groups and keys of the initiators of every account
pub struct InitiatorStore {
    committer: Committer,
    account_level_group: String,
}

impl InitiatorStore {
    pub fn new(committer: Committer, account_level_group: impl Into<String>) -> Self {
        Self {
            committer,
            account_level_group: account_level_group.into(),
        }
    }

    pub fn account_level_group(&self) -> &str {
        &self.account_level_group
    }

    fn store(&self) -> &dyn StateStore {
        self.committer.store().as_ref()
    }

    // === Rules ===

    /// Validate and store a rule for an initiator (or a group)
    pub async fn set_rule(&self, account: &str, initiator: &str, expression: &str) -> AuthzResult<Rule> {
        require("initiator", initiator)?;
        let rule = Rule::new(expression)?;
        let address = Namespace::for_account(account).rule_address(initiator, &rule.expression)?;

        self.committer
            .commit(MutationBatch::new().set(address, serde_json::to_vec(&rule).map_err(LedgerError::from)?))
            .await?;
        tracing::info!(account, initiator, rule_hash = %rule.hash, "rule set");
        Ok(rule)
    }

    /// Delete a rule by the hash handed out when it was set
    pub async fn delete_rule(&self, account: &str, initiator: &str, rule_hash: &str) -> AuthzResult<()> {
        require("initiator", initiator)?;
        let address = Namespace::for_account(account).rule_address_from_hash(initiator, rule_hash)?;
        self.delete(address, || format!("rule {} of {}", rule_hash, initiator))
            .await?;
        tracing::info!(account, initiator, rule_hash, "rule deleted");
        Ok(())
    }

    pub async fn list_rules(&self, account: &str, initiator: &str) -> AuthzResult<Vec<Rule>> {
        let prefix = Namespace::for_account(account).initiator_subspace(initiator, Subspace::Rules);
        self.store()
            .list(&prefix)
            .await?
            .iter()
            .map(|(address, entry)| decode(address, entry))
            .collect()
    }

    pub async fn set_account_level_rule(&self, account: &str, expression: &str) -> AuthzResult<Rule> {
        self.set_rule(account, &self.account_level_group, expression).await
    }

    pub async fn delete_account_level_rule(&self, account: &str, rule_hash: &str) -> AuthzResult<()> {
        self.delete_rule(account, &self.account_level_group, rule_hash).await
    }

    pub async fn list_account_level_rules(&self, account: &str) -> AuthzResult<Vec<Rule>> {
        self.list_rules(account, &self.account_level_group).await
    }

    /// Rules that apply to `initiator`, split into (generic, specific).
    ///
    /// Generic rules come from each group the initiator belongs to, in
    /// listing order, followed by the account-level rules.
    pub async fn rules_for(&self, account: &str, initiator: &str) -> AuthzResult<(Vec<Rule>, Vec<Rule>)> {
        let specific = self.list_rules(account, initiator).await?;

        let mut groups = self.list_groups(account, initiator).await?;
        groups.push(self.account_level_group.clone());

        let mut generic = Vec::new();
        for group in groups {
            generic.extend(self.list_rules(account, &group).await?);
        }
        Ok((generic, specific))
    }

    // === Groups ===

    pub async fn add_to_group(&self, account: &str, initiator: &str, group: &str) -> AuthzResult<()> {
        require("initiator", initiator)?;
        require("group", group)?;
        if group == self.account_level_group {
            return Err(AuthzError::ReservedGroup(group.to_string()));
        }

        let address = Namespace::for_account(account).group_address(initiator, group)?;
        self.committer
            .commit(MutationBatch::new().set(address, group))
            .await?;
        tracing::info!(account, initiator, group, "initiator added to group");
        Ok(())
    }

    pub async fn remove_from_group(&self, account: &str, initiator: &str, group: &str) -> AuthzResult<()> {
        require("initiator", initiator)?;
        let address = Namespace::for_account(account).group_address(initiator, group)?;
        self.delete(address, || format!("{} is not in group {}", initiator, group))
            .await?;
        tracing::info!(account, initiator, group, "initiator removed from group");
        Ok(())
    }

    pub async fn list_groups(&self, account: &str, initiator: &str) -> AuthzResult<Vec<String>> {
        let prefix = Namespace::for_account(account).initiator_subspace(initiator, Subspace::Groups);
        Ok(self
            .store()
            .list(&prefix)
            .await?
            .into_iter()
            .map(|(_, entry)| entry.text())
            .collect())
    }

    // === Public keys ===

    /// Replace the initiator's key list
    pub async fn set_pub_keys(&self, account: &str, initiator: &str, keys: &[String]) -> AuthzResult<()> {
        require("initiator", initiator)?;
        let keys = normalize_keys(keys)?;
        if keys.is_empty() {
            return Err(AuthzError::InvalidPayload("at least one public key is required".to_string()));
        }

        let address = Namespace::for_account(account).public_keys_address(initiator)?;
        self.committer
            .commit(MutationBatch::new().set(address, serde_json::to_vec(&keys).map_err(LedgerError::from)?))
            .await?;
        tracing::info!(account, initiator, count = keys.len(), "public keys set");
        Ok(())
    }

    /// Remove keys; removing the last one deletes the record
    pub async fn delete_pub_keys(&self, account: &str, initiator: &str, keys: &[String]) -> AuthzResult<()> {
        require("initiator", initiator)?;
        let doomed = normalize_keys(keys)?;
        let address = Namespace::for_account(account).public_keys_address(initiator)?;

        let Some(entry) = self.store().get_one(&address).await? else {
            return Err(AuthzError::NotFound(format!("public keys of {}", initiator)));
        };
        let current: Vec<String> = decode(&address, &entry)?;
        let kept: Vec<String> = current
            .iter()
            .filter(|k| !doomed.contains(k))
            .cloned()
            .collect();
        if kept.len() == current.len() {
            return Err(AuthzError::NotFound(format!("none of the keys belong to {}", initiator)));
        }

        let batch = if kept.is_empty() {
            MutationBatch::new().delete(address.clone())
        } else {
            MutationBatch::new().set(
                address.clone(),
                serde_json::to_vec(&kept).map_err(LedgerError::from)?,
            )
        };
        self.committer
            .commit(batch.expect_version(address, entry.version))
            .await?;
        tracing::info!(account, initiator, remaining = kept.len(), "public keys deleted");
        Ok(())
    }

    pub async fn list_pub_keys(&self, account: &str, initiator: &str) -> AuthzResult<Vec<String>> {
        let address = Namespace::for_account(account).public_keys_address(initiator)?;
        match self.store().get_one(&address).await? {
            Some(entry) => decode(&address, &entry),
            None => Ok(Vec::new()),
        }
    }

    // === Internals ===

    async fn delete(&self, address: Address, missing: impl FnOnce() -> String) -> AuthzResult<()> {
        match self.committer.commit(MutationBatch::new().delete(address)).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_missing_key() => Err(AuthzError::NotFound(missing())),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl KeyDirectory for InitiatorStore {
    async fn public_keys(&self, source_account: &str, initiator: &str) -> PendingResult<Vec<String>> {
        self.list_pub_keys(source_account, initiator)
            .await
            .map_err(|e| match e {
                AuthzError::Ledger(inner) => PendingError::Ledger(inner),
                AuthzError::Address(inner) => PendingError::Address(inner),
                other => PendingError::KeyLookup(other.to_string()),
            })
    }
}

pub(crate) fn require(field: &str, value: &str) -> AuthzResult<()> {
    if value.trim().is_empty() {
        Err(AuthzError::InvalidPayload(format!("{} must not be empty", field)))
    } else {
        Ok(())
    }
}

/// Lowercase, dedupe and check hex
fn normalize_keys(keys: &[String]) -> AuthzResult<Vec<String>> {
    let mut normalized: Vec<String> = Vec::with_capacity(keys.len());
    for key in keys {
        let key = key.trim().to_lowercase();
        if key.is_empty() || key.len() % 2 != 0 || !key.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AuthzError::InvalidPayload(format!("public key is not hex: '{}'", key)));
        }
        if !normalized.contains(&key) {
            normalized.push(key);
        }
    }
    Ok(normalized)
}

fn decode<T: DeserializeOwned>(address: &Address, entry: &StateEntry) -> AuthzResult<T> {
    serde_json::from_slice(&entry.data).map_err(|e| AuthzError::Corrupt {
        address: address.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosign_core::{rule_hash, ACCOUNT_LEVEL_GROUP};
    use cosign_ledger::MemoryStore;
    use std::sync::Arc;

    const ACCOUNT: &str = "AB12XF3";
    const RULE: &str = r#"Amount < 13000 ? "no-action" : "deny""#;

    fn store() -> (InitiatorStore, Arc<MemoryStore>) {
        let ledger = Arc::new(MemoryStore::new());
        let committer = Committer::from_config(ledger.clone(), &Default::default());
        (InitiatorStore::new(committer, ACCOUNT_LEVEL_GROUP), ledger)
    }

    fn keys(list: &[&str]) -> Vec<String> {
        list.iter().map(|k| k.to_string()).collect()
    }

    #[tokio::test]
    async fn test_set_list_delete_rule() {
        let (initiators, _) = store();
        let rule = initiators.set_rule(ACCOUNT, "ID12345", RULE).await.unwrap();
        assert_eq!(rule.hash, "c760cd777c07c5e4cea8");

        let rules = initiators.list_rules(ACCOUNT, "ID12345").await.unwrap();
        assert_eq!(rules, vec![rule.clone()]);

        initiators
            .delete_rule(ACCOUNT, "ID12345", &rule.hash)
            .await
            .unwrap();
        assert!(initiators.list_rules(ACCOUNT, "ID12345").await.unwrap().is_empty());

        assert!(matches!(
            initiators.delete_rule(ACCOUNT, "ID12345", &rule.hash).await,
            Err(AuthzError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_rule_writes_nothing() {
        let (initiators, ledger) = store();
        assert!(matches!(
            initiators.set_rule(ACCOUNT, "ID12345", "Fee > 1 ? 'deny' : 'no-action'").await,
            Err(AuthzError::Rule(_))
        ));
        assert!(matches!(
            initiators.delete_rule(ACCOUNT, "ID12345", "not-a-hash").await,
            Err(AuthzError::Address(_))
        ));
        assert!(ledger.is_empty().await);
    }

    #[tokio::test]
    async fn test_groups_and_rules_for() {
        let (initiators, _) = store();
        initiators.add_to_group(ACCOUNT, "ID12345", "tellers").await.unwrap();
        initiators
            .set_rule(ACCOUNT, "tellers", r#"Amount > 500 ? "deny" : "no-action""#)
            .await
            .unwrap();
        initiators
            .set_account_level_rule(ACCOUNT, r#"Amount > 9000 ? "deny" : "no-action""#)
            .await
            .unwrap();
        initiators.set_rule(ACCOUNT, "ID12345", RULE).await.unwrap();

        assert_eq!(
            initiators.list_groups(ACCOUNT, "ID12345").await.unwrap(),
            vec!["tellers"]
        );

        let (generic, specific) = initiators.rules_for(ACCOUNT, "ID12345").await.unwrap();
        assert_eq!(generic.len(), 2);
        assert_eq!(generic[0].hash, rule_hash(r#"Amount > 500 ? "deny" : "no-action""#));
        assert_eq!(generic[1].hash, rule_hash(r#"Amount > 9000 ? "deny" : "no-action""#));
        assert_eq!(specific.len(), 1);

        initiators
            .remove_from_group(ACCOUNT, "ID12345", "tellers")
            .await
            .unwrap();
        let (generic, _) = initiators.rules_for(ACCOUNT, "ID12345").await.unwrap();
        assert_eq!(generic.len(), 1);
        assert!(matches!(
            initiators.remove_from_group(ACCOUNT, "ID12345", "tellers").await,
            Err(AuthzError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reserved_group_rejected() {
        let (initiators, _) = store();
        assert!(matches!(
            initiators.add_to_group(ACCOUNT, "ID12345", ACCOUNT_LEVEL_GROUP).await,
            Err(AuthzError::ReservedGroup(_))
        ));
    }

    #[tokio::test]
    async fn test_pub_keys_overwrite_and_normalize() {
        let (initiators, _) = store();
        initiators
            .set_pub_keys(ACCOUNT, "ID12345", &keys(&["02AA", "02aa", "03bb"]))
            .await
            .unwrap();
        assert_eq!(
            initiators.list_pub_keys(ACCOUNT, "ID12345").await.unwrap(),
            vec!["02aa", "03bb"]
        );

        initiators
            .set_pub_keys(ACCOUNT, "ID12345", &keys(&["04cc"]))
            .await
            .unwrap();
        assert_eq!(
            initiators.list_pub_keys(ACCOUNT, "ID12345").await.unwrap(),
            vec!["04cc"]
        );

        assert!(matches!(
            initiators.set_pub_keys(ACCOUNT, "ID12345", &keys(&["xyz"])).await,
            Err(AuthzError::InvalidPayload(_))
        ));
        assert!(matches!(
            initiators.set_pub_keys(ACCOUNT, "ID12345", &[]).await,
            Err(AuthzError::InvalidPayload(_))
        ));
    }

    #[tokio::test]
    async fn test_deleting_last_key_removes_record() {
        let (initiators, ledger) = store();
        initiators
            .set_pub_keys(ACCOUNT, "ID12345", &keys(&["02aa", "03bb"]))
            .await
            .unwrap();

        initiators
            .delete_pub_keys(ACCOUNT, "ID12345", &keys(&["02aa"]))
            .await
            .unwrap();
        assert_eq!(
            initiators.list_pub_keys(ACCOUNT, "ID12345").await.unwrap(),
            vec!["03bb"]
        );

        initiators
            .delete_pub_keys(ACCOUNT, "ID12345", &keys(&["03BB"]))
            .await
            .unwrap();
        let address = Namespace::for_account(ACCOUNT)
            .public_keys_address("ID12345")
            .unwrap();
        assert!(ledger.get_one(&address).await.unwrap().is_none());

        assert!(matches!(
            initiators.delete_pub_keys(ACCOUNT, "ID12345", &keys(&["03bb"])).await,
            Err(AuthzError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_key_directory() {
        let (initiators, _) = store();
        initiators
            .set_pub_keys(ACCOUNT, "ID12345", &keys(&["02aa"]))
            .await
            .unwrap();
        assert!(initiators.is_known_key(ACCOUNT, "ID12345", "02AA").await.unwrap());
        assert!(!initiators.is_known_key(ACCOUNT, "CD34YG4", "02aa").await.unwrap());
    }
}
