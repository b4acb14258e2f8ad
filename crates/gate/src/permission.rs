//! Signer permission registry
//!
//! Which public keys may submit mutations for a family is decided by a
//! policy source outside the engine. `PermissionRegistry` is the seam.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

/// Answers whether a signer may mutate state under a family
#[async_trait]
pub trait PermissionRegistry: Send + Sync {
    async fn is_permitted(&self, family: &str, public_key: &str) -> bool;
}

/// Permits every signer; stand-in for deployments without a policy source
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl PermissionRegistry for AllowAll {
    async fn is_permitted(&self, _family: &str, _public_key: &str) -> bool {
        true
    }
}

/// Explicit grants per family
#[derive(Debug, Default)]
pub struct StaticPolicy {
    grants: RwLock<HashMap<String, HashSet<String>>>,
}

impl StaticPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&self, family: &str, public_key: &str) {
        if let Ok(mut grants) = self.grants.write() {
            grants
                .entry(family.to_string())
                .or_default()
                .insert(public_key.to_lowercase());
        }
    }

    pub fn revoke(&self, family: &str, public_key: &str) {
        if let Ok(mut grants) = self.grants.write() {
            if let Some(keys) = grants.get_mut(family) {
                keys.remove(&public_key.to_lowercase());
            }
        }
    }
}

#[async_trait]
impl PermissionRegistry for StaticPolicy {
    async fn is_permitted(&self, family: &str, public_key: &str) -> bool {
        self.grants
            .read()
            .map(|grants| {
                grants
                    .get(family)
                    .is_some_and(|keys| keys.contains(&public_key.to_lowercase()))
            })
            .unwrap_or(false)
    }
}
