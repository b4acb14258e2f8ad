//! Public-key lookup for initiators

use async_trait::async_trait;

use crate::error::PendingResult;

/// Source of the public keys registered for an initiator
#[async_trait]
pub trait KeyDirectory: Send + Sync {
    async fn public_keys(&self, source_account: &str, initiator: &str) -> PendingResult<Vec<String>>;

    async fn is_known_key(
        &self,
        source_account: &str,
        initiator: &str,
        public_key: &str,
    ) -> PendingResult<bool> {
        let keys = self.public_keys(source_account, initiator).await?;
        Ok(keys.iter().any(|k| k.eq_ignore_ascii_case(public_key)))
    }
}
