//! Recipients and their destination accounts

use cosign_core::Namespace;
use cosign_ledger::{Committer, MutationBatch};

use crate::error::{AuthzError, AuthzResult};
use crate::initiator::require;

/// Destination accounts registered per recipient
pub struct RecipientStore {
    committer: Committer,
}

impl RecipientStore {
    pub fn new(committer: Committer) -> Self {
        Self { committer }
    }

    pub async fn set_recipient(&self, account: &str, recipient: &str, dest_account: &str) -> AuthzResult<()> {
        require("recipient", recipient)?;
        require("destAccount", dest_account)?;
        let address = Namespace::for_account(account).recipient_account_address(recipient, dest_account)?;

        self.committer
            .commit(MutationBatch::new().set(address, dest_account))
            .await?;
        tracing::info!(account, recipient, dest_account, "recipient set");
        Ok(())
    }

    pub async fn remove_recipient(&self, account: &str, recipient: &str, dest_account: &str) -> AuthzResult<()> {
        let address = Namespace::for_account(account).recipient_account_address(recipient, dest_account)?;

        match self.committer.commit(MutationBatch::new().delete(address)).await {
            Ok(_) => {
                tracing::info!(account, recipient, dest_account, "recipient removed");
                Ok(())
            }
            Err(e) if e.is_missing_key() => Err(AuthzError::NotFound(format!(
                "recipient {} with account {}",
                recipient, dest_account
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// `recipient:destAccount` for every account registered for `recipient`
    pub async fn list_recipient(&self, account: &str, recipient: &str) -> AuthzResult<Vec<String>> {
        let prefix = Namespace::for_account(account).recipient_accounts(recipient);
        let entries = self.committer.store().list(&prefix).await?;
        Ok(entries
            .into_iter()
            .map(|(_, entry)| format!("{}:{}", recipient, entry.text()))
            .collect())
    }
}
