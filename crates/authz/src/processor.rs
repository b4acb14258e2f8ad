//! Request processor - verifies, gates and dispatches signed envelopes

use cosign_core::EngineConfig;
use cosign_gate::{PermissionGate, PermissionRegistry, SignedEnvelope, Signer};
use cosign_ledger::{Committer, StateStore};
use cosign_pending::{PendingMachine, SignatureProgress};
use std::sync::Arc;

use crate::error::{AuthzError, AuthzResult};
use crate::initiator::InitiatorStore;
use crate::orchestrator::Orchestrator;
use crate::recipient::RecipientStore;
use crate::registry::FamilyRegistry;
use crate::request::{Request, Response, SignatureStatus};

/// Entry point for signed requests
pub struct Processor {
    gate: PermissionGate,
    registry: FamilyRegistry,
    initiators: Arc<InitiatorStore>,
    recipients: RecipientStore,
    pending: Arc<PendingMachine>,
    orchestrator: Orchestrator,
}

impl Processor {
    /// Wire up every component over one ledger
    pub fn new(
        store: Arc<dyn StateStore>,
        bank_signer: Arc<dyn Signer>,
        permissions: Arc<dyn PermissionRegistry>,
        config: EngineConfig,
    ) -> Self {
        let committer = Committer::from_config(store, &config);
        let initiators = Arc::new(InitiatorStore::new(
            committer.clone(),
            config.account_level_group.clone(),
        ));
        let pending = Arc::new(PendingMachine::new(
            committer.clone(),
            bank_signer,
            initiators.clone(),
            config.clone(),
        ));

        Self {
            gate: PermissionGate::new(config.signature_algorithm, permissions),
            registry: FamilyRegistry::new(),
            recipients: RecipientStore::new(committer),
            orchestrator: Orchestrator::new(initiators.clone(), pending.clone()),
            initiators,
            pending,
        }
    }

    pub fn registry(&self) -> &FamilyRegistry {
        &self.registry
    }

    pub fn initiators(&self) -> &InitiatorStore {
        &self.initiators
    }

    pub fn pending(&self) -> &PendingMachine {
        &self.pending
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Verify the envelope, then run its request
    pub async fn handle(&self, envelope: &SignedEnvelope) -> AuthzResult<Response> {
        self.gate.authorize(envelope).await?;
        let request = Request::decode(envelope.kind, &envelope.payload)?;

        let lease = self.registry.enter(&envelope.family());
        let _exclusive = if envelope.kind.is_administrative() {
            Some(lease.exclusive().await)
        } else {
            None
        };

        let response = self
            .dispatch(&envelope.source_account, &envelope.signer_public_key, request)
            .await;
        if let Err(e) = &response {
            tracing::warn!(
                account = %envelope.source_account,
                kind = %envelope.kind,
                error_kind = %e.kind(),
                error = %e,
                "request failed"
            );
        }
        response
    }

    async fn dispatch(&self, account: &str, signer: &str, request: Request) -> AuthzResult<Response> {
        let initiators = &self.initiators;
        match request {
            Request::SetInitiatorRule(p) => {
                let rule = initiators.set_rule(account, &p.initiator, &p.rule).await?;
                Ok(Response::RuleSet {
                    rule_hash: rule.hash,
                })
            }
            Request::DeleteInitiatorRule(p) => {
                initiators
                    .delete_rule(account, &p.initiator, &p.rule_hash)
                    .await?;
                Ok(Response::Committed)
            }
            Request::ListInitiatorRules(p) => Ok(Response::Rules(
                initiators.list_rules(account, &p.initiator).await?,
            )),
            Request::AddInitiatorToGroup(p) => {
                initiators.add_to_group(account, &p.initiator, &p.group).await?;
                Ok(Response::Committed)
            }
            Request::RemoveInitiatorFromGroup(p) => {
                initiators
                    .remove_from_group(account, &p.initiator, &p.group)
                    .await?;
                Ok(Response::Committed)
            }
            Request::ListInitiatorGroups(p) => Ok(Response::Groups(
                initiators.list_groups(account, &p.initiator).await?,
            )),
            Request::SetInitiatorPubKeys(p) => {
                initiators
                    .set_pub_keys(account, &p.initiator, &p.public_keys)
                    .await?;
                Ok(Response::Committed)
            }
            Request::DeleteInitiatorPubKeys(p) => {
                initiators
                    .delete_pub_keys(account, &p.initiator, &p.public_keys)
                    .await?;
                Ok(Response::Committed)
            }
            Request::ListInitiatorPubKeys(p) => Ok(Response::PublicKeys(
                initiators.list_pub_keys(account, &p.initiator).await?,
            )),
            Request::QueryAuth(query) => {
                if query.source_account != account {
                    return Err(AuthzError::InvalidPayload(format!(
                        "query is for account {} but the envelope targets {}",
                        query.source_account, account
                    )));
                }
                Ok(Response::Decision(
                    self.orchestrator.query_authorization(&query).await?,
                ))
            }
            Request::ClosePendingTx(p) => {
                self.pending
                    .cancel(account, &p.initiator, &p.transaction_id, signer)
                    .await?;
                Ok(Response::Committed)
            }
            Request::AddSigTx(p) => {
                let progress = self
                    .pending
                    .add_signature(account, &p.initiator, &p.transaction_id, &p.signature, signer)
                    .await?;
                Ok(Response::Signature(match progress {
                    SignatureProgress::Settled => SignatureStatus::Allow,
                    SignatureProgress::StillPending { remaining } => {
                        SignatureStatus::StillPending { remaining }
                    }
                }))
            }
            Request::ListPendingTx(p) => Ok(Response::PendingTransactions(
                self.pending.list(account, &p.initiator).await?,
            )),
            Request::SetRecipient(p) => {
                self.recipients
                    .set_recipient(account, &p.recipient, &p.dest_account)
                    .await?;
                Ok(Response::Committed)
            }
            Request::RemoveRecipient(p) => {
                self.recipients
                    .remove_recipient(account, &p.recipient, &p.dest_account)
                    .await?;
                Ok(Response::Committed)
            }
            Request::ListRecipient(p) => Ok(Response::Recipients(
                self.recipients.list_recipient(account, &p.recipient).await?,
            )),
            Request::SetAccountLevelRule(p) => {
                let rule = initiators.set_account_level_rule(account, &p.rule).await?;
                Ok(Response::RuleSet {
                    rule_hash: rule.hash,
                })
            }
            Request::DeleteAccountLevelRule(p) => {
                initiators
                    .delete_account_level_rule(account, &p.rule_hash)
                    .await?;
                Ok(Response::Committed)
            }
            Request::ListAccountLevelRules => Ok(Response::Rules(
                initiators.list_account_level_rules(account).await?,
            )),
        }
    }
}
