//! Permission gate - the check in front of every ledger write

use cosign_core::SignatureAlgorithm;
use std::sync::Arc;

use crate::envelope::SignedEnvelope;
use crate::error::{GateError, GateResult};
use crate::permission::{AllowAll, PermissionRegistry};
use crate::signature;

/// Verifies envelope signatures and signer permissions
#[derive(Clone)]
pub struct PermissionGate {
    algorithm: SignatureAlgorithm,
    registry: Arc<dyn PermissionRegistry>,
}

impl PermissionGate {
    pub fn new(algorithm: SignatureAlgorithm, registry: Arc<dyn PermissionRegistry>) -> Self {
        Self {
            algorithm,
            registry,
        }
    }

    /// Gate that permits every correctly signed request
    pub fn allow_all(algorithm: SignatureAlgorithm) -> Self {
        Self::new(algorithm, Arc::new(AllowAll))
    }

    pub fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    /// Detached signature check with the configured algorithm
    pub fn verify_signature(&self, payload: &[u8], signature_hex: &str, public_key_hex: &str) -> bool {
        signature::verify_signature(self.algorithm, payload, signature_hex, public_key_hex)
    }

    pub async fn verify_permission(&self, family: &str, public_key_hex: &str) -> bool {
        self.registry.is_permitted(family, public_key_hex).await
    }

    /// Check an envelope before it reaches any handler.
    ///
    /// Every envelope must be correctly signed; mutations additionally need
    /// a signer permitted for the target family.
    pub async fn authorize(&self, envelope: &SignedEnvelope) -> GateResult<()> {
        if !self.verify_signature(
            envelope.payload.as_bytes(),
            &envelope.signature,
            &envelope.signer_public_key,
        ) {
            tracing::warn!(
                account = %envelope.source_account,
                kind = %envelope.kind,
                "envelope signature rejected"
            );
            return Err(GateError::InvalidSignature {
                signer: envelope.signer_public_key.clone(),
            });
        }

        if envelope.kind.is_mutation() {
            let family = envelope.family();
            if !self
                .verify_permission(&family, &envelope.signer_public_key)
                .await
            {
                tracing::warn!(
                    family = %family,
                    kind = %envelope.kind,
                    signer = %envelope.signer_public_key,
                    "signer not permitted"
                );
                return Err(GateError::NotPermitted {
                    family,
                    signer: envelope.signer_public_key.clone(),
                });
            }
        }

        tracing::debug!(account = %envelope.source_account, kind = %envelope.kind, "envelope authorized");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::StaticPolicy;
    use crate::signature::{KeyPair, Signer};
    use cosign_core::RequestKind;

    fn envelope(key: &KeyPair, kind: RequestKind) -> SignedEnvelope {
        SignedEnvelope::seal_raw("AB12XF3", kind, r#"{"initiator":"ID12345"}"#.to_string(), key)
    }

    #[tokio::test]
    async fn test_authorize_valid_envelope() {
        let key = KeyPair::generate(SignatureAlgorithm::Secp256k1);
        let gate = PermissionGate::allow_all(SignatureAlgorithm::Secp256k1);
        gate.authorize(&envelope(&key, RequestKind::SetInitiatorRule))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_tampered_payload_rejected() {
        let key = KeyPair::generate(SignatureAlgorithm::Secp256k1);
        let gate = PermissionGate::allow_all(SignatureAlgorithm::Secp256k1);
        let mut env = envelope(&key, RequestKind::SetInitiatorRule);
        env.payload = r#"{"initiator":"EVIL"}"#.to_string();

        assert!(matches!(
            gate.authorize(&env).await,
            Err(GateError::InvalidSignature { .. })
        ));
    }

    #[tokio::test]
    async fn test_mutation_requires_permission() {
        let key = KeyPair::generate(SignatureAlgorithm::Ed25519);
        let policy = Arc::new(StaticPolicy::new());
        let gate = PermissionGate::new(SignatureAlgorithm::Ed25519, policy.clone());

        let err = gate
            .authorize(&envelope(&key, RequestKind::AddInitiatorToGroup))
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::NotPermitted { ref family, .. } if family == "AB12XF3"));

        // reads only need a valid signature
        gate.authorize(&envelope(&key, RequestKind::ListInitiatorGroups))
            .await
            .unwrap();

        policy.grant("AB12XF3", &key.public_key_hex());
        gate.authorize(&envelope(&key, RequestKind::AddInitiatorToGroup))
            .await
            .unwrap();
    }
}
