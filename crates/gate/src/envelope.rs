//! Signed envelope wire format
//!
//! ```json
//! {
//!   "sourceAccount": "AB12XF3",
//!   "type": "set_initiator_rule",
//!   "signerPublicKey": "02…",
//!   "signature": "…",
//!   "payload": "{…}"
//! }
//! ```
//!
//! The signature covers the UTF-8 bytes of `payload` exactly as carried.

use cosign_core::{family_name, RequestKind, PERMISSION_TAG};
use serde::{Deserialize, Serialize};

use crate::error::GateResult;
use crate::signature::Signer;

/// Anything that can travel as the body of an envelope
pub trait EnvelopeBody {
    fn kind(&self) -> RequestKind;

    /// Serialized payload, signed as-is
    fn encode_payload(&self) -> GateResult<String>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedEnvelope {
    pub source_account: String,
    #[serde(rename = "type")]
    pub kind: RequestKind,
    pub signer_public_key: String,
    pub signature: String,
    pub payload: String,
}

impl SignedEnvelope {
    /// Encode `body` and sign it
    pub fn seal(
        source_account: &str,
        body: &impl EnvelopeBody,
        signer: &dyn Signer,
    ) -> GateResult<Self> {
        let payload = body.encode_payload()?;
        Ok(Self::seal_raw(source_account, body.kind(), payload, signer))
    }

    /// Sign an already-encoded payload
    pub fn seal_raw(
        source_account: &str,
        kind: RequestKind,
        payload: String,
        signer: &dyn Signer,
    ) -> Self {
        let signature = signer.sign_hex(payload.as_bytes());
        Self {
            source_account: source_account.to_string(),
            kind,
            signer_public_key: signer.public_key_hex(),
            signature,
            payload,
        }
    }

    /// Family the envelope targets
    pub fn family(&self) -> String {
        family_name(&self.source_account, PERMISSION_TAG)
    }

    pub fn to_bytes(&self) -> GateResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> GateResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GateError;
    use crate::signature::{verify_signature, KeyPair};
    use cosign_core::SignatureAlgorithm;

    struct Ping;

    impl EnvelopeBody for Ping {
        fn kind(&self) -> RequestKind {
            RequestKind::ListRecipient
        }

        fn encode_payload(&self) -> GateResult<String> {
            Ok(r#"{"ping":true}"#.to_string())
        }
    }

    #[test]
    fn test_seal_signs_payload() {
        let key = KeyPair::generate(SignatureAlgorithm::Secp256k1);
        let envelope = SignedEnvelope::seal("AB12XF3", &Ping, &key).unwrap();

        assert_eq!(envelope.kind, RequestKind::ListRecipient);
        assert_eq!(envelope.signer_public_key, key.public_key_hex());
        assert!(verify_signature(
            SignatureAlgorithm::Secp256k1,
            envelope.payload.as_bytes(),
            &envelope.signature,
            &envelope.signer_public_key
        ));
        assert_eq!(envelope.family(), "AB12XF3");
    }

    #[test]
    fn test_wire_field_names() {
        let key = KeyPair::generate(SignatureAlgorithm::Ed25519);
        let envelope = SignedEnvelope::seal("AB12XF3", &Ping, &key).unwrap();
        let json: serde_json::Value =
            serde_json::from_slice(&envelope.to_bytes().unwrap()).unwrap();

        assert_eq!(json["sourceAccount"], "AB12XF3");
        assert_eq!(json["type"], "list_recipient");
        assert!(json["signerPublicKey"].is_string());

        let back = SignedEnvelope::from_bytes(&envelope.to_bytes().unwrap()).unwrap();
        assert_eq!(back, envelope);
    }

    #[test]
    fn test_unknown_type_tag_rejected() {
        let raw = br#"{"sourceAccount":"A","type":"drop_tables","signerPublicKey":"","signature":"","payload":""}"#;
        assert!(matches!(
            SignedEnvelope::from_bytes(raw),
            Err(GateError::Envelope(_))
        ));
    }
}
