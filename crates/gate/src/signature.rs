//! Detached signatures over byte payloads
//!
//! Keys and signatures travel hex-encoded. Ed25519 public keys are 32 bytes;
//! secp256k1 public keys are SEC1 (compressed or not). Both algorithms
//! produce 64-byte signatures and sign deterministically.

use cosign_core::SignatureAlgorithm;

use crate::error::{GateError, GateResult};

/// Verify `signature_hex` over `payload` with `public_key_hex`.
///
/// Malformed hex, keys or signatures yield `false`.
pub fn verify_signature(
    algorithm: SignatureAlgorithm,
    payload: &[u8],
    signature_hex: &str,
    public_key_hex: &str,
) -> bool {
    let (Ok(signature), Ok(public_key)) = (hex::decode(signature_hex), hex::decode(public_key_hex))
    else {
        return false;
    };

    match algorithm {
        SignatureAlgorithm::Ed25519 => verify_ed25519(payload, &signature, &public_key),
        SignatureAlgorithm::Secp256k1 => verify_secp256k1(payload, &signature, &public_key),
    }
}

fn verify_ed25519(payload: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};

    let Ok(pk_array) = <[u8; 32]>::try_from(public_key) else {
        return false;
    };
    let Ok(sig_array) = <[u8; 64]>::try_from(signature) else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_bytes(&pk_array) else {
        return false;
    };

    verifying_key
        .verify(payload, &Signature::from_bytes(&sig_array))
        .is_ok()
}

fn verify_secp256k1(payload: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
    use k256::ecdsa::{signature::Verifier, Signature, VerifyingKey};

    let Ok(verifying_key) = VerifyingKey::from_sec1_bytes(public_key) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };

    verifying_key.verify(payload, &signature).is_ok()
}

/// Trait for signers
pub trait Signer: Send + Sync {
    fn algorithm(&self) -> SignatureAlgorithm;

    /// Get the public key (hex-encoded)
    fn public_key_hex(&self) -> String;

    /// Sign a payload; returns the hex-encoded signature
    fn sign_hex(&self, payload: &[u8]) -> String;
}

enum SigningMaterial {
    Ed25519(ed25519_dalek::SigningKey),
    Secp256k1(k256::ecdsa::SigningKey),
}

/// A private key for either algorithm
pub struct KeyPair {
    material: SigningMaterial,
}

impl KeyPair {
    /// Generate a new random key
    pub fn generate(algorithm: SignatureAlgorithm) -> Self {
        let mut rng = rand::thread_rng();
        let material = match algorithm {
            SignatureAlgorithm::Ed25519 => {
                SigningMaterial::Ed25519(ed25519_dalek::SigningKey::generate(&mut rng))
            }
            SignatureAlgorithm::Secp256k1 => {
                SigningMaterial::Secp256k1(k256::ecdsa::SigningKey::random(&mut rng))
            }
        };
        Self { material }
    }

    /// Restore from a 32-byte hex-encoded secret
    pub fn from_hex(algorithm: SignatureAlgorithm, seed_hex: &str) -> GateResult<Self> {
        let bytes = hex::decode(seed_hex.trim())
            .map_err(|e| GateError::InvalidKey(format!("Invalid key hex: {}", e)))?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| GateError::InvalidKey("Key must be 32 bytes".to_string()))?;

        let material = match algorithm {
            SignatureAlgorithm::Ed25519 => {
                SigningMaterial::Ed25519(ed25519_dalek::SigningKey::from_bytes(&seed))
            }
            SignatureAlgorithm::Secp256k1 => SigningMaterial::Secp256k1(
                k256::ecdsa::SigningKey::from_slice(&seed)
                    .map_err(|e| GateError::InvalidKey(format!("Invalid secp256k1 key: {}", e)))?,
            ),
        };
        Ok(Self { material })
    }

    /// Export the secret as hex (for storage)
    pub fn seed_hex(&self) -> String {
        match &self.material {
            SigningMaterial::Ed25519(key) => hex::encode(key.to_bytes()),
            SigningMaterial::Secp256k1(key) => hex::encode(key.to_bytes()),
        }
    }
}

impl Signer for KeyPair {
    fn algorithm(&self) -> SignatureAlgorithm {
        match self.material {
            SigningMaterial::Ed25519(_) => SignatureAlgorithm::Ed25519,
            SigningMaterial::Secp256k1(_) => SignatureAlgorithm::Secp256k1,
        }
    }

    fn public_key_hex(&self) -> String {
        match &self.material {
            SigningMaterial::Ed25519(key) => hex::encode(key.verifying_key().to_bytes()),
            SigningMaterial::Secp256k1(key) => {
                hex::encode(key.verifying_key().to_encoded_point(true).as_bytes())
            }
        }
    }

    fn sign_hex(&self, payload: &[u8]) -> String {
        match &self.material {
            SigningMaterial::Ed25519(key) => {
                use ed25519_dalek::Signer as _;
                hex::encode(key.sign(payload).to_bytes())
            }
            SigningMaterial::Secp256k1(key) => {
                use k256::ecdsa::signature::Signer as _;
                let signature: k256::ecdsa::Signature = key.sign(payload);
                hex::encode(signature.to_bytes())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALGORITHMS: [SignatureAlgorithm; 2] =
        [SignatureAlgorithm::Ed25519, SignatureAlgorithm::Secp256k1];

    #[test]
    fn test_sign_and_verify() {
        for algorithm in ALGORITHMS {
            let key = KeyPair::generate(algorithm);
            let signature = key.sign_hex(b"payload");
            assert!(verify_signature(
                algorithm,
                b"payload",
                &signature,
                &key.public_key_hex()
            ));
        }
    }

    #[test]
    fn test_wrong_payload_fails() {
        for algorithm in ALGORITHMS {
            let key = KeyPair::generate(algorithm);
            let signature = key.sign_hex(b"payload");
            assert!(!verify_signature(
                algorithm,
                b"other",
                &signature,
                &key.public_key_hex()
            ));
        }
    }

    #[test]
    fn test_wrong_key_fails() {
        for algorithm in ALGORITHMS {
            let signer = KeyPair::generate(algorithm);
            let other = KeyPair::generate(algorithm);
            let signature = signer.sign_hex(b"payload");
            assert!(!verify_signature(
                algorithm,
                b"payload",
                &signature,
                &other.public_key_hex()
            ));
        }
    }

    #[test]
    fn test_malformed_input_returns_false() {
        for algorithm in ALGORITHMS {
            let key = KeyPair::generate(algorithm);
            let signature = key.sign_hex(b"payload");
            let pk = key.public_key_hex();

            assert!(!verify_signature(algorithm, b"payload", "zz", &pk));
            assert!(!verify_signature(algorithm, b"payload", &signature, "not-hex"));
            assert!(!verify_signature(algorithm, b"payload", &signature[..10], &pk));
            assert!(!verify_signature(algorithm, b"payload", &signature, &pk[..10]));
            assert!(!verify_signature(algorithm, b"payload", "", ""));
        }
    }

    #[test]
    fn test_algorithm_mismatch_fails() {
        let key = KeyPair::generate(SignatureAlgorithm::Ed25519);
        let signature = key.sign_hex(b"payload");
        assert!(!verify_signature(
            SignatureAlgorithm::Secp256k1,
            b"payload",
            &signature,
            &key.public_key_hex()
        ));
    }

    #[test]
    fn test_seed_round_trip_and_determinism() {
        for algorithm in ALGORITHMS {
            let key = KeyPair::generate(algorithm);
            let restored = KeyPair::from_hex(algorithm, &key.seed_hex()).unwrap();
            assert_eq!(restored.public_key_hex(), key.public_key_hex());
            assert_eq!(restored.algorithm(), algorithm);
            assert_eq!(restored.sign_hex(b"query"), key.sign_hex(b"query"));
        }
    }

    #[test]
    fn test_secp256k1_public_key_is_compressed() {
        let key = KeyPair::generate(SignatureAlgorithm::Secp256k1);
        assert_eq!(key.public_key_hex().len(), 66);
        assert_eq!(key.sign_hex(b"x").len(), 128);
    }

    #[test]
    fn test_from_hex_rejects_bad_seed() {
        assert!(matches!(
            KeyPair::from_hex(SignatureAlgorithm::Ed25519, "abcd"),
            Err(GateError::InvalidKey(_))
        ));
        assert!(matches!(
            KeyPair::from_hex(SignatureAlgorithm::Secp256k1, &"00".repeat(32)),
            Err(GateError::InvalidKey(_))
        ));
    }
}
