//! # Oracle Attestations
//!
//! An oracle may sign its answer so the escrow can check where it came from
//! before releasing funds. The signature is BIP-340 Schnorr over
//!
//! ```text
//! sha256("BetId:{bet_id} Answer:{true|false}")
//! ```
//!
//! made with the oracle's key and verified against its x-only public key.

use secp256k1::{schnorr, Keypair, Message, Secp256k1, SecretKey, XOnlyPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{error::Result, BetId, WagerError};

/// An oracle answer together with the oracle's signature over it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct OracleAttestation {
    pub bet_id: BetId,
    pub answer: bool,
    /// 64-byte Schnorr signature, hex-encoded
    pub signature: String,
}

/// Message the oracle signs for `answer` on bet `bet_id`.
pub fn attestation_message(bet_id: &BetId, answer: bool) -> String {
    format!("BetId:{} Answer:{}", bet_id, answer)
}

fn attestation_digest(bet_id: &BetId, answer: bool) -> Message {
    let digest: [u8; 32] = Sha256::digest(attestation_message(bet_id, answer).as_bytes()).into();
    Message::from_digest(digest)
}

fn parse_pubkey(pubkey: &str) -> Result<XOnlyPublicKey> {
    let bytes = hex::decode(pubkey)?;
    XOnlyPublicKey::from_slice(&bytes)
        .map_err(|e| WagerError::InvalidSignature(format!("Invalid oracle pubkey: {e}")))
}

/// Derive the hex x-only public key for a hex secret key.
pub fn oracle_pubkey(secret_key: &str) -> Result<String> {
    let secp = Secp256k1::new();
    let secret_key = SecretKey::from_slice(&hex::decode(secret_key)?)?;
    let (pubkey, _parity) = Keypair::from_secret_key(&secp, &secret_key).x_only_public_key();
    Ok(hex::encode(pubkey.serialize()))
}

/// Check that `pubkey` is a valid 32-byte x-only key.
pub fn validate_pubkey(pubkey: &str) -> Result<()> {
    parse_pubkey(pubkey).map(|_| ())
}

impl OracleAttestation {
    /// Sign `answer` for `bet_id` with the oracle's hex secret key.
    pub fn sign(secret_key: &str, bet_id: BetId, answer: bool) -> Result<Self> {
        let key_bytes = hex::decode(secret_key)?;
        if key_bytes.len() != 32 {
            return Err(WagerError::InvalidSignature(
                "Oracle secret key must be 32 bytes".to_string(),
            ));
        }

        let secp = Secp256k1::new();
        let keypair = Keypair::from_secret_key(&secp, &SecretKey::from_slice(&key_bytes)?);
        let message = attestation_digest(&bet_id, answer);
        let signature = secp.sign_schnorr_no_aux_rand(&message, &keypair);

        Ok(Self {
            bet_id,
            answer,
            signature: hex::encode(signature.serialize()),
        })
    }

    /// Whether the signature was made by `oracle_pubkey` over this answer.
    pub fn verify(&self, oracle_pubkey: &str) -> Result<bool> {
        let pubkey = parse_pubkey(oracle_pubkey)?;

        let sig_bytes = hex::decode(&self.signature)?;
        if sig_bytes.len() != 64 {
            return Err(WagerError::InvalidSignature(format!(
                "Invalid signature length: expected 64 bytes, got {}",
                sig_bytes.len()
            )));
        }
        let signature = schnorr::Signature::from_slice(&sig_bytes)
            .map_err(|e| WagerError::InvalidSignature(format!("Invalid signature format: {e}")))?;

        let secp = Secp256k1::verification_only();
        let message = attestation_digest(&self.bet_id, self.answer);
        Ok(secp.verify_schnorr(&signature, &message, &pubkey).is_ok())
    }
}
