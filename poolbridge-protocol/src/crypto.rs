// Signing credentials and hashing helpers shared by the ledgers and the
// relayer. Ed25519 keys sign ledger submissions; SHA-256 commits HTLC secrets.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

// Re-export key types for convenience
pub use ed25519_dalek::{SigningKey as SecretKey, VerifyingKey as PublicKey};

/// Generates a new Ed25519 keypair.
pub fn generate_keypair() -> SigningKey {
    let mut csprng = OsRng;
    SigningKey::generate(&mut csprng)
}

/// Signs a message using an Ed25519 secret key.
pub fn sign(message: &[u8], secret_key: &SigningKey) -> Signature {
    secret_key.sign(message)
}

/// Verifies an Ed25519 signature against a message and public key.
pub fn verify(message: &[u8], signature: &Signature, public_key: &VerifyingKey) -> bool {
    public_key.verify(message, signature).is_ok()
}

/// SHA-256 commitment for an HTLC secret preimage.
pub fn hash_secret(preimage: &[u8]) -> [u8; 32] {
    Sha256::digest(preimage).into()
}

/// Derives the on-ledger address for a public key: first 20 bytes of the
/// key hash, hex-encoded. Account addressing stays in this adapter layer.
pub fn derive_address(public_key: &VerifyingKey) -> String {
    let digest = Sha256::digest(public_key.as_bytes());
    format!("0x{}", hex::encode(&digest[..20]))
}
