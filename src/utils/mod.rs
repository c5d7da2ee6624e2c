//! Utility functions and helpers
//!
//! Hashing, signatures, timestamps and the byte encoding shared by every
//! ledger entity.

pub mod crypto;
pub mod serialization;

pub use crypto::{
    current_timestamp, ecdsa_p256_sha256_sign_digest, ecdsa_p256_sha256_sign_verify,
    new_key_pair, public_key_from_pkcs8, sha256_digest, sha256_digest_parts,
};

pub use serialization::{deserialize, encoded_len, serialize};
