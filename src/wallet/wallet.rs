use crate::core::{script_address, signed_by_script, Hash, Signature};
use crate::error::Result;
use crate::utils::{ecdsa_p256_sha256_sign_digest, new_key_pair, public_key_from_pkcs8};
use serde::{Deserialize, Serialize};

/// One ECDSA P-256 key and the pay-to-key script it owns
#[derive(Clone, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Wallet {
    pkcs8: Vec<u8>,
    public_key: Vec<u8>,
}

impl Wallet {
    pub fn new() -> Result<Wallet> {
        let pkcs8 = new_key_pair()?;
        let public_key = public_key_from_pkcs8(&pkcs8)?;
        Ok(Wallet { pkcs8, public_key })
    }

    pub fn get_public_key(&self) -> &[u8] {
        self.public_key.as_slice()
    }

    pub fn get_pkcs8(&self) -> &[u8] {
        self.pkcs8.as_slice()
    }

    /// `RETURN SIGNEDBY(<public key>)`
    pub fn script(&self) -> String {
        signed_by_script(&self.public_key)
    }

    /// Address of the single-leaf script tree holding [`Wallet::script`]
    pub fn address(&self) -> Result<Hash> {
        script_address(&self.script())
    }

    /// Sign a transaction id
    pub fn sign(&self, transaction_id: &Hash) -> Result<Signature> {
        let signature = ecdsa_p256_sha256_sign_digest(&self.pkcs8, transaction_id.as_bytes())?;
        Ok(Signature::new(self.public_key.clone(), signature))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_verifies() {
        let wallet = Wallet::new().unwrap();
        let txid = Hash::digest(b"transaction");
        let signature = wallet.sign(&txid).unwrap();
        assert!(signature.verify(&txid));
        assert!(!signature.verify(&Hash::digest(b"other")));
    }

    #[test]
    fn test_address_is_script_address() {
        let wallet = Wallet::new().unwrap();
        assert_eq!(
            wallet.address().unwrap(),
            script_address(&signed_by_script(wallet.get_public_key())).unwrap()
        );
        assert_ne!(wallet.address().unwrap(), Wallet::new().unwrap().address().unwrap());
    }
}
