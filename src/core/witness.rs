//! Witness data: the proofs and signatures that authorise a transaction
//!
//! Kept apart from the transaction so proofs can be refreshed against a newer
//! MMR without changing the transaction id.

use crate::core::mmr::{Mmr, MmrData, MmrProof};
use crate::core::{Amount, Coin, Hash};
use crate::error::{LedgerError, Result};
use crate::utils::ecdsa_p256_sha256_sign_verify;
use serde::{Deserialize, Serialize};

/// A coin and the proof that it sits unspent in the MMR at the proof's time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct CoinProof {
    coin: Coin,
    proof: MmrProof,
}

impl CoinProof {
    pub fn new(coin: Coin, proof: MmrProof) -> CoinProof {
        CoinProof { coin, proof }
    }

    pub fn coin(&self) -> &Coin {
        &self.coin
    }

    pub fn proof(&self) -> &MmrProof {
        &self.proof
    }

    /// Leaf the proof is for
    pub fn mmr_data(&self) -> Result<MmrData> {
        MmrData::leaf(&self.coin, self.coin.amount())
    }
}

/// Leaf of a spending script. Scripts commit value zero.
pub fn script_leaf(script: &str) -> Result<MmrData> {
    MmrData::leaf(&script.to_string(), &Amount::zero())
}

/// Address of a coin that can be spent with exactly one script
pub fn script_address(script: &str) -> Result<Hash> {
    Ok(*script_leaf(script)?.hash())
}

/// A revealed script and its path to the address it was committed to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct ScriptProof {
    script: String,
    proof: MmrProof,
}

impl ScriptProof {
    pub fn new(script: String, proof: MmrProof) -> ScriptProof {
        ScriptProof { script, proof }
    }

    /// The only script of an address
    pub fn new_single(script: &str) -> ScriptProof {
        ScriptProof {
            script: script.to_string(),
            proof: MmrProof::empty(0),
        }
    }

    /// Commit several alternative scripts to one address. Returns the address
    /// and a proof for each script, in input order.
    pub fn tree(scripts: &[&str]) -> Result<(Hash, Vec<ScriptProof>)> {
        let mut mmr = Mmr::new();
        for script in scripts {
            mmr.add_entry(script_leaf(script)?)?;
        }
        mmr.finalize_set();
        let address = *mmr.get_root()?.hash();

        let proofs = scripts
            .iter()
            .enumerate()
            .map(|(entry, script)| {
                Ok(ScriptProof {
                    script: script.to_string(),
                    proof: mmr.get_proof(entry as u64)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok((address, proofs))
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    pub fn proof(&self) -> &MmrProof {
        &self.proof
    }

    pub fn address(&self) -> Result<Hash> {
        Ok(*self.proof.calculate(&script_leaf(&self.script)?)?.hash())
    }
}

/// ECDSA P-256 signature over a transaction id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Signature {
    public_key: Vec<u8>,
    signature: Vec<u8>,
}

impl Signature {
    pub fn new(public_key: Vec<u8>, signature: Vec<u8>) -> Signature {
        Signature {
            public_key,
            signature,
        }
    }

    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    pub fn verify(&self, transaction_id: &Hash) -> bool {
        ecdsa_p256_sha256_sign_verify(&self.public_key, &self.signature, transaction_id.as_bytes())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Witness {
    coin_proofs: Vec<CoinProof>,
    script_proofs: Vec<ScriptProof>,
    signatures: Vec<Signature>,
}

impl Witness {
    pub fn new() -> Witness {
        Witness::default()
    }

    pub fn coin_proofs(&self) -> &[CoinProof] {
        &self.coin_proofs
    }

    pub fn script_proofs(&self) -> &[ScriptProof] {
        &self.script_proofs
    }

    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    pub fn add_coin_proof(&mut self, proof: CoinProof) {
        self.coin_proofs.push(proof);
    }

    /// Scripts are stored once per address
    pub fn add_script_proof(&mut self, proof: ScriptProof) -> Result<()> {
        let address = proof.address()?;
        for existing in &self.script_proofs {
            if existing.address()? == address {
                return Ok(());
            }
        }
        self.script_proofs.push(proof);
        Ok(())
    }

    pub fn add_signature(&mut self, signature: Signature) {
        self.signatures.push(signature);
    }

    pub fn clear_coin_proofs(&mut self) {
        self.coin_proofs.clear();
    }

    pub fn script_for_address(&self, address: &Hash) -> Result<Option<&ScriptProof>> {
        for proof in &self.script_proofs {
            if proof.address()? == *address {
                return Ok(Some(proof));
            }
        }
        Ok(None)
    }

    /// Public keys of all signatures, failing if any of them does not verify
    pub fn verified_signers(&self, transaction_id: &Hash) -> Result<Vec<Vec<u8>>> {
        self.signatures
            .iter()
            .map(|signature| {
                if signature.verify(transaction_id) {
                    Ok(signature.public_key.clone())
                } else {
                    Err(LedgerError::InvalidTransaction(format!(
                        "Invalid signature on transaction {transaction_id}"
                    )))
                }
            })
            .collect()
    }
}
