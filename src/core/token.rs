//! Token (colored coin) metadata

use crate::core::amount::{DECIMAL_PLACES, MAX_DIGITS};
use crate::core::{Amount, Hash};
use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};

/// Amounts on token coins are stored in native units. One native unit is
/// `10^scale` tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Token {
    coin_id: Hash,
    script: String,
    scale: u32,
    total_amount: Amount,
    name: String,
    created: u64,
}

impl Token {
    pub fn new(
        coin_id: Hash,
        script: String,
        scale: u32,
        total_amount: Amount,
        name: String,
        created: u64,
    ) -> Token {
        Token {
            coin_id,
            script,
            scale,
            total_amount,
            name,
            created,
        }
    }

    /// Metadata for an output that mints a token. The creating block fills in
    /// the coin id, the amount and the creation height.
    pub fn template(script: String, scale: u32, name: String) -> Token {
        Token::new(Hash::ZERO, script, scale, Amount::zero(), name, 0)
    }

    pub fn token_id(&self) -> Result<Hash> {
        Hash::of(self)
    }

    pub fn coin_id(&self) -> &Hash {
        &self.coin_id
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn total_amount(&self) -> &Amount {
        &self.total_amount
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn created(&self) -> u64 {
        self.created
    }

    /// Number of tokens minted
    pub fn total_tokens(&self) -> Amount {
        self.to_token_amount(&self.total_amount)
    }

    pub fn is_scale_valid(&self) -> bool {
        self.scale <= DECIMAL_PLACES
    }

    pub fn to_token_amount(&self, native: &Amount) -> Amount {
        native.mul_pow10(self.scale)
    }

    /// Fails if the token amount has more precision than a native amount can
    /// hold
    pub fn to_native_amount(&self, tokens: &Amount) -> Result<Amount> {
        if !self.is_scale_valid() {
            return Err(LedgerError::InvalidTransaction(format!(
                "Token scale {} exceeds {DECIMAL_PLACES}",
                self.scale
            )));
        }
        tokens.div_pow10_exact(self.scale)
    }

    /// The token amount `native` stands for, if it fits in an [`Amount`].
    /// Scaling only moves digits left, so what can overflow is the top: at
    /// scale 44 anything above 10^-24 native runs past [`MAX_DIGITS`].
    pub fn checked_token_amount(&self, native: &Amount) -> Result<Amount> {
        if !self.is_scale_valid() {
            return Err(LedgerError::InvalidTransaction(format!(
                "Token scale {} exceeds {DECIMAL_PLACES}",
                self.scale
            )));
        }
        let tokens = self.to_token_amount(native);
        if !tokens.is_representable() {
            return Err(LedgerError::InvalidTransaction(format!(
                "{native} at scale {} needs {} digits, limit is {MAX_DIGITS}",
                self.scale,
                tokens.digits()
            )));
        }
        Ok(tokens)
    }

    /// The concrete token minted by the output with id `coin_id`
    pub fn minted(&self, coin_id: Hash, total_amount: Amount, created: u64) -> Token {
        Token {
            coin_id,
            script: self.script.clone(),
            scale: self.scale,
            total_amount,
            name: self.name.clone(),
            created,
        }
    }
}
