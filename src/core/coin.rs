//! Coins (unspent transaction outputs)
//!
//! A coin's MMR leaf is the hash of its full encoding plus its value. An
//! unspent coin commits its amount; a spent coin is rewritten with the spent
//! flag set and value zero, so the MMR root value is always the total unspent.

use crate::core::mmr::MmrData;
use crate::core::{Amount, Hash, StateVariable, Token};
use crate::error::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Coin {
    coin_id: Hash,
    address: Hash,
    amount: Amount,
    token_id: Hash,
    store_state: bool,
    mmr_entry: u64,
    spent: bool,
    block_created: u64,
    state: Vec<StateVariable>,
    token: Option<Token>,
}

impl Coin {
    pub fn new(coin_id: Hash, address: Hash, amount: Amount, token_id: Hash) -> Coin {
        Coin {
            coin_id,
            address,
            amount,
            token_id,
            store_state: true,
            mmr_entry: 0,
            spent: false,
            block_created: 0,
            state: Vec::new(),
            token: None,
        }
    }

    /// An output as written in a transaction: its id is assigned when the
    /// block containing it is processed
    pub fn new_output(address: Hash, amount: Amount, token_id: Hash) -> Coin {
        Coin::new(Hash::ZERO, address, amount, token_id)
    }

    pub fn coin_id(&self) -> &Hash {
        &self.coin_id
    }

    pub fn address(&self) -> &Hash {
        &self.address
    }

    pub fn amount(&self) -> &Amount {
        &self.amount
    }

    pub fn token_id(&self) -> &Hash {
        &self.token_id
    }

    pub fn store_state(&self) -> bool {
        self.store_state
    }

    pub fn mmr_entry(&self) -> u64 {
        self.mmr_entry
    }

    pub fn is_spent(&self) -> bool {
        self.spent
    }

    pub fn block_created(&self) -> u64 {
        self.block_created
    }

    pub fn state(&self) -> &[StateVariable] {
        &self.state
    }

    pub fn state_variable(&self, port: u8) -> Option<&StateVariable> {
        self.state.iter().find(|s| s.port() == port)
    }

    pub fn token(&self) -> Option<&Token> {
        self.token.as_ref()
    }

    pub fn is_native(&self) -> bool {
        self.token_id == Hash::ZERO
    }

    pub fn is_token_create(&self) -> bool {
        self.token_id == Hash::TOKEN_CREATE
    }

    pub fn with_store_state(mut self, store_state: bool) -> Coin {
        self.store_state = store_state;
        self
    }

    pub fn with_token(mut self, token: Token) -> Coin {
        self.token = Some(token);
        self
    }

    pub fn set_coin_id(&mut self, coin_id: Hash) {
        self.coin_id = coin_id;
    }

    pub fn set_token_id(&mut self, token_id: Hash) {
        self.token_id = token_id;
    }

    pub fn set_token(&mut self, token: Option<Token>) {
        self.token = token;
    }

    pub fn set_state(&mut self, state: Vec<StateVariable>) {
        self.state = state;
    }

    pub fn set_mmr_entry(&mut self, entry: u64) {
        self.mmr_entry = entry;
    }

    pub fn set_spent(&mut self, spent: bool) {
        self.spent = spent;
    }

    pub fn set_block_created(&mut self, block: u64) {
        self.block_created = block;
    }

    /// Leaf of this coin as it currently stands
    pub fn mmr_data(&self) -> Result<MmrData> {
        if self.spent {
            MmrData::leaf(self, &Amount::zero())
        } else {
            MmrData::leaf(self, &self.amount)
        }
    }

    /// The same coin marked spent
    pub fn to_spent(&self) -> Coin {
        let mut spent = self.clone();
        spent.spent = true;
        spent
    }

    /// Token amount held by this coin, or the native amount for native coins
    pub fn token_amount(&self) -> Amount {
        match &self.token {
            Some(token) => token.to_token_amount(&self.amount),
            None => self.amount.clone(),
        }
    }
}
