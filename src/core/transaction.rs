//! Transactions
//!
//! A transaction lists the coins it consumes and the coins it creates. It
//! carries no proofs or signatures: those live in the [`Witness`], so the
//! transaction id (hash of the encoding) can't be changed by re-proving.
//!
//! [`Witness`]: crate::core::Witness

use crate::core::{Amount, Coin, Hash, StateVariable};
use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Transaction {
    inputs: Vec<Coin>,
    outputs: Vec<Coin>,
    state: Vec<StateVariable>,
    link_hash: Hash,
}

/// Id of output `output_index` of a transaction whose base coin id is `base`
pub fn calculate_coin_id(base: &Hash, output_index: u64) -> Hash {
    Hash::digest_parts(&[base.as_bytes(), &output_index.to_be_bytes()])
}

impl Transaction {
    pub fn new() -> Transaction {
        Transaction::default()
    }

    pub fn transaction_id(&self) -> Result<Hash> {
        Hash::of(self)
    }

    pub fn inputs(&self) -> &[Coin] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Coin] {
        &self.outputs
    }

    pub fn state(&self) -> &[StateVariable] {
        &self.state
    }

    pub fn link_hash(&self) -> &Hash {
        &self.link_hash
    }

    pub fn set_link_hash(&mut self, link_hash: Hash) {
        self.link_hash = link_hash;
    }

    pub fn add_input(&mut self, coin: Coin) {
        self.inputs.push(coin);
    }

    pub fn add_output(&mut self, coin: Coin) {
        self.outputs.push(coin);
    }

    /// Set a state variable. A variable on the same port is replaced and the
    /// list stays sorted by port.
    pub fn add_state_variable(&mut self, variable: StateVariable) {
        match self
            .state
            .binary_search_by_key(&variable.port(), |s| s.port())
        {
            Ok(pos) => self.state[pos] = variable,
            Err(pos) => self.state.insert(pos, variable),
        }
    }

    pub fn state_variable(&self, port: u8) -> Option<&StateVariable> {
        self.state.iter().find(|s| s.port() == port)
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty() && self.outputs.is_empty()
    }

    /// Native amount destroyed by this transaction. Outputs minting a token
    /// spend native coins, so they count against the native inputs.
    pub fn burn(&self) -> Amount {
        let native_in: Amount = self
            .inputs
            .iter()
            .filter(|c| c.is_native())
            .map(|c| c.amount())
            .sum();
        let native_out: Amount = self
            .outputs
            .iter()
            .filter(|c| c.is_native() || c.is_token_create())
            .map(|c| c.amount())
            .sum();
        native_in - native_out
    }

    /// Id every output derives from: the first input's id, or the transaction
    /// id itself when this is the chain's genesis transaction
    pub fn base_coin_id(&self, genesis: bool) -> Result<Hash> {
        if genesis {
            return self.transaction_id();
        }
        self.inputs
            .first()
            .map(|coin| *coin.coin_id())
            .ok_or_else(|| LedgerError::InvalidTransaction("Transaction has no inputs".to_string()))
    }

    /// Structural and value rules that need nothing but the transaction
    pub fn check_valid(&self) -> Result<()> {
        if self.inputs.is_empty() {
            return Err(LedgerError::InvalidTransaction(
                "Transaction must have at least one input".to_string(),
            ));
        }

        for coin in self.inputs.iter().chain(self.outputs.iter()) {
            if !coin.amount().is_valid_native() {
                return Err(LedgerError::InvalidTransaction(format!(
                    "Invalid amount {}",
                    coin.amount()
                )));
            }
        }

        let mut seen = HashSet::new();
        for coin in &self.inputs {
            if !seen.insert(*coin.coin_id()) {
                return Err(LedgerError::InvalidTransaction(format!(
                    "Duplicate input coin {}",
                    coin.coin_id()
                )));
            }
        }

        let mut last_port = None;
        for variable in &self.state {
            if last_port.is_some_and(|p| p >= variable.port()) {
                return Err(LedgerError::InvalidTransaction(
                    "State variables must be unique and sorted by port".to_string(),
                ));
            }
            if !variable.is_well_formed() {
                return Err(LedgerError::InvalidTransaction(format!(
                    "Malformed state variable on port {}",
                    variable.port()
                )));
            }
            last_port = Some(variable.port());
        }

        self.check_tokens()?;
        self.check_conservation()
    }

    fn check_tokens(&self) -> Result<()> {
        let mut input_tokens = HashMap::new();
        for coin in &self.inputs {
            if coin.is_native() {
                continue;
            }
            let token = coin.token().ok_or_else(|| {
                LedgerError::InvalidTransaction(format!(
                    "Token input {} carries no token details",
                    coin.coin_id()
                ))
            })?;
            if token.token_id()? != *coin.token_id() {
                return Err(LedgerError::InvalidTransaction(format!(
                    "Token details of input {} do not match its token id",
                    coin.coin_id()
                )));
            }
            input_tokens.insert(*coin.token_id(), token);
        }

        for coin in &self.outputs {
            if coin.is_native() {
                continue;
            }
            let token = coin.token().ok_or_else(|| {
                LedgerError::InvalidTransaction("Token output carries no token details".to_string())
            })?;
            if !token.is_scale_valid() {
                return Err(LedgerError::InvalidTransaction(format!(
                    "Token scale {} out of range",
                    token.scale()
                )));
            }
            token.checked_token_amount(coin.amount())?;
            if coin.is_token_create() {
                continue;
            }
            match input_tokens.get(coin.token_id()) {
                Some(input_token) if *input_token == token => {}
                _ => {
                    return Err(LedgerError::InvalidTransaction(format!(
                        "Token output {} does not match any input token",
                        coin.token_id()
                    )))
                }
            }
        }
        Ok(())
    }

    fn check_conservation(&self) -> Result<()> {
        let mut totals: HashMap<Hash, Amount> = HashMap::new();
        for coin in &self.inputs {
            *totals.entry(*coin.token_id()).or_default() += coin.amount();
        }

        let mut spent: HashMap<Hash, Amount> = HashMap::new();
        for coin in &self.outputs {
            // minting a token consumes native coins
            let token_id = if coin.is_token_create() {
                Hash::ZERO
            } else {
                *coin.token_id()
            };
            *spent.entry(token_id).or_default() += coin.amount();
        }

        for (token_id, out_total) in &spent {
            let in_total = totals.get(token_id).cloned().unwrap_or_default();
            if *out_total > in_total {
                return Err(LedgerError::InvalidTransaction(format!(
                    "Outputs {out_total} exceed inputs {in_total} for token {token_id}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Token;

    fn native_coin(id: &[u8], amount: i64) -> Coin {
        Coin::new(
            Hash::digest(id),
            Hash::digest(b"owner"),
            Amount::from_int(amount),
            Hash::ZERO,
        )
    }

    fn spend(input: i64, output: i64) -> Transaction {
        let mut tx = Transaction::new();
        tx.add_input(native_coin(b"in", input));
        tx.add_output(Coin::new_output(
            Hash::digest(b"X"),
            Amount::from_int(output),
            Hash::ZERO,
        ));
        tx
    }

    #[test]
    fn test_burn_and_overspend() {
        let tx = spend(10, 7);
        assert!(tx.check_valid().is_ok());
        assert_eq!(tx.burn(), Amount::from_int(3));

        let overspend = spend(10, 11);
        assert!(matches!(
            overspend.check_valid(),
            Err(LedgerError::InvalidTransaction(_))
        ));
    }

    #[test]
    fn test_requires_an_input() {
        let mut tx = Transaction::new();
        tx.add_output(native_coin(b"out", 1));
        assert!(tx.check_valid().is_err());
    }

    #[test]
    fn test_duplicate_inputs_rejected() {
        let mut tx = Transaction::new();
        tx.add_input(native_coin(b"same", 1));
        tx.add_input(native_coin(b"same", 1));
        assert!(tx.check_valid().is_err());
    }

    #[test]
    fn test_amount_bounds() {
        let tx = spend(1_000_000_001, 1);
        assert!(tx.check_valid().is_err());
    }

    #[test]
    fn test_state_variables_replace_and_sort() {
        let mut tx = spend(1, 1);
        tx.add_state_variable(StateVariable::new(5, "1").unwrap());
        tx.add_state_variable(StateVariable::new(2, "TRUE").unwrap());
        tx.add_state_variable(StateVariable::new(5, "2").unwrap());

        let ports: Vec<u8> = tx.state().iter().map(|s| s.port()).collect();
        assert_eq!(ports, vec![2, 5]);
        assert_eq!(tx.state_variable(5).unwrap().data(), "2");
        assert!(tx.check_valid().is_ok());
    }

    #[test]
    fn test_coin_id_derivation() {
        let tx = spend(10, 7);
        let base = tx.base_coin_id(false).unwrap();
        assert_eq!(base, Hash::digest(b"in"));
        assert_eq!(
            calculate_coin_id(&base, 0),
            Hash::digest_parts(&[base.as_bytes(), &0u64.to_be_bytes()])
        );
        assert_eq!(tx.base_coin_id(true).unwrap(), tx.transaction_id().unwrap());
    }

    #[test]
    fn test_id_ignores_nothing_in_body() {
        let a = spend(10, 7);
        let mut b = spend(10, 7);
        assert_eq!(a.transaction_id().unwrap(), b.transaction_id().unwrap());
        b.set_link_hash(Hash::digest(b"linked"));
        assert_ne!(a.transaction_id().unwrap(), b.transaction_id().unwrap());
    }

    #[test]
    fn test_token_create_counts_as_native() {
        let mut tx = Transaction::new();
        tx.add_input(native_coin(b"in", 5));
        let template = Token::template("RETURN TRUE".to_string(), 2, "gold".to_string());
        tx.add_output(
            Coin::new_output(Hash::digest(b"X"), Amount::from_int(5), Hash::TOKEN_CREATE)
                .with_token(template.clone()),
        );
        assert!(tx.check_valid().is_ok());
        assert_eq!(tx.burn(), Amount::zero());

        let mut greedy = Transaction::new();
        greedy.add_input(native_coin(b"in", 5));
        greedy.add_output(
            Coin::new_output(Hash::digest(b"X"), Amount::from_int(6), Hash::TOKEN_CREATE)
                .with_token(template),
        );
        assert!(greedy.check_valid().is_err());
    }

    #[test]
    fn test_token_create_beyond_digit_limit_rejected() {
        let template = Token::template("RETURN TRUE".to_string(), 44, "dust".to_string());
        let mint = |amount: Amount| {
            let mut tx = Transaction::new();
            tx.add_input(native_coin(b"in", 5));
            tx.add_output(
                Coin::new_output(Hash::digest(b"X"), amount, Hash::TOKEN_CREATE)
                    .with_token(template.clone()),
            );
            tx
        };

        let err = mint(Amount::from_int(5)).check_valid().unwrap_err();
        assert!(err.to_string().contains("limit is 64"));

        let dust: Amount = format!("0.{}1", "0".repeat(30)).parse().unwrap();
        assert!(mint(dust).check_valid().is_ok());
    }

    #[test]
    fn test_token_transfer_needs_matching_input() {
        let token = Token::new(
            Hash::digest(b"mint"),
            "RETURN TRUE".to_string(),
            0,
            Amount::from_int(100),
            "gold".to_string(),
            3,
        );
        let token_id = token.token_id().unwrap();

        let mut tx = Transaction::new();
        tx.add_input(
            Coin::new(Hash::digest(b"t-in"), Hash::digest(b"o"), Amount::from_int(4), token_id)
                .with_token(token.clone()),
        );
        tx.add_output(
            Coin::new_output(Hash::digest(b"X"), Amount::from_int(4), token_id)
                .with_token(token.clone()),
        );
        assert!(tx.check_valid().is_ok());

        let mut native_only = Transaction::new();
        native_only.add_input(native_coin(b"in", 4));
        native_only.add_output(
            Coin::new_output(Hash::digest(b"X"), Amount::from_int(4), token_id).with_token(token),
        );
        assert!(native_only.check_valid().is_err());
    }
}
