//! Typed state variables carried by transactions
//!
//! A state variable is a small typed value on a port (0-255). Scripts read them
//! as covenant state; outputs that store state carry a copy of the
//! transaction's variables into the coin.

use crate::core::Amount;
use crate::error::{LedgerError, Result};
use data_encoding::HEXUPPER;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub enum StateKind {
    Hex,
    Number,
    Text,
    Bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct StateVariable {
    port: u8,
    kind: StateKind,
    data: String,
}

impl StateVariable {
    /// Parse a value by its shape: `0x..` is hex, `true`/`false` is a bool,
    /// `[..]` is a string, anything else must be a decimal number.
    pub fn new(port: u8, value: &str) -> Result<StateVariable> {
        let (kind, data) = Self::parse(value)?;
        Ok(StateVariable { port, kind, data })
    }

    fn parse(value: &str) -> Result<(StateKind, String)> {
        let value = value.trim();
        if value.is_empty() {
            return Err(LedgerError::Malformed(
                "State variable data cannot be blank".to_string(),
            ));
        }

        let lower = value.to_lowercase();
        if lower.starts_with("0x") {
            let hex = value[2..].to_uppercase();
            HEXUPPER
                .decode(hex.as_bytes())
                .map_err(|e| LedgerError::Malformed(format!("Invalid hex state {value}: {e}")))?;
            return Ok((StateKind::Hex, format!("0x{hex}")));
        }
        if lower == "true" || lower == "false" {
            return Ok((StateKind::Bool, lower.to_uppercase()));
        }
        if value.starts_with('[') && value.ends_with(']') && value.len() >= 2 {
            return Ok((StateKind::Text, value.to_string()));
        }
        let number = Amount::from_str(value)?;
        Ok((StateKind::Number, number.to_string()))
    }

    pub fn port(&self) -> u8 {
        self.port
    }

    pub fn kind(&self) -> StateKind {
        self.kind
    }

    /// Canonical text form of the value
    pub fn data(&self) -> &str {
        &self.data
    }

    /// True if the stored text is what parsing it again would produce
    pub fn is_well_formed(&self) -> bool {
        matches!(Self::parse(&self.data), Ok((kind, data)) if kind == self.kind && data == self.data)
    }

    pub fn as_amount(&self) -> Option<Amount> {
        match self.kind {
            StateKind::Number => Amount::from_str(&self.data).ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.kind {
            StateKind::Bool => Some(self.data == "TRUE"),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<Vec<u8>> {
        match self.kind {
            StateKind::Hex => HEXUPPER.decode(self.data[2..].as_bytes()).ok(),
            _ => None,
        }
    }

    /// String contents without the surrounding brackets
    pub fn as_text(&self) -> Option<&str> {
        match self.kind {
            StateKind::Text => Some(&self.data[1..self.data.len() - 1]),
            _ => None,
        }
    }
}

impl fmt::Display for StateVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.port, self.data)
    }
}
