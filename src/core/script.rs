//! Spending-script evaluation seam
//!
//! The ledger never interprets scripts itself. It hands a [`ScriptContext`] to
//! a [`ScriptInterpreter`] and enforces the op budget on the result. The
//! [`StandardScripts`] evaluator understands only the standard forms a wallet
//! produces; a node embedding a full interpreter plugs that in instead.

use crate::core::{StateVariable, Transaction, Witness};
use data_encoding::HEXUPPER;
use log::debug;

pub struct ScriptContext<'a> {
    pub script: &'a str,
    pub transaction: &'a Transaction,
    pub witness: &'a Witness,
    pub input_index: usize,
    pub state: &'a [StateVariable],
    /// Public keys whose signatures over the transaction id verified
    pub signers: &'a [Vec<u8>],
    pub block_number: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptOutcome {
    pub success: bool,
    pub ops: u64,
}

pub trait ScriptInterpreter: Send + Sync {
    fn run(&self, context: &ScriptContext<'_>) -> ScriptOutcome;
}

/// Pay-to-key script for a public key
pub fn signed_by_script(public_key: &[u8]) -> String {
    format!("RETURN SIGNEDBY(0x{})", HEXUPPER.encode(public_key))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StandardScripts;

impl StandardScripts {
    fn normalise(script: &str) -> String {
        script
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_uppercase()
    }
}

impl ScriptInterpreter for StandardScripts {
    fn run(&self, context: &ScriptContext<'_>) -> ScriptOutcome {
        let script = Self::normalise(context.script);
        match script.as_str() {
            "RETURN TRUE" => ScriptOutcome {
                success: true,
                ops: 1,
            },
            "RETURN FALSE" => ScriptOutcome {
                success: false,
                ops: 1,
            },
            _ => {
                let key = script
                    .strip_prefix("RETURN SIGNEDBY(0X")
                    .and_then(|rest| rest.strip_suffix(')'))
                    .and_then(|hex| HEXUPPER.decode(hex.as_bytes()).ok());
                match key {
                    Some(key) => ScriptOutcome {
                        success: context.signers.iter().any(|signer| *signer == key),
                        ops: 2,
                    },
                    None => {
                        debug!("Unsupported script: {}", context.script);
                        ScriptOutcome {
                            success: false,
                            ops: 1,
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(script: &str, signers: &[Vec<u8>]) -> ScriptOutcome {
        let transaction = Transaction::new();
        let witness = Witness::new();
        let context = ScriptContext {
            script,
            transaction: &transaction,
            witness: &witness,
            input_index: 0,
            state: &[],
            signers,
            block_number: 1,
        };
        StandardScripts.run(&context)
    }

    #[test]
    fn test_constant_scripts() {
        assert!(run("RETURN TRUE", &[]).success);
        assert!(run("  return   true ", &[]).success);
        assert!(!run("RETURN FALSE", &[]).success);
        assert!(!run("LET x = 1", &[]).success);
    }

    #[test]
    fn test_signed_by() {
        let key = vec![0xAB, 0x01];
        let script = signed_by_script(&key);
        assert_eq!(script, "RETURN SIGNEDBY(0xAB01)");
        assert!(run(&script, &[key.clone()]).success);
        assert!(!run(&script, &[vec![0x01]]).success);
        assert_eq!(run(&script, &[key]).ops, 2);
    }
}
