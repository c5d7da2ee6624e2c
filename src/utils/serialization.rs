// Every entity is written with bincode 2 in its standard configuration: fields in
// declaration order, variable-length fields carry a varint length prefix. Types
// that need a custom layout (hashes, amounts, super parents) implement
// Encode/Decode by hand on top of the same primitives.
use crate::error::{LedgerError, Result};

/// Serialize data using bincode 2.0 with standard configuration
pub fn serialize<T: bincode::Encode>(data: &T) -> Result<Vec<u8>> {
    let config = bincode::config::standard();
    bincode::encode_to_vec(data, config)
        .map_err(|e| LedgerError::Serialization(format!("Serialization failed: {e}")))
}

/// Deserialize data using bincode 2.0 with standard configuration.
/// Trailing bytes mean the buffer was not a single encoded value.
pub fn deserialize<T>(bytes: &[u8]) -> Result<T>
where
    T: bincode::Decode<()>,
{
    let config = bincode::config::standard();
    let (data, read) = bincode::decode_from_slice(bytes, config)
        .map_err(|e| LedgerError::Malformed(format!("Deserialization failed: {e}")))?;
    if read != bytes.len() {
        return Err(LedgerError::Malformed(format!(
            "Deserialization left {} trailing bytes",
            bytes.len() - read
        )));
    }
    Ok(data)
}

/// Encoded size of a value, used for block size limits
pub fn encoded_len<T: bincode::Encode>(data: &T) -> Result<usize> {
    Ok(serialize(data)?.len())
}
