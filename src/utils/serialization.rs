use anyhow::Result;

/// Get the bincode configuration
fn get_config() -> impl bincode::config::Config {
    // Use legacy configuration for better compatibility with serde
    // Limit allocation to prevent memory exhaustion on corrupt data
    bincode::config::legacy().with_limit::<{ 64 * 1024 * 1024 }>() // 64MB limit
}

/// Serialize data using bincode v2.0 with serde
///
/// # Errors
///
/// Returns an error if:
/// - Serialization fails
pub fn serialize<T: serde::Serialize>(data: &T) -> Result<Vec<u8>> {
    bincode::serde::encode_to_vec(data, get_config()).map_err(Into::into)
}

/// Deserialize data using bincode v2.0 with serde
///
/// Trailing bytes after the encoded value are treated as corruption.
///
/// # Errors
///
/// Returns an error if:
/// - Deserialization fails
/// - Data is malformed or has trailing garbage
pub fn deserialize<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let (result, bytes_read) = bincode::serde::decode_from_slice(bytes, get_config())?;
    if bytes_read != bytes.len() {
        anyhow::bail!(
            "{} trailing bytes after encoded data",
            bytes.len() - bytes_read
        );
    }
    Ok(result)
}
