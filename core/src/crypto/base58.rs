//! Base58 codec used for signature and public-key display encoding (§6).

/// Encodes raw bytes as a base58 string.
pub fn encode(bytes: &[u8]) -> String {
    bs58::encode(bytes).into_string()
}

/// Decodes a base58 string back into raw bytes.
pub fn decode(s: &str) -> Result<Vec<u8>, bs58::decode::Error> {
    bs58::decode(s).into_vec()
}
