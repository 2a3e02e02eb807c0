use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Mint an unguessable handshake secret: 256 bits of OS entropy, pushed
/// through sha256 so every token shares one 64-char hex shape.
pub fn generate_token() -> String {
    let mut seed = [0u8; 32];
    OsRng.fill_bytes(&mut seed);
    to_hex(&Sha256::digest(seed))
}

/// Stable per-relationship lookup key derived from the remote site URL,
/// used for transient request-token storage.
pub fn site_key(site_url: &str) -> String {
    to_hex(&Sha256::digest(site_url.as_bytes()))
}

fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;

    let mut hex = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}
