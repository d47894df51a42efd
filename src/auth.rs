use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};

/// Generate an opaque session token to hand to the browser.
/// The session store keeps only hash(token).
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hash token for the session store key (SHA-256 hex).
pub fn hash_session_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let out = hasher.finalize();
    hex::encode(out)
}

/// Short, non-reversible tag for a token, safe to put in logs.
pub fn token_fingerprint(token: &str) -> String {
    let mut h = hash_session_token(token);
    h.truncate(12);
    h
}
