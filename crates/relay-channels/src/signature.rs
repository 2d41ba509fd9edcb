//! Webhook Authenticity Checks

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{ChannelError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Verify a Meta `X-Hub-Signature-256` header (`sha256=<hex digest>`) over
/// the raw request body.
pub fn verify_hub_signature(app_secret: &str, body: &[u8], header: &str) -> Result<()> {
    let hex_digest = header
        .strip_prefix("sha256=")
        .ok_or_else(|| ChannelError::Signature("missing sha256= prefix".into()))?;

    let expected = hex::decode(hex_digest)
        .map_err(|e| ChannelError::Signature(format!("bad hex: {}", e)))?;

    let mut mac = HmacSha256::new_from_slice(app_secret.as_bytes())
        .map_err(|e| ChannelError::Config(e.to_string()))?;
    mac.update(body);

    mac.verify_slice(&expected)
        .map_err(|_| ChannelError::Signature("digest mismatch".into()))
}

/// Hex digest in the header format Meta sends
pub fn hub_signature(app_secret: &str, body: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(app_secret.as_bytes())
        .map_err(|e| ChannelError::Config(e.to_string()))?;
    mac.update(body);
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

/// Compare a Telegram `X-Telegram-Bot-Api-Secret-Token` header
pub fn verify_secret_token(expected: &str, received: Option<&str>) -> Result<()> {
    let token = received.ok_or_else(|| ChannelError::Signature("secret token missing".into()))?;

    if constant_time_eq(token.as_bytes(), expected.as_bytes()) {
        Ok(())
    } else {
        Err(ChannelError::Signature("secret token mismatch".into()))
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
