use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Check a `x-line-signature` header value against the raw request body.
///
/// LINE signs the body with HMAC-SHA256 keyed by the channel secret and
/// sends the MAC base64-encoded. Comparison goes through `verify_slice`,
/// which is constant-time.
pub fn validate(channel_secret: &str, body: &[u8], signature: &str) -> bool {
    let claimed = match base64::engine::general_purpose::STANDARD.decode(signature) {
        Ok(claimed) => claimed,
        Err(_) => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(channel_secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(body);

    mac.verify_slice(&claimed).is_ok()
}

/// Produce the signature LINE would send for `body`. Counterpart of
/// [`validate`], used when driving the webhook locally.
pub fn sign(channel_secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(channel_secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(body);

    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}
