//! HMAC-SHA256 verification of pushed events.
//!
//! The event source signs the raw request body with the shared secret and sends
//! the result in `x-signature-256` as `sha256=<hex>`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the body signature.
pub const SIGNATURE_HEADER: &str = "x-signature-256";

/// Decodes a `sha256=<hex>` header value. `None` if malformed.
pub fn parse_signature_header(header: &str) -> Option<Vec<u8>> {
    hex::decode(header.strip_prefix("sha256=")?).ok()
}

/// Returns true if `header` is a valid signature of `payload` under `secret`.
///
/// The comparison is constant-time.
///
/// # Arguments
///
/// * `payload` - The raw request body, before any parsing
/// * `header` - The `x-signature-256` value, `sha256=<hex>`
/// * `secret` - The shared event secret
///
/// # Examples
///
/// ```
/// use hmac::{Hmac, Mac};
/// use role_sync::server::verify_signature;
/// use sha2::Sha256;
///
/// let mut mac = Hmac::<Sha256>::new_from_slice(b"secret").unwrap();
/// mac.update(b"{\"member_id\":\"42\"}");
/// let header = format!("sha256={}", hex::encode(mac.finalize().into_bytes()));
///
/// assert!(verify_signature(b"{\"member_id\":\"42\"}", &header, b"secret"));
/// assert!(!verify_signature(b"{\"member_id\":\"43\"}", &header, b"secret"));
/// assert!(!verify_signature(b"{\"member_id\":\"42\"}", "sha256=zz", b"secret"));
/// ```
pub fn verify_signature(payload: &[u8], header: &str, secret: &[u8]) -> bool {
    let Some(expected) = parse_signature_header(header) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

/// Signs `payload` the way the event source does.
#[cfg(test)]
pub(crate) fn sign(payload: &[u8], secret: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).unwrap();
    mac.update(payload);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}
