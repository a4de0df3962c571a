//! Webhook signature verification using HMAC-SHA1.
//!
//! Deliveries are signed with a shared secret and the digest is sent in the
//! `X-Hub-Signature` header as `sha1=<hex>`. SHA-1 is the only scheme
//! accepted; any other prefix is a malformed signature.
//!
//! Verification is the first step of every authenticated endpoint and runs
//! before the body is parsed.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use thiserror::Error;

type HmacSha1 = Hmac<Sha1>;

/// The only accepted signature scheme prefix.
const SCHEME_PREFIX: &str = "sha1=";

/// Why a signature was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// The header is not `sha1=<hex>`.
    #[error("webhook signature malformed")]
    Malformed,

    /// The digest does not match the body.
    #[error("webhook signature invalid")]
    Mismatch,
}

/// Parses a signature header (e.g., "sha1=abc123...") into raw digest bytes.
///
/// Returns `None` for malformed headers (missing prefix, other algorithm,
/// invalid hex). Never panics.
///
/// # Examples
///
/// ```
/// use shardhook::webhooks::parse_signature_header;
///
/// assert!(parse_signature_header("sha1=abcd1234").is_some());
/// assert!(parse_signature_header("abcd1234").is_none());
/// assert!(parse_signature_header("sha256=abcd1234").is_none());
/// assert!(parse_signature_header("sha1=xyz").is_none());
/// ```
pub fn parse_signature_header(header: &str) -> Option<Vec<u8>> {
    let hex_sig = header.strip_prefix(SCHEME_PREFIX)?;
    hex::decode(hex_sig).ok()
}

/// Computes the HMAC-SHA1 digest of a payload using the given secret.
pub fn compute_signature(payload: &[u8], secret: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha1::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Formats a digest as a header value: `sha1=<hex>`.
pub fn format_signature_header(signature: &[u8]) -> String {
    format!("{}{}", SCHEME_PREFIX, hex::encode(signature))
}

/// Verifies a webhook signature against the payload and secret.
///
/// The comparison is constant-time (delegated to `Mac::verify_slice`).
///
/// # Examples
///
/// ```
/// use shardhook::webhooks::{compute_signature, format_signature_header, verify_signature};
///
/// let payload = b"Hello, World!";
/// let secret = b"my-secret-key";
/// let header = format_signature_header(&compute_signature(payload, secret));
///
/// assert!(verify_signature(payload, &header, secret).is_ok());
/// assert!(verify_signature(payload, &header, b"wrong-secret").is_err());
/// ```
pub fn verify_signature(
    payload: &[u8],
    signature_header: &str,
    secret: &[u8],
) -> Result<(), SignatureError> {
    let expected = parse_signature_header(signature_header).ok_or(SignatureError::Malformed)?;

    let mut mac = HmacSha1::new_from_slice(secret).map_err(|_| SignatureError::Malformed)?;
    mac.update(payload);

    mac.verify_slice(&expected)
        .map_err(|_| SignatureError::Mismatch)
}
