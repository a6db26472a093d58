/// Webhook signature verification
///
/// Both providers sign with HMAC-SHA256 and include a timestamp that must be
/// within [`TOLERANCE_SECONDS`] of the current time.
///
/// # Schemes
///
/// - **Dodo Payments** (Standard Webhooks): headers `webhook-id`,
///   `webhook-timestamp` and `webhook-signature: v1,<base64> [v1,<base64> ...]`.
///   The signed content is `{id}.{timestamp}.{body}` and the key is the
///   base64 part of the `whsec_` secret.
/// - **Stripe**: header `Stripe-Signature: t=<ts>,v1=<hex>[,v1=<hex>]`. The
///   signed content is `{ts}.{body}` and the key is the secret as-is.
///
/// Signatures are compared with `Mac::verify_slice`, which is constant-time.

use axum::http::HeaderMap;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Allowed clock skew between the provider and us
pub const TOLERANCE_SECONDS: i64 = 300;

pub const WEBHOOK_ID_HEADER: &str = "webhook-id";
pub const WEBHOOK_TIMESTAMP_HEADER: &str = "webhook-timestamp";
pub const WEBHOOK_SIGNATURE_HEADER: &str = "webhook-signature";
pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

/// Errors that can occur during webhook signature verification
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("Missing required header: {0}")]
    MissingHeader(&'static str),

    #[error("Invalid signature header format")]
    InvalidFormat,

    #[error("Invalid timestamp")]
    InvalidTimestamp,

    #[error("Timestamp outside the tolerance window")]
    TimestampOutOfTolerance,

    #[error("Invalid webhook secret")]
    InvalidSecret,

    #[error("Signature verification failed")]
    Mismatch,
}

fn header<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, SignatureError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(SignatureError::MissingHeader(name))
}

fn check_timestamp(timestamp: &str, now: i64) -> Result<i64, SignatureError> {
    let ts: i64 = timestamp.parse().map_err(|_| SignatureError::InvalidTimestamp)?;
    match now.checked_sub(ts).map(i64::unsigned_abs) {
        Some(skew) if skew <= TOLERANCE_SECONDS.unsigned_abs() => Ok(ts),
        _ => Err(SignatureError::TimestampOutOfTolerance),
    }
}

fn mac_over(key: &[u8], parts: &[&[u8]]) -> Result<HmacSha256, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SignatureError::InvalidSecret)?;
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            mac.update(b".");
        }
        mac.update(part);
    }
    Ok(mac)
}

/// Verifies a Standard Webhooks signature (Dodo Payments)
///
/// # Arguments
///
/// * `headers` - Request headers
/// * `body` - Raw request body
/// * `secret` - `whsec_<base64>` signing secret
/// * `now` - Current unix time in seconds
///
/// # Errors
///
/// Any [`SignatureError`]; the caller answers 400.
pub fn verify_standard_webhook(
    headers: &HeaderMap,
    body: &[u8],
    secret: &str,
    now: i64,
) -> Result<(), SignatureError> {
    let msg_id = header(headers, WEBHOOK_ID_HEADER)?;
    let timestamp = header(headers, WEBHOOK_TIMESTAMP_HEADER)?;
    let signatures = header(headers, WEBHOOK_SIGNATURE_HEADER)?;

    check_timestamp(timestamp, now)?;

    let key = STANDARD
        .decode(secret.strip_prefix("whsec_").unwrap_or(secret))
        .map_err(|_| SignatureError::InvalidSecret)?;
    let mac = mac_over(&key, &[msg_id.as_bytes(), timestamp.as_bytes(), body])?;

    let mut saw_v1 = false;
    for candidate in signatures.split_whitespace() {
        let Some(encoded) = candidate.strip_prefix("v1,") else {
            continue;
        };
        saw_v1 = true;
        let Ok(signature) = STANDARD.decode(encoded) else {
            continue;
        };
        if mac.clone().verify_slice(&signature).is_ok() {
            return Ok(());
        }
    }

    if saw_v1 {
        Err(SignatureError::Mismatch)
    } else {
        Err(SignatureError::InvalidFormat)
    }
}

/// Verifies a `Stripe-Signature` header
///
/// # Errors
///
/// Any [`SignatureError`]; the caller acknowledges with an error status so
/// Stripe doesn't retry a forged delivery.
pub fn verify_stripe_signature(
    headers: &HeaderMap,
    body: &[u8],
    secret: &str,
    now: i64,
) -> Result<(), SignatureError> {
    let value = header(headers, STRIPE_SIGNATURE_HEADER)?;

    let mut timestamp = None;
    let mut signatures = Vec::new();
    for item in value.split(',') {
        match item.trim().split_once('=') {
            Some(("t", ts)) => timestamp = Some(ts),
            Some(("v1", sig)) => signatures.push(sig),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::InvalidFormat)?;
    if signatures.is_empty() {
        return Err(SignatureError::InvalidFormat);
    }
    check_timestamp(timestamp, now)?;

    let mac = mac_over(secret.as_bytes(), &[timestamp.as_bytes(), body])?;
    let matched = signatures
        .iter()
        .filter_map(|sig| hex::decode(sig).ok())
        .any(|sig| mac.clone().verify_slice(&sig).is_ok());

    if matched {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::http::HeaderValue;

    pub(crate) const DODO_SECRET: &str = "whsec_MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw";
    pub(crate) const STRIPE_SECRET: &str = "whsec_stripe_test_secret";

    pub(crate) fn sign_standard(secret: &str, id: &str, ts: i64, body: &[u8]) -> String {
        let key = STANDARD.decode(secret.trim_start_matches("whsec_")).unwrap();
        let ts = ts.to_string();
        let mac = mac_over(&key, &[id.as_bytes(), ts.as_bytes(), body]).unwrap();
        format!("v1,{}", STANDARD.encode(mac.finalize().into_bytes()))
    }

    pub(crate) fn sign_stripe(secret: &str, ts: i64, body: &[u8]) -> String {
        let ts_str = ts.to_string();
        let mac = mac_over(secret.as_bytes(), &[ts_str.as_bytes(), body]).unwrap();
        format!("t={},v1={}", ts, hex::encode(mac.finalize().into_bytes()))
    }

    fn dodo_headers(id: &str, ts: i64, signature: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(WEBHOOK_ID_HEADER, HeaderValue::from_str(id).unwrap());
        headers.insert(WEBHOOK_TIMESTAMP_HEADER, HeaderValue::from_str(&ts.to_string()).unwrap());
        headers.insert(WEBHOOK_SIGNATURE_HEADER, HeaderValue::from_str(signature).unwrap());
        headers
    }

    #[test]
    fn test_standard_webhook_valid() {
        let body = br#"{"type":"subscription.active"}"#;
        let now = 1_700_000_000;
        let sig = sign_standard(DODO_SECRET, "msg_1", now, body);

        let headers = dodo_headers("msg_1", now, &format!("v1,bm9wZQ== {}", sig));
        assert_eq!(verify_standard_webhook(&headers, body, DODO_SECRET, now + 10), Ok(()));
    }

    #[test]
    fn test_standard_webhook_tampered_body() {
        let now = 1_700_000_000;
        let sig = sign_standard(DODO_SECRET, "msg_1", now, b"original");
        let headers = dodo_headers("msg_1", now, &sig);

        assert_eq!(
            verify_standard_webhook(&headers, b"tampered", DODO_SECRET, now),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_standard_webhook_stale_timestamp() {
        let now = 1_700_000_000;
        let sig = sign_standard(DODO_SECRET, "msg_1", now, b"{}");
        let headers = dodo_headers("msg_1", now, &sig);

        assert_eq!(
            verify_standard_webhook(&headers, b"{}", DODO_SECRET, now + TOLERANCE_SECONDS + 1),
            Err(SignatureError::TimestampOutOfTolerance)
        );
    }

    #[test]
    fn test_extreme_timestamps_rejected() {
        let now = 1_700_000_000;
        for ts in [i64::MIN, i64::MAX] {
            let sig = sign_standard(DODO_SECRET, "msg_1", ts, b"{}");
            let headers = dodo_headers("msg_1", ts, &sig);
            assert_eq!(
                verify_standard_webhook(&headers, b"{}", DODO_SECRET, now),
                Err(SignatureError::TimestampOutOfTolerance)
            );

            let mut headers = HeaderMap::new();
            headers.insert(
                STRIPE_SIGNATURE_HEADER,
                HeaderValue::from_str(&sign_stripe(STRIPE_SECRET, ts, b"{}")).unwrap(),
            );
            assert_eq!(
                verify_stripe_signature(&headers, b"{}", STRIPE_SECRET, now),
                Err(SignatureError::TimestampOutOfTolerance)
            );
        }
    }

    #[test]
    fn test_standard_webhook_missing_header() {
        assert_eq!(
            verify_standard_webhook(&HeaderMap::new(), b"{}", DODO_SECRET, 0),
            Err(SignatureError::MissingHeader(WEBHOOK_ID_HEADER))
        );
    }

    #[test]
    fn test_stripe_signature_valid() {
        let body = br#"{"id":"evt_1"}"#;
        let now = 1_700_000_000;
        let mut headers = HeaderMap::new();
        headers.insert(
            STRIPE_SIGNATURE_HEADER,
            HeaderValue::from_str(&sign_stripe(STRIPE_SECRET, now, body)).unwrap(),
        );

        assert_eq!(verify_stripe_signature(&headers, body, STRIPE_SECRET, now), Ok(()));
        assert_eq!(
            verify_stripe_signature(&headers, body, "whsec_other", now),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_stripe_signature_without_v1() {
        let mut headers = HeaderMap::new();
        headers.insert(STRIPE_SIGNATURE_HEADER, HeaderValue::from_static("t=1700000000,v0=abc"));
        assert_eq!(
            verify_stripe_signature(&headers, b"{}", STRIPE_SECRET, 1_700_000_000),
            Err(SignatureError::InvalidFormat)
        );
    }
}
