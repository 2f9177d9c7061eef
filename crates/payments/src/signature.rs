//! Gateway callback signature verification.
//!
//! The gateway signs `"{order_id}|{payment_id}"` with HMAC-SHA256 keyed by
//! the merchant secret and sends the hex digest alongside the callback.
//! Verification recomputes the MAC and compares in constant time.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Computes the hex signature the gateway is expected to send.
///
/// Returns `None` only if the MAC cannot be keyed, which HMAC-SHA256
/// never does for any secret length.
pub fn sign(razorpay_order_id: &str, razorpay_payment_id: &str, secret: &str) -> Option<String> {
    let payload = format!("{razorpay_order_id}|{razorpay_payment_id}");
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(payload.as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Verifies a callback signature.
///
/// Uses `Mac::verify_slice` for a constant-time comparison; malformed hex
/// fails verification rather than erroring.
pub fn verify(
    razorpay_order_id: &str,
    razorpay_payment_id: &str,
    signature: &str,
    secret: &str,
) -> bool {
    let payload = format!("{razorpay_order_id}|{razorpay_payment_id}");
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload.as_bytes());

    match hex::decode(signature) {
        Ok(sig_bytes) => mac.verify_slice(&sig_bytes).is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test_key_secret";

    #[test]
    fn valid_signature_verifies() {
        let signature = sign("order_123", "pay_456", SECRET).unwrap();
        assert!(verify("order_123", "pay_456", &signature, SECRET));
    }

    #[test]
    fn single_bit_flip_fails_verification() {
        let signature = sign("order_123", "pay_456", SECRET).unwrap();
        // Flip one bit of the first hex nibble.
        let mut bytes = hex::decode(&signature).unwrap();
        bytes[0] ^= 0x01;
        let tampered = hex::encode(bytes);
        assert_ne!(tampered, signature);
        assert!(!verify("order_123", "pay_456", &tampered, SECRET));
    }

    #[test]
    fn wrong_secret_fails_verification() {
        let signature = sign("order_123", "pay_456", SECRET).unwrap();
        assert!(!verify("order_123", "pay_456", &signature, "other_secret"));
    }

    #[test]
    fn signature_binds_both_ids() {
        let signature = sign("order_123", "pay_456", SECRET).unwrap();
        assert!(!verify("order_999", "pay_456", &signature, SECRET));
        assert!(!verify("order_123", "pay_999", &signature, SECRET));
    }

    #[test]
    fn malformed_hex_fails_verification() {
        assert!(!verify("order_123", "pay_456", "not-hex!", SECRET));
        assert!(!verify("order_123", "pay_456", "", SECRET));
    }
}
