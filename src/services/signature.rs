// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fitbit webhook signature verification.
//!
//! Fitbit signs each notification body with HMAC-SHA1, keyed by the OAuth
//! client secret followed by `&`, and sends the base64 digest in the
//! `X-Fitbit-Signature` header. The MAC must be computed over the raw
//! request bytes; a re-serialized body will not match.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ring::hmac;
use subtle::ConstantTimeEq;

/// Header carrying the base64 HMAC of the body.
pub const SIGNATURE_HEADER: &str = "x-fitbit-signature";

fn signing_key(shared_secret: &str) -> hmac::Key {
    let mut key = Vec::with_capacity(shared_secret.len() + 1);
    key.extend_from_slice(shared_secret.as_bytes());
    key.push(b'&');
    hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, &key)
}

/// Base64 HMAC-SHA1 signature of `raw_body`, as Fitbit computes it.
pub fn sign(raw_body: &[u8], shared_secret: &str) -> String {
    let tag = hmac::sign(&signing_key(shared_secret), raw_body);
    BASE64.encode(tag.as_ref())
}

/// Check a provided signature against `raw_body` in constant time.
pub fn verify(raw_body: &[u8], provided_signature: &str, shared_secret: &str) -> bool {
    let expected = sign(raw_body, shared_secret);
    expected
        .as_bytes()
        .ct_eq(provided_signature.as_bytes())
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &[u8] = br#"[{"collectionType":"activities","date":"2024-01-01","ownerId":"u1","ownerType":"user","subscriptionId":"1"}]"#;

    #[test]
    fn test_verify_accepts_own_signature() {
        let signature = sign(BODY, "secret");
        assert!(verify(BODY, &signature, "secret"));
    }

    #[test]
    fn test_verify_rejects_other_secret() {
        let signature = sign(BODY, "secret");
        assert!(!verify(BODY, &signature, "secret2"));
        assert!(!verify(BODY, &signature, ""));
    }

    #[test]
    fn test_verify_rejects_any_single_byte_mutation() {
        let signature = sign(BODY, "secret");
        for i in 0..BODY.len() {
            let mut mutated = BODY.to_vec();
            mutated[i] ^= 0x01;
            assert!(
                !verify(&mutated, &signature, "secret"),
                "mutation at byte {} accepted",
                i
            );
        }
    }

    #[test]
    fn test_verify_rejects_reserialized_body() {
        let signature = sign(BODY, "secret");
        let parsed: serde_json::Value = serde_json::from_slice(BODY).unwrap();
        let reserialized = serde_json::to_vec_pretty(&parsed).unwrap();
        assert!(!verify(&reserialized, &signature, "secret"));
    }

    #[test]
    fn test_verify_rejects_missing_or_garbage_signature() {
        assert!(!verify(BODY, "", "secret"));
        assert!(!verify(BODY, "not-base64!!", "secret"));
    }

    #[test]
    fn test_sign_matches_known_digest() {
        // HMAC-SHA1 keyed with "secret&" over the empty message
        assert_eq!(sign(b"", "secret"), "EBw0gHngam3BTx8kfPfNNSyKem4=");
    }
}
