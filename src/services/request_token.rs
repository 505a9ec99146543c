// Short-lived request tokens the widget echoes back on every public call.
// Format: "{expiry_unix}.{hex(hmac_sha256(secret, "chat-nonce:{expiry_unix}"))}".

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

pub const TOKEN_LIFETIME_SECS: i64 = 12 * 60 * 60;

#[derive(Clone)]
pub struct RequestTokens {
    secret: String,
}

impl RequestTokens {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn issue(&self) -> String {
        self.issue_at(Utc::now().timestamp())
    }

    pub fn issue_at(&self, now: i64) -> String {
        let expires = now + TOKEN_LIFETIME_SECS;
        format!("{}.{}", expires, self.mac_hex(expires))
    }

    pub fn verify(&self, token: &str) -> bool {
        self.verify_at(token, Utc::now().timestamp())
    }

    pub fn verify_at(&self, token: &str, now: i64) -> bool {
        let Some((expiry, signature)) = token.trim().split_once('.') else {
            return false;
        };
        let Ok(expires) = expiry.parse::<i64>() else {
            return false;
        };
        if expires <= now {
            return false;
        }
        let Ok(signature) = hex::decode(signature) else {
            return false;
        };

        match self.mac(expires) {
            // verify_slice compares in constant time
            Some(mac) => mac.verify_slice(&signature).is_ok(),
            None => false,
        }
    }

    fn mac(&self, expires: i64) -> Option<Hmac<Sha256>> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret.as_bytes()).ok()?;
        mac.update(format!("chat-nonce:{}", expires).as_bytes());
        Some(mac)
    }

    fn mac_hex(&self, expires: i64) -> String {
        self.mac(expires)
            .map(|mac| hex::encode(mac.finalize().into_bytes()))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_760_000_000;

    #[test]
    fn test_fresh_token_verifies() {
        let tokens = RequestTokens::new("a-secret-that-is-long-enough-for-tests");
        let token = tokens.issue_at(NOW);
        assert!(tokens.verify_at(&token, NOW));
        assert!(tokens.verify_at(&token, NOW + TOKEN_LIFETIME_SECS - 1));
    }

    #[test]
    fn test_expired_token_fails() {
        let tokens = RequestTokens::new("a-secret-that-is-long-enough-for-tests");
        let token = tokens.issue_at(NOW);
        assert!(!tokens.verify_at(&token, NOW + TOKEN_LIFETIME_SECS));
    }

    #[test]
    fn test_tampered_token_fails() {
        let tokens = RequestTokens::new("a-secret-that-is-long-enough-for-tests");
        let token = tokens.issue_at(NOW);
        let (expiry, signature) = token.split_once('.').unwrap();

        let pushed_expiry = format!("{}.{}", expiry.parse::<i64>().unwrap() + 3600, signature);
        assert!(!tokens.verify_at(&pushed_expiry, NOW));

        let mut flipped = signature.to_string();
        let last = if flipped.ends_with('0') { "1" } else { "0" };
        flipped.replace_range(flipped.len() - 1.., last);
        assert!(!tokens.verify_at(&format!("{}.{}", expiry, flipped), NOW));

        let other = RequestTokens::new("another-secret-that-is-long-enough");
        assert!(!other.verify_at(&token, NOW));
    }

    #[test]
    fn test_garbage_rejected() {
        let tokens = RequestTokens::new("s");
        for token in ["", "abc", "123.", ".abcd", "x.y", "999999999999.zz"] {
            assert!(!tokens.verify_at(token, NOW), "accepted {:?}", token);
        }
    }
}
