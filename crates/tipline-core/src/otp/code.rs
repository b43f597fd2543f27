//! HOTP/TOTP code computation (RFC 4226 / RFC 6238, HMAC-SHA1, six digits).

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use subtle::ConstantTimeEq;

use crate::error::{Result, TiplineError};

type HmacSha1 = Hmac<Sha1>;

/// Number of digits in every token.
pub const TOKEN_DIGITS: usize = 6;

const TOKEN_MODULUS: u32 = 1_000_000;

/// Compute the HOTP code for `counter`.
pub fn hotp(key: &[u8], counter: u64) -> Result<String> {
    let mut mac = HmacSha1::new_from_slice(key)
        .map_err(|e| TiplineError::Crypto(format!("Invalid OTP key: {}", e)))?;
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    // Dynamic truncation
    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = ((digest[offset] as u32 & 0x7f) << 24)
        | ((digest[offset + 1] as u32) << 16)
        | ((digest[offset + 2] as u32) << 8)
        | (digest[offset + 3] as u32);

    Ok(format!(
        "{:0width$}",
        binary % TOKEN_MODULUS,
        width = TOKEN_DIGITS
    ))
}

/// TOTP time-step index of `at`. Times before the epoch map to step 0.
pub fn timecode(at: DateTime<Utc>, step_secs: u64) -> u64 {
    let secs = u64::try_from(at.timestamp()).unwrap_or(0);
    secs / step_secs.max(1)
}

/// Strip the whitespace clients add for readability and check the shape.
pub fn normalize_token(token: &str) -> Result<String> {
    let token: String = token.split_whitespace().collect();
    if token.len() != TOKEN_DIGITS {
        return Err(TiplineError::BadToken(format!(
            "Token should be of length {}",
            TOKEN_DIGITS
        )));
    }
    if !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TiplineError::BadToken(
            "Token string should only contain digits".to_string(),
        ));
    }
    Ok(token)
}

/// Constant-time token comparison.
pub fn tokens_match(expected: &str, candidate: &str) -> bool {
    expected.as_bytes().ct_eq(candidate.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RFC_SECRET: &[u8] = b"12345678901234567890";

    #[test]
    fn test_rfc4226_vectors() {
        let expected = [
            "755224", "287082", "359152", "969429", "338314", "254676", "287922", "162583",
            "399871", "520489",
        ];
        for (counter, code) in expected.iter().enumerate() {
            assert_eq!(hotp(RFC_SECRET, counter as u64).unwrap(), *code);
        }
    }

    #[test]
    fn test_rfc6238_vector_truncated_to_six_digits() {
        // RFC 6238 SHA1 at T=59 is 94287082; the last six digits are the code.
        let at = DateTime::from_timestamp(59, 0).unwrap();
        let step = timecode(at, 30);
        assert_eq!(step, 1);
        assert_eq!(hotp(RFC_SECRET, step).unwrap(), "287082");
    }

    #[test]
    fn test_timecode_boundaries() {
        let at = |s| DateTime::from_timestamp(s, 0).unwrap();
        assert_eq!(timecode(at(0), 30), 0);
        assert_eq!(timecode(at(29), 30), 0);
        assert_eq!(timecode(at(30), 30), 1);
        assert_eq!(timecode(at(-100), 30), 0);
    }

    #[test]
    fn test_normalize_strips_whitespace() {
        assert_eq!(normalize_token(" 123 456 ").unwrap(), "123456");
        assert_eq!(normalize_token("123\t456\n").unwrap(), "123456");
    }

    #[test]
    fn test_normalize_rejects_bad_shapes() {
        for bad in ["12345", "1234567", "12a456", "", "１２３４５６"] {
            assert!(
                matches!(normalize_token(bad), Err(TiplineError::BadToken(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_tokens_match() {
        assert!(tokens_match("123456", "123456"));
        assert!(!tokens_match("123456", "123457"));
        assert!(!tokens_match("123456", "12345"));
    }
}
