//! Bearer credential and the client-side validity filter.
//!
//! A credential is three dot-separated segments (header, claims, signature).
//! Only the claims segment is decoded. **The signature is never verified**:
//! this is a sanity filter that keeps obviously malformed or expired
//! credentials off the network, not a trust boundary. The server remains the
//! authority on signature validity, so a credential accepted here can still be
//! rejected at handshake time.

use std::{fmt, sync::Arc};

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use ichiba_shared::time::{Clock, SystemClock};
use serde_json::{Map, Value};

use super::CredentialError;

/// Decoded claims segment of a credential
#[derive(Debug, Clone, PartialEq)]
pub struct Claims {
    /// `sub` claim (subject identity)
    pub subject: Option<String>,
    /// `exp` claim, Unix seconds
    pub expires_at: Option<i64>,
    /// Every other claim, untouched
    pub extra: Map<String, Value>,
}

impl Claims {
    fn from_segment(segment: &str) -> Result<Self, CredentialError> {
        // Accept both base64url and the standard alphabet, padded or not.
        let normalized: String = segment
            .trim_end_matches('=')
            .chars()
            .map(|c| match c {
                '+' => '-',
                '/' => '_',
                other => other,
            })
            .collect();

        let bytes = URL_SAFE_NO_PAD
            .decode(normalized.as_bytes())
            .map_err(|e| CredentialError::InvalidCredential(format!("claims not decodable: {e}")))?;

        let mut extra = match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                return Err(CredentialError::InvalidCredential(
                    "claims segment is not a record".to_string(),
                ));
            }
            Err(e) => {
                return Err(CredentialError::InvalidCredential(format!(
                    "claims not parseable: {e}"
                )));
            }
        };

        let subject = match extra.remove("sub") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(_) => {
                return Err(CredentialError::InvalidCredential(
                    "sub claim is neither a string nor a number".to_string(),
                ));
            }
        };

        // An expiry that cannot be compared against the clock is treated as malformed.
        let expires_at = match extra.remove("exp") {
            None | Some(Value::Null) => None,
            Some(Value::Number(n)) => match n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)) {
                Some(exp) => Some(exp),
                None => {
                    return Err(CredentialError::InvalidCredential(
                        "exp claim out of range".to_string(),
                    ));
                }
            },
            Some(_) => {
                return Err(CredentialError::InvalidCredential(
                    "exp claim is not numeric".to_string(),
                ));
            }
        };

        Ok(Self {
            subject,
            expires_at,
            extra,
        })
    }
}

/// Opaque bearer string with its decoded claims
#[derive(Clone, PartialEq)]
pub struct Credential {
    raw: String,
    claims: Claims,
}

impl Credential {
    /// Parse the structure of a credential. Expiry is not checked here.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::InvalidCredential` when the credential is empty,
    /// does not have exactly three segments, or its claims segment is not a
    /// decodable record.
    pub fn parse(raw: impl Into<String>) -> Result<Self, CredentialError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(CredentialError::InvalidCredential(
                "credential is empty".to_string(),
            ));
        }

        let segments: Vec<&str> = raw.split('.').collect();
        if segments.len() != 3 {
            return Err(CredentialError::InvalidCredential(format!(
                "expected 3 segments, found {}",
                segments.len()
            )));
        }

        let claims = Claims::from_segment(segments[1])?;
        Ok(Self { raw, claims })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    /// `true` when an expiry claim exists and lies before `now_millis`
    pub fn is_expired_at(&self, now_millis: i64) -> bool {
        self.claims
            .expires_at
            .is_some_and(|exp| exp.saturating_mul(1000) < now_millis)
    }

    /// Milliseconds from `now_millis` until expiry, if the credential expires at all
    pub fn millis_until_expiry(&self, now_millis: i64) -> Option<i64> {
        self.claims
            .expires_at
            .map(|exp| exp.saturating_mul(1000).saturating_sub(now_millis))
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("raw", &"<redacted>")
            .field("claims", &self.claims)
            .finish()
    }
}

/// Decides whether a stored credential is structurally well-formed and unexpired.
///
/// Pure: the only input besides the credential is the injected clock.
#[derive(Clone)]
pub struct TokenValidator {
    clock: Arc<dyn Clock>,
}

impl TokenValidator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Validator backed by the system clock
    pub fn system() -> Self {
        Self::new(Arc::new(SystemClock))
    }

    /// Current time of the injected clock, Unix milliseconds
    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Returns `false` (never panics) for an absent, malformed or expired credential.
    pub fn is_valid(&self, credential: Option<&str>) -> bool {
        match credential {
            Some(raw) => self.validate(raw).is_ok(),
            None => false,
        }
    }

    /// Parse and check expiry in one step.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::InvalidCredential` describing the first failed check.
    pub fn validate(&self, raw: &str) -> Result<Credential, CredentialError> {
        let credential = Credential::parse(raw)?;
        self.check(&credential)?;
        Ok(credential)
    }

    /// Re-check the expiry of an already parsed credential.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::InvalidCredential` when the credential has expired.
    pub fn check(&self, credential: &Credential) -> Result<(), CredentialError> {
        if credential.is_expired_at(self.clock.now_millis()) {
            return Err(CredentialError::InvalidCredential(
                "credential has expired".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenValidator")
            .field("now_millis", &self.clock.now_millis())
            .finish()
    }
}

/// Build an unsigned credential around the given claims.
///
/// Used by tests and local tooling; the signature segment is a placeholder.
pub fn encode_unsigned(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(claims.to_string().as_bytes());
    format!("{header}.{body}.unsigned")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ichiba_shared::time::FixedClock;
    use serde_json::json;

    // 2024-01-01T00:00:00Z
    const NOW_MILLIS: i64 = 1_704_067_200_000;
    const NOW_SECS: i64 = NOW_MILLIS / 1000;

    fn validator() -> TokenValidator {
        TokenValidator::new(Arc::new(FixedClock::new(NOW_MILLIS)))
    }

    #[test]
    fn test_valid_credential_with_future_expiry() {
        // テスト項目: 有効期限が未来の資格情報は有効と判定される
        // given (前提条件):
        let raw = encode_unsigned(&json!({"sub": "42", "exp": NOW_SECS + 60}));

        // when (操作):
        let result = validator().validate(&raw);

        // then (期待する結果):
        let credential = result.unwrap();
        assert_eq!(credential.claims().subject.as_deref(), Some("42"));
        assert_eq!(credential.claims().expires_at, Some(NOW_SECS + 60));
    }

    #[test]
    fn test_expired_credential_is_invalid() {
        // テスト項目: 有効期限が過去の資格情報は無効と判定される
        // given (前提条件):
        let raw = encode_unsigned(&json!({"sub": "42", "exp": NOW_SECS - 1}));

        // when (操作):
        let valid = validator().is_valid(Some(&raw));

        // then (期待する結果):
        assert!(!valid);
    }

    #[test]
    fn test_credential_without_expiry_is_valid() {
        // テスト項目: exp クレームを持たない資格情報は有効と判定される
        // given (前提条件):
        let raw = encode_unsigned(&json!({"sub": 7}));

        // when (操作):
        let result = validator().validate(&raw);

        // then (期待する結果):
        assert_eq!(result.unwrap().claims().subject.as_deref(), Some("7"));
    }

    #[test]
    fn test_absent_or_empty_credential_is_invalid() {
        // テスト項目: 資格情報が無い、または空文字の場合は無効と判定される
        // given (前提条件):
        let validator = validator();

        // when (操作):
        let absent = validator.is_valid(None);
        let empty = validator.is_valid(Some(""));

        // then (期待する結果):
        assert!(!absent);
        assert!(!empty);
    }

    #[test]
    fn test_wrong_segment_count_is_invalid() {
        // テスト項目: セグメント数が 3 でない資格情報は無効と判定される
        // given (前提条件):
        let body = URL_SAFE_NO_PAD.encode(br#"{"sub":"1"}"#);
        let two = format!("header.{body}");
        let four = format!("header.{body}.sig.extra");

        // when (操作):
        let validator = validator();

        // then (期待する結果):
        assert!(!validator.is_valid(Some(&two)));
        assert!(!validator.is_valid(Some(&four)));
    }

    #[test]
    fn test_undecodable_claims_are_invalid() {
        // テスト項目: クレーム部がデコードできない資格情報は無効と判定される
        // given (前提条件):
        let not_base64 = "header.!!!.sig";
        let not_json = format!("header.{}.sig", URL_SAFE_NO_PAD.encode(b"not json"));
        let not_record = format!("header.{}.sig", URL_SAFE_NO_PAD.encode(b"[1,2,3]"));

        // when (操作):
        let validator = validator();

        // then (期待する結果):
        assert!(!validator.is_valid(Some(not_base64)));
        assert!(!validator.is_valid(Some(&not_json)));
        assert!(!validator.is_valid(Some(&not_record)));
    }

    #[test]
    fn test_non_numeric_expiry_is_invalid() {
        // テスト項目: exp が数値でない資格情報は無効と判定される
        // given (前提条件):
        let raw = encode_unsigned(&json!({"sub": "1", "exp": "tomorrow"}));

        // when (操作):
        let result = validator().validate(&raw);

        // then (期待する結果):
        assert!(matches!(result, Err(CredentialError::InvalidCredential(_))));
    }

    #[test]
    fn test_padded_standard_alphabet_claims_are_accepted() {
        // テスト項目: パディング付きの標準 base64 でもクレームを読み取れる
        // given (前提条件):
        use base64::engine::general_purpose::STANDARD;
        let body = STANDARD.encode(br#"{"sub":"padded"}"#);
        let raw = format!("header.{body}.sig");

        // when (操作):
        let result = validator().validate(&raw);

        // then (期待する結果):
        assert_eq!(result.unwrap().claims().subject.as_deref(), Some("padded"));
    }

    #[test]
    fn test_signature_is_not_verified() {
        // テスト項目: 署名部は検証されない（サーバーが最終的な判断者）
        // given (前提条件):
        let body = URL_SAFE_NO_PAD.encode(br#"{"sub":"1"}"#);
        let raw = format!("anything.{body}.definitely-not-a-signature");

        // when (操作):
        let valid = validator().is_valid(Some(&raw));

        // then (期待する結果):
        assert!(valid);
    }

    #[test]
    fn test_debug_output_redacts_raw_credential() {
        // テスト項目: Debug 出力に生の資格情報が含まれない
        // given (前提条件):
        let raw = encode_unsigned(&json!({"sub": "secret-holder"}));
        let credential = Credential::parse(raw.clone()).unwrap();

        // when (操作):
        let output = format!("{:?}", credential);

        // then (期待する結果):
        assert!(!output.contains(&raw));
        assert!(output.contains("<redacted>"));
    }

    #[test]
    fn test_millis_until_expiry() {
        // テスト項目: 有効期限までの残り時間が計算される
        // given (前提条件):
        let raw = encode_unsigned(&json!({"exp": NOW_SECS + 2}));
        let credential = Credential::parse(raw).unwrap();

        // when (操作):
        let remaining = credential.millis_until_expiry(NOW_MILLIS);

        // then (期待する結果):
        assert_eq!(remaining, Some(2000));
    }
}
