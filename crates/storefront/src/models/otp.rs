//! One-time code records.

use chrono::{DateTime, Utc};

use senmarket_core::{OtpCodeId, OtpPurpose};

/// A hashed one-time code sent by email.
#[derive(Debug, Clone)]
pub struct OtpCode {
    pub id: OtpCodeId,
    pub email: String,
    pub purpose: OtpPurpose,
    pub code_hash: String,
    pub attempts: i32,
    pub expires_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl OtpCode {
    /// Whether the code can still be redeemed.
    #[must_use]
    pub fn is_usable(&self, now: DateTime<Utc>, max_attempts: i32) -> bool {
        self.consumed_at.is_none() && now <= self.expires_at && self.attempts < max_attempts
    }

    /// Seconds left before another code may be sent, or `None` once the
    /// cooldown has passed.
    #[must_use]
    pub fn resend_wait(&self, now: DateTime<Utc>, cooldown_secs: i64) -> Option<i64> {
        let elapsed = (now - self.created_at).num_seconds();
        (elapsed < cooldown_secs).then(|| (cooldown_secs - elapsed).min(cooldown_secs))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn code(now: DateTime<Utc>) -> OtpCode {
        OtpCode {
            id: OtpCodeId::new(1),
            email: "lan@example.vn".to_string(),
            purpose: OtpPurpose::Register,
            code_hash: String::new(),
            attempts: 0,
            expires_at: now + Duration::minutes(10),
            consumed_at: None,
            created_at: now,
        }
    }

    #[test]
    fn test_usable_until_expiry() {
        let now = Utc::now();
        let otp = code(now);
        assert!(otp.is_usable(now, 5));
        assert!(otp.is_usable(now + Duration::minutes(10), 5));
        assert!(!otp.is_usable(now + Duration::minutes(11), 5));
    }

    #[test]
    fn test_attempts_and_consumption() {
        let now = Utc::now();
        let mut otp = code(now);
        otp.attempts = 5;
        assert!(!otp.is_usable(now, 5));

        let mut otp = code(now);
        otp.consumed_at = Some(now);
        assert!(!otp.is_usable(now, 5));
    }

    #[test]
    fn test_resend_wait() {
        let now = Utc::now();
        let otp = code(now);
        assert_eq!(otp.resend_wait(now, 60), Some(60));
        assert_eq!(otp.resend_wait(now + Duration::seconds(45), 60), Some(15));
        assert_eq!(otp.resend_wait(now + Duration::seconds(60), 60), None);
        // A row stamped ahead of our clock never asks for more than the cooldown.
        assert_eq!(otp.resend_wait(now - Duration::seconds(30), 60), Some(60));
    }
}
