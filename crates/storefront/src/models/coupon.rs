//! Coupon domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use senmarket_core::{CouponId, CouponKind, CouponTerms};

/// A stored coupon.
#[derive(Debug, Clone, Serialize)]
pub struct Coupon {
    pub id: CouponId,
    pub code: String,
    #[serde(flatten)]
    pub terms: CouponTerms,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields an administrator supplies when creating or editing a coupon.
#[derive(Debug, Clone, Deserialize)]
pub struct CouponInput {
    pub code: String,
    pub kind: CouponKind,
    pub value: Decimal,
    pub max_discount: Option<Decimal>,
    #[serde(default)]
    pub min_order_amount: Decimal,
    pub usage_limit: Option<i32>,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

const fn default_true() -> bool {
    true
}

impl CouponInput {
    /// Codes are stored trimmed and uppercase.
    #[must_use]
    pub fn normalized_code(&self) -> String {
        normalize_code(&self.code)
    }

    /// Terms for validation; `used_count` carries over on edits.
    #[must_use]
    pub const fn terms(&self, used_count: i32) -> CouponTerms {
        CouponTerms {
            kind: self.kind,
            value: self.value,
            max_discount: self.max_discount,
            min_order_amount: self.min_order_amount,
            usage_limit: self.usage_limit,
            used_count,
            starts_at: self.starts_at,
            expires_at: self.expires_at,
            is_active: self.is_active,
        }
    }
}

/// Normalize a customer-typed coupon code.
#[must_use]
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code("  tet2026 "), "TET2026");
        assert_eq!(normalize_code("FREESHIP"), "FREESHIP");
    }

    #[test]
    fn test_input_defaults() {
        let input: CouponInput =
            serde_json::from_str(r#"{"code":"sale10","kind":"percentage","value":"10"}"#)
                .unwrap_or_else(|e| panic!("{e}"));
        assert!(input.is_active);
        assert_eq!(input.min_order_amount, Decimal::ZERO);
        assert_eq!(input.normalized_code(), "SALE10");
        assert_eq!(input.terms(4).used_count, 4);
    }
}
