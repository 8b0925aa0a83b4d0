use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::entities::discount_code;

/// Why a discount code was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    NotFound,
    Inactive,
    Expired,
    Exhausted,
    NotAuthorized,
}

impl RejectReason {
    /// Retry prompt shown to the buyer. Not-found and inactive are
    /// indistinguishable on purpose; neither leaks code existence.
    pub fn user_message(&self) -> &'static str {
        match self {
            RejectReason::NotFound | RejectReason::Inactive => {
                "❌ Invalid discount code. Please try again or press 'No Code':"
            }
            RejectReason::Expired => {
                "❌ Discount code has expired. Please try another code or press 'No Code':"
            }
            RejectReason::Exhausted => {
                "❌ Discount code has reached maximum uses. Please try another code or press 'No Code':"
            }
            RejectReason::NotAuthorized => {
                "❌ This discount code is not for you. Please try another code or press 'No Code':"
            }
        }
    }
}

/// Outcome of evaluating a code for one requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscountDecision {
    Valid(Decimal),
    Invalid(RejectReason),
}

/// Evaluates a discount code against a requester at a point in time.
///
/// Pure on purpose: no counter moves here. Usage is consumed with a capped
/// increment when the order commits, so two buyers may both see Valid for a
/// single-use code and the slower one fails at commit instead.
///
/// Checks run in a fixed order and stop at the first failure:
/// existence, active flag, expiry, usage cap, client binding.
pub fn evaluate(
    code: Option<&discount_code::Model>,
    client_id: i64,
    client_username: Option<&str>,
    today: NaiveDate,
) -> DiscountDecision {
    let code = match code {
        Some(code) => code,
        None => return DiscountDecision::Invalid(RejectReason::NotFound),
    };

    if !code.is_active {
        return DiscountDecision::Invalid(RejectReason::Inactive);
    }

    if let Some(expiry) = code.expiry_date {
        if today > expiry {
            return DiscountDecision::Invalid(RejectReason::Expired);
        }
    }

    if code.max_uses != -1 && code.used_count >= code.max_uses {
        return DiscountDecision::Invalid(RejectReason::Exhausted);
    }

    if !code.is_general {
        if let Some(bound_id) = code.client_id {
            if bound_id != client_id {
                return DiscountDecision::Invalid(RejectReason::NotAuthorized);
            }
        }
        if let Some(bound_username) = code.client_username.as_deref() {
            if client_username != Some(bound_username) {
                return DiscountDecision::Invalid(RejectReason::NotAuthorized);
            }
        }
    }

    DiscountDecision::Valid(code.discount_percentage)
}
