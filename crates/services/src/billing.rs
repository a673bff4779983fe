//! Subscription-state mapping for payment-provider webhook events.
//!
//! The webhook transport (signature checks, HTTP plumbing) lives with the
//! embedding application; this module is the dispatch table that turns a
//! verified lifecycle event into subscription fields on the user's record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Subscription fields kept on a user record, looked up by customer email.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberProfile {
    pub email: String,
    pub plan: Option<String>,
    pub is_pro: bool,
    pub subscription_status: Option<String>,
    pub cancel_at_next_billing_date: bool,
    pub next_billing_date: Option<DateTime<Utc>>,
}

impl SubscriberProfile {
    #[must_use]
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            ..Self::default()
        }
    }
}

/// Lifecycle events the payments provider delivers, keyed by type string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingEventKind {
    CheckoutCompleted,
    SubscriptionRenewed,
    SubscriptionCanceled,
    SubscriptionExpired,
    PaymentFailed,
    Unrecognized(String),
}

impl BillingEventKind {
    #[must_use]
    pub fn parse(event_type: &str) -> Self {
        match event_type {
            "checkout_completed" => Self::CheckoutCompleted,
            "subscription_renewed" => Self::SubscriptionRenewed,
            "subscription_canceled" => Self::SubscriptionCanceled,
            "subscription_expired" => Self::SubscriptionExpired,
            "payment_failed" => Self::PaymentFailed,
            other => Self::Unrecognized(other.to_string()),
        }
    }
}

/// One verified webhook delivery, reduced to the fields the mapping needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingEvent {
    pub kind: BillingEventKind,
    pub customer_email: String,
    pub plan: Option<String>,
    pub next_billing_date: Option<DateTime<Utc>>,
}

/// Apply one event to the subscriber's record.
///
/// Returns `false` (and changes nothing) for unrecognized event kinds; the
/// provider adds event types over time and unknown ones must not corrupt
/// subscription state.
pub fn apply_billing_event(profile: &mut SubscriberProfile, event: &BillingEvent) -> bool {
    match &event.kind {
        BillingEventKind::CheckoutCompleted | BillingEventKind::SubscriptionRenewed => {
            if event.plan.is_some() {
                profile.plan = event.plan.clone();
            }
            profile.is_pro = true;
            profile.subscription_status = Some("active".to_string());
            profile.cancel_at_next_billing_date = false;
            profile.next_billing_date = event.next_billing_date;
        }
        BillingEventKind::SubscriptionCanceled => {
            // access continues until the period ends; only the flag flips
            profile.cancel_at_next_billing_date = true;
        }
        BillingEventKind::SubscriptionExpired => {
            profile.plan = None;
            profile.is_pro = false;
            profile.subscription_status = Some("expired".to_string());
            profile.cancel_at_next_billing_date = false;
            profile.next_billing_date = None;
        }
        BillingEventKind::PaymentFailed => {
            profile.subscription_status = Some("past_due".to_string());
        }
        BillingEventKind::Unrecognized(kind) => {
            warn!(%kind, email = %event.customer_email, "ignoring unrecognized billing event");
            return false;
        }
    }
    true
}
