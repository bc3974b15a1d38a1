// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! RecurPay Billing Core
//!
//! Manages recurring billing relationships between businesses and their
//! customers: payment plans, subscriptions, payments, and the scheduled
//! lifecycle that keeps subscription state consistent with payment
//! reality over time.
//!
//! ## Features
//!
//! - **Billing Calculator**: period date arithmetic, advance-period
//!   discounts, grace-period late fees (pure functions)
//! - **Subscription Lifecycle**: create, renew, cancel, apply payments,
//!   scheduled status transitions
//! - **Payments**: direct recording plus a two-phase gateway flow with
//!   idempotent verification
//! - **Notifications**: reminder/overdue/expiry/confirmation messages
//!   behind a pluggable channel sender
//! - **Scheduled Jobs**: overdue detection, auto-expiration, payment
//!   reminders, pending-notification retry — all idempotent
//!
//! Storage is a record-store trait ([`Store`]); the clock is injected
//! ([`Clock`]) so date-boundary behavior is testable.

pub mod accounts;
pub mod calculator;
pub mod clock;
pub mod error;
pub mod jobs;
pub mod lifecycle;
pub mod memory;
pub mod model;
pub mod notifications;
pub mod payments;
pub mod store;

#[cfg(test)]
mod edge_case_tests;
#[cfg(test)]
mod testing;

// Accounts
pub use accounts::{AccountService, NewPlan};

// Calculator
pub use calculator::{late_fee, period_end_date, total_amount, ChargeTotal};

// Clock
pub use clock::{Clock, FixedClock, SystemClock};

// Error
pub use error::{BillingError, BillingResult};

// Jobs
pub use jobs::{
    AutoExpirationSummary, LifecycleJobs, OverdueDetectionSummary, PaymentReminderSummary,
    PendingNotificationSummary, EXPIRATION_GRACE_DAYS, REMINDER_WINDOW_DAYS,
};

// Lifecycle
pub use lifecycle::SubscriptionService;

// Model
pub use model::{
    Business, Customer, Notification, NotificationChannel, NotificationStatus, NotificationType,
    Payment, PaymentMethod, PaymentPlan, PaymentStatus, PeriodType, Subscription,
    SubscriptionStatus,
};

// Notifications
pub use notifications::{ChannelSender, NotificationService, SendFailure, SendReceipt};

// Payments
pub use payments::{PaymentInitiation, PaymentService, PendingPayment};

// Store
pub use memory::MemoryStore;
pub use store::Store;

use std::sync::Arc;

/// Main billing service that combines all billing functionality
pub struct BillingService {
    pub accounts: AccountService,
    pub subscriptions: SubscriptionService,
    pub payments: PaymentService,
    pub notifications: NotificationService,
    pub jobs: LifecycleJobs,
}

impl BillingService {
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        sender: Arc<dyn ChannelSender>,
        payment_link_base: impl Into<String>,
    ) -> Self {
        Self {
            accounts: AccountService::new(store.clone(), clock.clone()),
            subscriptions: SubscriptionService::new(store.clone(), clock.clone()),
            payments: PaymentService::new(
                store.clone(),
                clock.clone(),
                sender.clone(),
                payment_link_base.into(),
            ),
            notifications: NotificationService::new(store.clone(), clock.clone(), sender.clone()),
            jobs: LifecycleJobs::new(store, clock, sender),
        }
    }
}
