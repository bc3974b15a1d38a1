//! Scheduled lifecycle jobs
//!
//! Each job is one logical pass over a candidate set, written for an
//! at-least-once trigger model: re-running a pass over the same data
//! produces no additional observable effect. A per-item failure is logged
//! and skipped; only failing to enumerate the candidate set aborts a run.
//!
//! The worker binary owns the cadence; these bodies hold the semantics so
//! they can be driven by tests with a fixed clock.

use std::sync::Arc;

use chrono::{Duration, NaiveTime, TimeZone, Utc};

use crate::calculator;
use crate::clock::Clock;
use crate::error::{BillingError, BillingResult};
use crate::lifecycle::SubscriptionService;
use crate::model::{
    Customer, NotificationStatus, NotificationType, PaymentPlan, Subscription, SubscriptionStatus,
};
use crate::notifications::{ChannelSender, NotificationService};
use crate::store::Store;

/// Days past the due date before an overdue subscription is expired
pub const EXPIRATION_GRACE_DAYS: i64 = 30;

/// Reminders go out when the next payment is due within this many days
pub const REMINDER_WINDOW_DAYS: i64 = 3;

#[derive(Debug, Default, Clone, Copy)]
pub struct OverdueDetectionSummary {
    pub examined: usize,
    pub marked_overdue: usize,
    pub notices_sent: usize,
    pub failed: usize,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AutoExpirationSummary {
    pub examined: usize,
    pub expired: usize,
    pub customers_deactivated: usize,
    pub failed: usize,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PaymentReminderSummary {
    pub examined: usize,
    pub sent: usize,
    pub suppressed: usize,
    pub failed: usize,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PendingNotificationSummary {
    pub examined: usize,
    pub sent: usize,
    pub failed_sends: usize,
    pub errors: usize,
}

pub struct LifecycleJobs {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    lifecycle: SubscriptionService,
    notifications: NotificationService,
}

impl LifecycleJobs {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, sender: Arc<dyn ChannelSender>) -> Self {
        let lifecycle = SubscriptionService::new(store.clone(), clock.clone());
        let notifications = NotificationService::new(store.clone(), clock.clone(), sender);
        Self {
            store,
            clock,
            lifecycle,
            notifications,
        }
    }

    async fn customer_and_plan(
        &self,
        subscription: &Subscription,
    ) -> BillingResult<(Customer, PaymentPlan)> {
        let customer = self
            .store
            .get_customer(subscription.customer_id)
            .await?
            .ok_or_else(|| {
                BillingError::NotFound(format!("customer {}", subscription.customer_id))
            })?;
        let plan = self
            .store
            .get_plan(subscription.payment_plan_id)
            .await?
            .ok_or_else(|| {
                BillingError::NotFound(format!("payment plan {}", subscription.payment_plan_id))
            })?;
        Ok((customer, plan))
    }

    /// Mark every active subscription whose next payment date has passed
    /// as overdue, and notify the customer.
    ///
    /// Candidates are only ever `Active`, so a re-run after a completed
    /// pass finds nothing to do.
    pub async fn run_overdue_detection(&self) -> BillingResult<OverdueDetectionSummary> {
        let candidates = self
            .lifecycle
            .subscriptions_with_status(SubscriptionStatus::Active)
            .await?;
        let today = self.clock.today();
        let mut summary = OverdueDetectionSummary::default();

        for subscription in candidates {
            summary.examined += 1;
            let Some(due) = subscription.next_payment_date else {
                continue;
            };
            if due >= today {
                continue;
            }

            let subscription_id = subscription.id;
            match self.mark_overdue_and_notify(subscription).await {
                Ok(notified) => {
                    summary.marked_overdue += 1;
                    if notified {
                        summary.notices_sent += 1;
                    }
                }
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!(
                        subscription_id = %subscription_id,
                        error = %e,
                        "Overdue detection failed for subscription"
                    );
                }
            }
        }

        tracing::info!(
            examined = summary.examined,
            marked_overdue = summary.marked_overdue,
            notices_sent = summary.notices_sent,
            failed = summary.failed,
            "Overdue detection pass complete"
        );
        Ok(summary)
    }

    async fn mark_overdue_and_notify(&self, subscription: Subscription) -> BillingResult<bool> {
        let (customer, plan) = self.customer_and_plan(&subscription).await?;
        let days_late = self.lifecycle.days_past_due(&subscription);
        let subscription = self.lifecycle.mark_overdue(subscription).await?;

        let accrued = calculator::late_fee(&plan, days_late);
        match self
            .notifications
            .send_overdue_notice(&customer, &subscription, &plan, accrued)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                // Status change already took; the notice is best-effort
                tracing::warn!(
                    subscription_id = %subscription.id,
                    error = %e,
                    "Could not record overdue notice"
                );
                Ok(false)
            }
        }
    }

    /// Expire overdue subscriptions more than [`EXPIRATION_GRACE_DAYS`]
    /// past their next payment date; deactivate the customer when no
    /// active subscription remains.
    ///
    /// The customer check is re-evaluated every run rather than cached, so
    /// overlapping runs converge on the same state.
    pub async fn run_auto_expiration(&self) -> BillingResult<AutoExpirationSummary> {
        let candidates = self
            .lifecycle
            .subscriptions_with_status(SubscriptionStatus::Overdue)
            .await?;
        let today = self.clock.today();
        let mut summary = AutoExpirationSummary::default();

        for subscription in candidates {
            summary.examined += 1;
            let Some(due) = subscription.next_payment_date else {
                continue;
            };
            if (today - due).num_days() <= EXPIRATION_GRACE_DAYS {
                continue;
            }

            let subscription_id = subscription.id;
            match self.expire_subscription(subscription).await {
                Ok(customer_deactivated) => {
                    summary.expired += 1;
                    if customer_deactivated {
                        summary.customers_deactivated += 1;
                    }
                }
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!(
                        subscription_id = %subscription_id,
                        error = %e,
                        "Auto-expiration failed for subscription"
                    );
                }
            }
        }

        tracing::info!(
            examined = summary.examined,
            expired = summary.expired,
            customers_deactivated = summary.customers_deactivated,
            failed = summary.failed,
            "Auto-expiration pass complete"
        );
        Ok(summary)
    }

    async fn expire_subscription(&self, subscription: Subscription) -> BillingResult<bool> {
        let (mut customer, plan) = self.customer_and_plan(&subscription).await?;
        let subscription = self.lifecycle.mark_expired(subscription).await?;

        if let Err(e) = self
            .notifications
            .send_expiry_notice(&customer, &subscription, &plan)
            .await
        {
            tracing::warn!(
                subscription_id = %subscription.id,
                error = %e,
                "Could not record expiry notice"
            );
        }

        let has_active = self
            .store
            .subscriptions_by_customer(customer.id)
            .await?
            .iter()
            .any(|s| s.status == SubscriptionStatus::Active);
        if !has_active && customer.active {
            customer.active = false;
            self.store.save_customer(&customer).await?;
            tracing::info!(
                customer_id = %customer.id,
                "Deactivated customer with no remaining active subscription"
            );
            return Ok(true);
        }
        Ok(false)
    }

    /// Send payment reminders for active subscriptions due within
    /// [`REMINDER_WINDOW_DAYS`], at most once per day per subscription.
    ///
    /// The idempotency guard is a store lookup for a reminder recorded
    /// since the start of today for the same (customer, subscription)
    /// pair, which holds across repeated and jittered invocations.
    pub async fn run_payment_reminders(&self) -> BillingResult<PaymentReminderSummary> {
        let candidates = self
            .lifecycle
            .subscriptions_with_status(SubscriptionStatus::Active)
            .await?;
        let today = self.clock.today();
        let window_end = today + Duration::days(REMINDER_WINDOW_DAYS);
        let start_of_today = Utc.from_utc_datetime(&today.and_time(NaiveTime::MIN));
        let mut summary = PaymentReminderSummary::default();

        for subscription in candidates {
            summary.examined += 1;
            let Some(due) = subscription.next_payment_date else {
                continue;
            };
            if due < today || due > window_end {
                continue;
            }

            let subscription_id = subscription.id;
            let already_reminded = match self
                .store
                .notifications_for_subscription(subscription_id)
                .await
            {
                Ok(notifications) => notifications.iter().any(|n| {
                    n.notification_type == NotificationType::PaymentReminder
                        && n.customer_id == subscription.customer_id
                        && n.created_at >= start_of_today
                }),
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!(
                        subscription_id = %subscription_id,
                        error = %e,
                        "Could not check reminder history"
                    );
                    continue;
                }
            };
            if already_reminded {
                summary.suppressed += 1;
                continue;
            }

            match self.remind(subscription).await {
                Ok(()) => summary.sent += 1,
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!(
                        subscription_id = %subscription_id,
                        error = %e,
                        "Payment reminder failed for subscription"
                    );
                }
            }
        }

        tracing::info!(
            examined = summary.examined,
            sent = summary.sent,
            suppressed = summary.suppressed,
            failed = summary.failed,
            "Payment reminder pass complete"
        );
        Ok(summary)
    }

    async fn remind(&self, mut subscription: Subscription) -> BillingResult<()> {
        let (customer, plan) = self.customer_and_plan(&subscription).await?;
        self.notifications
            .send_payment_reminder(&customer, &subscription, &plan)
            .await?;
        subscription.last_reminder_sent = Some(self.clock.now());
        self.store.save_subscription(&subscription).await?;
        Ok(())
    }

    /// Push every `Pending` notification through the channel sender.
    ///
    /// A send failure becomes `Failed` state on the notification, never an
    /// error; the pass always covers the whole pending set.
    pub async fn run_pending_notifications(&self) -> BillingResult<PendingNotificationSummary> {
        let pending = self
            .store
            .notifications_by_status(NotificationStatus::Pending)
            .await?;
        let mut summary = PendingNotificationSummary::default();

        for notification in pending {
            summary.examined += 1;
            let notification_id = notification.id;
            match self.notifications.deliver(notification).await {
                Ok(delivered) if delivered.status == NotificationStatus::Sent => {
                    summary.sent += 1;
                }
                Ok(_) => summary.failed_sends += 1,
                Err(e) => {
                    summary.errors += 1;
                    tracing::error!(
                        notification_id = %notification_id,
                        error = %e,
                        "Pending notification processing failed"
                    );
                }
            }
        }

        tracing::info!(
            examined = summary.examined,
            sent = summary.sent,
            failed_sends = summary.failed_sends,
            errors = summary.errors,
            "Pending notification pass complete"
        );
        Ok(summary)
    }
}
