//! Subscription lifecycle service
//!
//! Owns every subscription state transition. Request-driven paths call
//! [`SubscriptionService::create_subscription`], `renew`, `cancel` and
//! `apply_payment`; the scheduled jobs call the `mark_*` status setters,
//! which are read-then-conditionally-write and therefore safe to re-run.

use std::sync::Arc;

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::calculator;
use crate::clock::Clock;
use crate::error::{BillingError, BillingResult};
use crate::model::{PaymentPlan, Subscription, SubscriptionStatus};
use crate::store::Store;

pub struct SubscriptionService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl SubscriptionService {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    async fn plan_for(&self, subscription: &Subscription) -> BillingResult<PaymentPlan> {
        self.store
            .get_plan(subscription.payment_plan_id)
            .await?
            .ok_or_else(|| {
                BillingError::NotFound(format!(
                    "payment plan {} for subscription {}",
                    subscription.payment_plan_id, subscription.id
                ))
            })
    }

    /// Create a subscription covering `periods` plan periods from `start_date`.
    ///
    /// The plan must be active. Multi-period purchases receive the plan's
    /// advance-period discount; the first payment is due on the start date.
    pub async fn create_subscription(
        &self,
        customer_id: Uuid,
        plan_id: Uuid,
        start_date: NaiveDate,
        periods: u32,
    ) -> BillingResult<Subscription> {
        let customer = self
            .store
            .get_customer(customer_id)
            .await?
            .ok_or_else(|| BillingError::NotFound(format!("customer {customer_id}")))?;
        let plan = self
            .store
            .get_plan(plan_id)
            .await?
            .ok_or_else(|| BillingError::NotFound(format!("payment plan {plan_id}")))?;
        if !plan.active {
            return Err(BillingError::InvalidOperation(format!(
                "payment plan {} is not active",
                plan.id
            )));
        }

        let total_periods = plan.period_count.checked_mul(periods).ok_or_else(|| {
            BillingError::InvalidArgument("period count out of range".to_string())
        })?;
        let end_date = calculator::period_end_date(start_date, plan.period_type, total_periods)?;
        let charge = calculator::total_amount(&plan, periods)?;

        let subscription = Subscription {
            id: Uuid::new_v4(),
            customer_id: customer.id,
            payment_plan_id: plan.id,
            start_date,
            end_date,
            status: SubscriptionStatus::Active,
            total_amount: charge.total,
            discount_applied: charge.discount,
            next_payment_date: Some(start_date),
            last_payment_date: None,
            last_reminder_sent: None,
        };
        self.store.save_subscription(&subscription).await?;

        tracing::info!(
            subscription_id = %subscription.id,
            customer_id = %customer.id,
            plan = %plan.name,
            periods = periods,
            total = %charge.total,
            "Created subscription"
        );
        Ok(subscription)
    }

    /// Renew for one plan period starting the day after the current end date.
    ///
    /// Renewal is not an advance purchase: it always charges the full base
    /// amount with zero discount. Cancelled subscriptions cannot be renewed.
    pub async fn renew(&self, id: Uuid) -> BillingResult<Subscription> {
        let mut subscription = self.subscription(id).await?;
        if subscription.status == SubscriptionStatus::Cancelled {
            return Err(BillingError::InvalidOperation(format!(
                "subscription {id} is cancelled and cannot be renewed"
            )));
        }
        let plan = self.plan_for(&subscription).await?;

        let new_start = subscription
            .end_date
            .checked_add_days(Days::new(1))
            .ok_or_else(|| {
                BillingError::InvalidArgument("renewal start date out of range".to_string())
            })?;
        let new_end = calculator::period_end_date(new_start, plan.period_type, plan.period_count)?;
        let charge = calculator::total_amount(&plan, 1)?;

        subscription.start_date = new_start;
        subscription.end_date = new_end;
        subscription.status = SubscriptionStatus::Active;
        subscription.total_amount = charge.total;
        subscription.discount_applied = Decimal::ZERO;
        subscription.next_payment_date = Some(new_start);
        self.store.save_subscription(&subscription).await?;

        tracing::info!(
            subscription_id = %subscription.id,
            start = %new_start,
            end = %new_end,
            "Renewed subscription"
        );
        Ok(subscription)
    }

    /// Cancel unconditionally. Cancelling twice is a no-op returning the
    /// same state.
    pub async fn cancel(&self, id: Uuid) -> BillingResult<Subscription> {
        let mut subscription = self.subscription(id).await?;
        if subscription.status == SubscriptionStatus::Cancelled {
            return Ok(subscription);
        }
        subscription.status = SubscriptionStatus::Cancelled;
        self.store.save_subscription(&subscription).await?;

        tracing::info!(subscription_id = %subscription.id, "Cancelled subscription");
        Ok(subscription)
    }

    /// Record a completed payment against the subscription.
    ///
    /// Sets the last payment date, advances the next payment date by one
    /// plan period from it, and reactivates overdue/pending subscriptions.
    /// Amount reconciliation is the payment service's responsibility.
    pub async fn apply_payment(
        &self,
        mut subscription: Subscription,
        payment_date: NaiveDate,
    ) -> BillingResult<Subscription> {
        let plan = self.plan_for(&subscription).await?;

        subscription.last_payment_date = Some(payment_date);
        subscription.next_payment_date = Some(calculator::period_end_date(
            payment_date,
            plan.period_type,
            plan.period_count,
        )?);
        if matches!(
            subscription.status,
            SubscriptionStatus::Overdue | SubscriptionStatus::Pending
        ) {
            subscription.status = SubscriptionStatus::Active;
        }
        self.store.save_subscription(&subscription).await?;

        tracing::info!(
            subscription_id = %subscription.id,
            next_payment_date = ?subscription.next_payment_date,
            status = %subscription.status,
            "Applied payment to subscription"
        );
        Ok(subscription)
    }

    /// Status setter used by overdue detection. Idempotent.
    pub async fn mark_overdue(&self, mut subscription: Subscription) -> BillingResult<Subscription> {
        if subscription.status == SubscriptionStatus::Overdue {
            return Ok(subscription);
        }
        subscription.status = SubscriptionStatus::Overdue;
        self.store.save_subscription(&subscription).await?;
        tracing::info!(subscription_id = %subscription.id, "Marked subscription overdue");
        Ok(subscription)
    }

    /// Status setter used by auto-expiration. Idempotent.
    pub async fn mark_expired(&self, mut subscription: Subscription) -> BillingResult<Subscription> {
        if subscription.status == SubscriptionStatus::Expired {
            return Ok(subscription);
        }
        subscription.status = SubscriptionStatus::Expired;
        self.store.save_subscription(&subscription).await?;
        tracing::info!(subscription_id = %subscription.id, "Marked subscription expired");
        Ok(subscription)
    }

    pub async fn subscription(&self, id: Uuid) -> BillingResult<Subscription> {
        self.store
            .get_subscription(id)
            .await?
            .ok_or_else(|| BillingError::NotFound(format!("subscription {id}")))
    }

    pub async fn subscriptions_for_customer(
        &self,
        customer_id: Uuid,
    ) -> BillingResult<Vec<Subscription>> {
        self.store.subscriptions_by_customer(customer_id).await
    }

    pub async fn subscriptions_with_status(
        &self,
        status: SubscriptionStatus,
    ) -> BillingResult<Vec<Subscription>> {
        self.store.subscriptions_by_status(status).await
    }

    /// Days the subscription's next payment is past due as of today;
    /// zero when not due or not dated.
    pub fn days_past_due(&self, subscription: &Subscription) -> i64 {
        match subscription.next_payment_date {
            Some(due) => (self.clock.today() - due).num_days().max(0),
            None => 0,
        }
    }
}
