//! Payment service
//!
//! Records direct payments, runs the two-phase gateway flow
//! (initiate/verify), computes late fees at payment time, and triggers the
//! subscription lifecycle update. Verification of an already-resolved
//! transaction returns the prior outcome without re-applying side effects.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::calculator;
use crate::clock::Clock;
use crate::error::{BillingError, BillingResult};
use crate::lifecycle::SubscriptionService;
use crate::model::{
    Payment, PaymentMethod, PaymentStatus, Subscription, SubscriptionStatus,
};
use crate::notifications::{ChannelSender, NotificationService};
use crate::store::Store;

/// A pending gateway payment plus the redirect target for the payer
#[derive(Debug, Clone)]
pub struct PaymentInitiation {
    pub payment: Payment,
    pub redirect_url: String,
}

/// Preview of what a customer currently owes on one subscription.
/// The late fee here is computed on the fly and never persisted.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PendingPayment {
    pub subscription_id: Uuid,
    pub plan_name: String,
    pub due_date: Option<NaiveDate>,
    pub amount_due: Decimal,
    pub late_fee: Decimal,
}

pub struct PaymentService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    subscriptions: SubscriptionService,
    notifications: NotificationService,
    link_base_url: String,
}

impl PaymentService {
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        sender: Arc<dyn ChannelSender>,
        link_base_url: String,
    ) -> Self {
        let subscriptions = SubscriptionService::new(store.clone(), clock.clone());
        let notifications = NotificationService::new(store.clone(), clock.clone(), sender);
        Self {
            store,
            clock,
            subscriptions,
            notifications,
            link_base_url,
        }
    }

    fn new_transaction_id() -> String {
        format!("TXN-{}", Uuid::new_v4().simple())
    }

    async fn payable_subscription(&self, id: Uuid) -> BillingResult<Subscription> {
        let subscription = self.subscriptions.subscription(id).await?;
        if subscription.status == SubscriptionStatus::Cancelled {
            return Err(BillingError::InvalidPayment(format!(
                "subscription {id} is cancelled"
            )));
        }
        Ok(subscription)
    }

    /// Late fee owed if the subscription were paid today. Zero when the
    /// next payment is not yet due.
    async fn late_fee_as_of_today(&self, subscription: &Subscription) -> BillingResult<Decimal> {
        let Some(due) = subscription.next_payment_date else {
            return Ok(Decimal::ZERO);
        };
        let days_late = (self.clock.today() - due).num_days();
        if days_late <= 0 {
            return Ok(Decimal::ZERO);
        }
        let plan = self
            .store
            .get_plan(subscription.payment_plan_id)
            .await?
            .ok_or_else(|| {
                BillingError::NotFound(format!("payment plan {}", subscription.payment_plan_id))
            })?;
        Ok(calculator::late_fee(&plan, days_late))
    }

    async fn confirm_to_customer(&self, subscription: &Subscription, payment: &Payment) {
        let customer = match self.store.get_customer(subscription.customer_id).await {
            Ok(Some(customer)) => customer,
            Ok(None) => {
                tracing::warn!(
                    customer_id = %subscription.customer_id,
                    "Customer missing, skipping payment confirmation"
                );
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not load customer for payment confirmation");
                return;
            }
        };
        if let Err(e) = self
            .notifications
            .send_payment_confirmation(&customer, subscription, payment)
            .await
        {
            tracing::warn!(
                payment_id = %payment.id,
                error = %e,
                "Could not record payment confirmation notification"
            );
        }
    }

    /// Record a completed payment directly (cash, transfer, card-on-file).
    ///
    /// The late fee owed as of today is persisted on the payment record;
    /// it is not folded into `amount`.
    pub async fn process_payment(
        &self,
        subscription_id: Uuid,
        amount: Decimal,
        method: PaymentMethod,
        notes: Option<&str>,
    ) -> BillingResult<Payment> {
        if amount <= Decimal::ZERO {
            return Err(BillingError::InvalidArgument(
                "payment amount must be positive".to_string(),
            ));
        }
        let subscription = self.payable_subscription(subscription_id).await?;
        let today = self.clock.today();
        let late_fee = self.late_fee_as_of_today(&subscription).await?;

        let payment = Payment {
            id: Uuid::new_v4(),
            subscription_id,
            amount,
            payment_date: Some(today),
            due_date: subscription.next_payment_date.unwrap_or(today),
            status: PaymentStatus::Completed,
            payment_method: method,
            transaction_id: Self::new_transaction_id(),
            late_fee,
            notes: notes.map(str::to_string),
        };
        self.store.save_payment(&payment).await?;

        let subscription = self.subscriptions.apply_payment(subscription, today).await?;
        tracing::info!(
            payment_id = %payment.id,
            subscription_id = %subscription_id,
            amount = %amount,
            late_fee = %late_fee,
            method = method.as_str(),
            "Recorded payment"
        );

        self.confirm_to_customer(&subscription, &payment).await;
        Ok(payment)
    }

    /// First phase of the gateway flow: create a `Pending` payment with a
    /// unique transaction id and hand back the redirect target.
    pub async fn initiate_payment(
        &self,
        subscription_id: Uuid,
        amount: Decimal,
    ) -> BillingResult<PaymentInitiation> {
        if amount <= Decimal::ZERO {
            return Err(BillingError::InvalidArgument(
                "payment amount must be positive".to_string(),
            ));
        }
        let subscription = self.payable_subscription(subscription_id).await?;
        let today = self.clock.today();

        let payment = Payment {
            id: Uuid::new_v4(),
            subscription_id,
            amount,
            payment_date: None,
            due_date: subscription.next_payment_date.unwrap_or(today),
            status: PaymentStatus::Pending,
            payment_method: PaymentMethod::Gateway,
            transaction_id: Self::new_transaction_id(),
            late_fee: Decimal::ZERO,
            notes: None,
        };
        self.store.save_payment(&payment).await?;

        let redirect_url = self.generate_payment_link(&payment);
        tracing::info!(
            payment_id = %payment.id,
            subscription_id = %subscription_id,
            transaction_id = %payment.transaction_id,
            "Initiated gateway payment"
        );
        Ok(PaymentInitiation {
            payment,
            redirect_url,
        })
    }

    /// Second phase of the gateway flow: resolve a pending payment.
    ///
    /// Idempotent: a transaction that is already `Completed` or `Failed`
    /// is returned as-is, with no side effects re-applied.
    pub async fn verify_payment(
        &self,
        transaction_id: &str,
        success: bool,
    ) -> BillingResult<Payment> {
        let mut payment = self
            .store
            .payment_by_transaction_id(transaction_id)
            .await?
            .ok_or_else(|| BillingError::NotFound(format!("transaction {transaction_id}")))?;

        if payment.status.is_resolved() {
            tracing::info!(
                transaction_id = %transaction_id,
                status = %payment.status,
                "Verification of already-resolved payment, returning prior outcome"
            );
            return Ok(payment);
        }

        if !success {
            payment.status = PaymentStatus::Failed;
            self.store.save_payment(&payment).await?;
            tracing::info!(
                transaction_id = %transaction_id,
                "Gateway payment failed verification"
            );
            return Ok(payment);
        }

        let subscription = self.payable_subscription(payment.subscription_id).await?;
        let today = self.clock.today();
        payment.status = PaymentStatus::Completed;
        payment.payment_date = Some(today);
        payment.late_fee = self.late_fee_as_of_today(&subscription).await?;
        self.store.save_payment(&payment).await?;

        let subscription = self.subscriptions.apply_payment(subscription, today).await?;
        tracing::info!(
            transaction_id = %transaction_id,
            subscription_id = %subscription.id,
            "Gateway payment verified"
        );

        self.confirm_to_customer(&subscription, &payment).await;
        Ok(payment)
    }

    pub fn generate_payment_link(&self, payment: &Payment) -> String {
        format!(
            "{}/pay/{}",
            self.link_base_url.trim_end_matches('/'),
            payment.transaction_id
        )
    }

    /// What each of the customer's active/overdue subscriptions owes right
    /// now, with the current late fee computed on the fly.
    pub async fn pending_payments(&self, customer_id: Uuid) -> BillingResult<Vec<PendingPayment>> {
        let subscriptions = self.store.subscriptions_by_customer(customer_id).await?;
        let mut pending = Vec::new();
        for subscription in subscriptions {
            if !matches!(
                subscription.status,
                SubscriptionStatus::Active | SubscriptionStatus::Overdue
            ) {
                continue;
            }
            let plan = self
                .store
                .get_plan(subscription.payment_plan_id)
                .await?
                .ok_or_else(|| {
                    BillingError::NotFound(format!(
                        "payment plan {}",
                        subscription.payment_plan_id
                    ))
                })?;
            let late_fee = self.late_fee_as_of_today(&subscription).await?;
            let amount_due = self.notifications.remaining_amount(&subscription).await?;
            pending.push(PendingPayment {
                subscription_id: subscription.id,
                plan_name: plan.name,
                due_date: subscription.next_payment_date,
                amount_due,
                late_fee,
            });
        }
        Ok(pending)
    }

    pub async fn payment_history(&self, subscription_id: Uuid) -> BillingResult<Vec<Payment>> {
        self.store.payments_by_subscription(subscription_id).await
    }

    pub async fn payments_for_customer(&self, customer_id: Uuid) -> BillingResult<Vec<Payment>> {
        let subscriptions = self.store.subscriptions_by_customer(customer_id).await?;
        let mut payments = Vec::new();
        for subscription in subscriptions {
            payments.extend(self.store.payments_by_subscription(subscription.id).await?);
        }
        payments.sort_by_key(|p| p.due_date);
        Ok(payments)
    }

    pub async fn payments_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> BillingResult<Vec<Payment>> {
        self.store.payments_between(from, to).await
    }
}
