//! Notification dispatch
//!
//! Builds reminder/overdue/expiry/confirmation messages, records a
//! [`Notification`] entity, and delegates transport to a [`ChannelSender`].
//! A notification is saved `Pending` before the send attempt and updated
//! to `Sent` or `Failed` afterwards, so a crash between the two writes
//! leaves a `Pending` record for the retry job to pick up.
//!
//! Sender failures are domain state, not errors: the failure reason is
//! logged and the notification is marked `Failed`.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{BillingError, BillingResult};
use crate::model::{
    Customer, Notification, NotificationChannel, NotificationStatus, NotificationType, Payment,
    PaymentPlan, PaymentStatus, Subscription,
};
use crate::store::Store;

/// Successful handoff to the channel's transport
#[derive(Debug, Clone)]
pub struct SendReceipt {
    /// Provider-side reference, when the transport returns one
    pub provider_ref: Option<String>,
}

/// Why a send attempt did not go through
#[derive(Debug, Clone, Error)]
#[error("send failed: {reason}")]
pub struct SendFailure {
    pub reason: String,
}

impl SendFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Outbound transport boundary. Retry policy is the sender's concern;
/// implementations are expected to bound each call with a timeout so a
/// slow provider cannot hang a notification pass.
#[async_trait]
pub trait ChannelSender: Send + Sync {
    async fn send(
        &self,
        channel: NotificationChannel,
        recipient: &str,
        message: &str,
    ) -> Result<SendReceipt, SendFailure>;
}

pub struct NotificationService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    sender: Arc<dyn ChannelSender>,
}

impl NotificationService {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, sender: Arc<dyn ChannelSender>) -> Self {
        Self {
            store,
            clock,
            sender,
        }
    }

    /// Email when the customer has an address, SMS otherwise.
    fn channel_for(customer: &Customer) -> NotificationChannel {
        if customer.email.is_some() {
            NotificationChannel::Email
        } else {
            NotificationChannel::Sms
        }
    }

    fn recipient_address(
        customer: &Customer,
        channel: NotificationChannel,
    ) -> Result<String, SendFailure> {
        match channel {
            NotificationChannel::Email => customer
                .email
                .clone()
                .ok_or_else(|| SendFailure::new("customer has no email address")),
            NotificationChannel::Sms | NotificationChannel::Push => Ok(customer.phone.clone()),
        }
    }

    pub async fn send_payment_reminder(
        &self,
        customer: &Customer,
        subscription: &Subscription,
        plan: &PaymentPlan,
    ) -> BillingResult<Notification> {
        let due = subscription
            .next_payment_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "soon".to_string());
        let message = format!(
            "Hi {}, your {} payment of {} is due on {}. Please pay on time to keep your subscription active.",
            customer.full_name(),
            plan.name,
            plan.base_amount,
            due,
        );
        self.dispatch(
            customer,
            Some(subscription.id),
            NotificationType::PaymentReminder,
            message,
        )
        .await
    }

    pub async fn send_overdue_notice(
        &self,
        customer: &Customer,
        subscription: &Subscription,
        plan: &PaymentPlan,
        accrued_late_fee: Decimal,
    ) -> BillingResult<Notification> {
        let remaining = self.remaining_amount(subscription).await?;
        let message = format!(
            "Hi {}, your {} subscription is overdue. Outstanding amount: {}. Accrued late fee so far: {}. Please settle your payment.",
            customer.full_name(),
            plan.name,
            remaining,
            accrued_late_fee,
        );
        self.dispatch(
            customer,
            Some(subscription.id),
            NotificationType::OverdueNotice,
            message,
        )
        .await
    }

    pub async fn send_expiry_notice(
        &self,
        customer: &Customer,
        subscription: &Subscription,
        plan: &PaymentPlan,
    ) -> BillingResult<Notification> {
        let message = format!(
            "Hi {}, your {} subscription has expired due to non-payment. Contact us to start a new subscription.",
            customer.full_name(),
            plan.name,
        );
        self.dispatch(
            customer,
            Some(subscription.id),
            NotificationType::SubscriptionExpired,
            message,
        )
        .await
    }

    pub async fn send_payment_confirmation(
        &self,
        customer: &Customer,
        subscription: &Subscription,
        payment: &Payment,
    ) -> BillingResult<Notification> {
        let message = if payment.late_fee > Decimal::ZERO {
            format!(
                "Hi {}, we received your payment of {} (late fee: {}). Reference: {}. Thank you!",
                customer.full_name(),
                payment.amount,
                payment.late_fee,
                payment.transaction_id,
            )
        } else {
            format!(
                "Hi {}, we received your payment of {}. Reference: {}. Thank you!",
                customer.full_name(),
                payment.amount,
                payment.transaction_id,
            )
        };
        self.dispatch(
            customer,
            Some(subscription.id),
            NotificationType::PaymentConfirmation,
            message,
        )
        .await
    }

    /// Record a `Pending` notification, then attempt delivery.
    async fn dispatch(
        &self,
        customer: &Customer,
        subscription_id: Option<Uuid>,
        notification_type: NotificationType,
        message: String,
    ) -> BillingResult<Notification> {
        let notification = Notification {
            id: Uuid::new_v4(),
            customer_id: customer.id,
            subscription_id,
            notification_type,
            channel: Self::channel_for(customer),
            message,
            status: NotificationStatus::Pending,
            sent_at: None,
            created_at: self.clock.now(),
        };
        self.store.save_notification(&notification).await?;
        self.deliver(notification).await
    }

    /// Push a recorded notification through the sender and persist the
    /// outcome. Also used by the pending-notification retry job.
    pub async fn deliver(&self, mut notification: Notification) -> BillingResult<Notification> {
        let customer = self
            .store
            .get_customer(notification.customer_id)
            .await?
            .ok_or_else(|| {
                BillingError::NotFound(format!("customer {}", notification.customer_id))
            })?;

        let attempt = match Self::recipient_address(&customer, notification.channel) {
            Ok(recipient) => {
                self.sender
                    .send(notification.channel, &recipient, &notification.message)
                    .await
            }
            Err(failure) => Err(failure),
        };

        match attempt {
            Ok(receipt) => {
                notification.status = NotificationStatus::Sent;
                notification.sent_at = Some(self.clock.now());
                tracing::info!(
                    notification_id = %notification.id,
                    customer_id = %customer.id,
                    channel = notification.channel.as_str(),
                    provider_ref = ?receipt.provider_ref,
                    "Notification sent"
                );
            }
            Err(failure) => {
                notification.status = NotificationStatus::Failed;
                tracing::warn!(
                    notification_id = %notification.id,
                    customer_id = %customer.id,
                    channel = notification.channel.as_str(),
                    reason = %failure.reason,
                    "Notification send failed"
                );
            }
        }
        self.store.save_notification(&notification).await?;
        Ok(notification)
    }

    /// Plan total minus the subscription's completed payments.
    ///
    /// Late fees that have not been persisted on a payment yet are not
    /// part of the outstanding amount; they are quoted separately.
    pub async fn remaining_amount(&self, subscription: &Subscription) -> BillingResult<Decimal> {
        let paid: Decimal = self
            .store
            .payments_by_subscription(subscription.id)
            .await?
            .iter()
            .filter(|p| p.status == PaymentStatus::Completed)
            .map(|p| p.amount)
            .sum();
        Ok((subscription.total_amount - paid).max(Decimal::ZERO))
    }

    pub async fn notifications_for_customer(
        &self,
        customer_id: Uuid,
    ) -> BillingResult<Vec<Notification>> {
        self.store.notifications_by_customer(customer_id).await
    }

    pub async fn pending(&self) -> BillingResult<Vec<Notification>> {
        self.store
            .notifications_by_status(NotificationStatus::Pending)
            .await
    }
}
