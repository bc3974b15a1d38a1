// Test file - these are expected patterns in test code
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

//! Edge Case Tests for the Billing Core
//!
//! Tests critical boundary conditions and idempotency guarantees in:
//! - Subscription lifecycle transitions
//! - Payment recording and gateway verification
//! - Scheduled jobs (overdue detection, auto-expiration, reminders,
//!   pending-notification retry)

#[cfg(test)]
mod accounts_tests {
    use rust_decimal_macros::dec;

    use crate::error::BillingError;
    use crate::model::PeriodType;
    use crate::testing::{date, fixture};
    use crate::NewPlan;

    fn quarterly_plan() -> NewPlan {
        NewPlan {
            name: "Quarterly Membership".to_string(),
            period_type: PeriodType::Quarterly,
            period_count: 1,
            base_amount: dec!(1400000),
            discount_percentage: dec!(5),
            late_fee_per_day: dec!(10000),
            grace_period_days: 3,
        }
    }

    // =========================================================================
    // A deactivated business accepts no new customers or plans
    // =========================================================================
    #[tokio::test]
    async fn deactivated_business_rejects_new_customers_and_plans() {
        let fx = fixture(date(2025, 1, 1)).await;
        fx.service
            .accounts
            .deactivate_business(fx.business.id)
            .await
            .unwrap();

        let customer = fx
            .service
            .accounts
            .register_customer(fx.business.id, "Bola", "Eze", "+2348098765432", None, None)
            .await;
        assert!(matches!(customer, Err(BillingError::InvalidOperation(_))));

        let plan = fx
            .service
            .accounts
            .create_plan(fx.business.id, quarterly_plan())
            .await;
        assert!(matches!(plan, Err(BillingError::InvalidOperation(_))));

        // Existing records stay in place
        let customers = fx.service.accounts.customers(fx.business.id).await.unwrap();
        assert_eq!(customers.len(), 1);
    }

    // =========================================================================
    // Plan parameters are validated on creation
    // =========================================================================
    #[tokio::test]
    async fn create_plan_validates_bounds() {
        let fx = fixture(date(2025, 1, 1)).await;

        let mut zero_periods = quarterly_plan();
        zero_periods.period_count = 0;
        let result = fx.service.accounts.create_plan(fx.business.id, zero_periods).await;
        assert!(matches!(result, Err(BillingError::InvalidArgument(_))));

        let mut bad_discount = quarterly_plan();
        bad_discount.discount_percentage = dec!(120);
        let result = fx.service.accounts.create_plan(fx.business.id, bad_discount).await;
        assert!(matches!(result, Err(BillingError::InvalidArgument(_))));

        let mut negative_fee = quarterly_plan();
        negative_fee.late_fee_per_day = dec!(-1);
        let result = fx.service.accounts.create_plan(fx.business.id, negative_fee).await;
        assert!(matches!(result, Err(BillingError::InvalidArgument(_))));
    }
}

#[cfg(test)]
mod lifecycle_tests {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use crate::error::BillingError;
    use crate::model::SubscriptionStatus;
    use crate::testing::{date, fixture};

    // =========================================================================
    // Creation computes period end, total, discount, and first due date
    // =========================================================================
    #[tokio::test]
    async fn create_three_periods_with_advance_discount() {
        let fx = fixture(date(2025, 1, 1)).await;
        let sub = fx
            .service
            .subscriptions
            .create_subscription(fx.customer.id, fx.plan.id, date(2025, 1, 1), 3)
            .await
            .unwrap();

        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.end_date, date(2025, 4, 1));
        assert_eq!(sub.total_amount, dec!(1350000.00));
        assert_eq!(sub.discount_applied, dec!(150000.00));
        assert_eq!(sub.next_payment_date, Some(date(2025, 1, 1)));
        assert_eq!(sub.last_payment_date, None);
    }

    #[tokio::test]
    async fn create_rejects_inactive_plan() {
        let fx = fixture(date(2025, 1, 1)).await;
        fx.service.accounts.deactivate_plan(fx.plan.id).await.unwrap();

        let result = fx
            .service
            .subscriptions
            .create_subscription(fx.customer.id, fx.plan.id, date(2025, 1, 1), 1)
            .await;
        assert!(matches!(result, Err(BillingError::InvalidOperation(_))));
    }

    #[tokio::test]
    async fn create_rejects_unknown_customer() {
        let fx = fixture(date(2025, 1, 1)).await;
        let result = fx
            .service
            .subscriptions
            .create_subscription(Uuid::new_v4(), fx.plan.id, date(2025, 1, 1), 1)
            .await;
        assert!(matches!(result, Err(BillingError::NotFound(_))));
    }

    // =========================================================================
    // Renewal starts the day after the old end and never discounts
    // =========================================================================
    #[tokio::test]
    async fn renew_charges_full_base_amount() {
        let fx = fixture(date(2025, 1, 1)).await;
        let sub = fx
            .service
            .subscriptions
            .create_subscription(fx.customer.id, fx.plan.id, date(2025, 1, 1), 1)
            .await
            .unwrap();
        assert_eq!(sub.end_date, date(2025, 2, 1));

        let renewed = fx.service.subscriptions.renew(sub.id).await.unwrap();
        assert_eq!(renewed.start_date, date(2025, 2, 2));
        assert_eq!(renewed.end_date, date(2025, 3, 2));
        assert_eq!(renewed.status, SubscriptionStatus::Active);
        assert_eq!(renewed.total_amount, dec!(500000.00));
        assert_eq!(renewed.discount_applied, Decimal::ZERO);
        assert_eq!(renewed.next_payment_date, Some(date(2025, 2, 2)));
    }

    #[tokio::test]
    async fn renew_cancelled_is_rejected() {
        let fx = fixture(date(2025, 1, 1)).await;
        let sub = fx
            .service
            .subscriptions
            .create_subscription(fx.customer.id, fx.plan.id, date(2025, 1, 1), 1)
            .await
            .unwrap();
        fx.service.subscriptions.cancel(sub.id).await.unwrap();

        let result = fx.service.subscriptions.renew(sub.id).await;
        assert!(matches!(result, Err(BillingError::InvalidOperation(_))));
    }

    // =========================================================================
    // Cancel is idempotent; second call is a no-op with no error
    // =========================================================================
    #[tokio::test]
    async fn cancel_twice_is_a_noop() {
        let fx = fixture(date(2025, 1, 1)).await;
        let sub = fx
            .service
            .subscriptions
            .create_subscription(fx.customer.id, fx.plan.id, date(2025, 1, 1), 1)
            .await
            .unwrap();

        let first = fx.service.subscriptions.cancel(sub.id).await.unwrap();
        let second = fx.service.subscriptions.cancel(sub.id).await.unwrap();
        assert_eq!(first.status, SubscriptionStatus::Cancelled);
        assert_eq!(second.status, SubscriptionStatus::Cancelled);
    }

    // =========================================================================
    // Status setters are idempotent
    // =========================================================================
    #[tokio::test]
    async fn mark_overdue_and_expired_twice_converge() {
        let fx = fixture(date(2025, 1, 1)).await;
        let sub = fx
            .service
            .subscriptions
            .create_subscription(fx.customer.id, fx.plan.id, date(2025, 1, 1), 1)
            .await
            .unwrap();

        let once = fx.service.subscriptions.mark_overdue(sub).await.unwrap();
        let twice = fx.service.subscriptions.mark_overdue(once.clone()).await.unwrap();
        assert_eq!(once.status, twice.status);

        let once = fx.service.subscriptions.mark_expired(twice).await.unwrap();
        let twice = fx.service.subscriptions.mark_expired(once.clone()).await.unwrap();
        assert_eq!(once.status, SubscriptionStatus::Expired);
        assert_eq!(twice.status, SubscriptionStatus::Expired);
    }
}

#[cfg(test)]
mod payment_tests {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use crate::error::BillingError;
    use crate::model::{
        NotificationChannel, NotificationStatus, NotificationType, PaymentMethod, PaymentStatus,
        SubscriptionStatus,
    };
    use crate::testing::{date, fixture};

    // =========================================================================
    // Direct payment advances the schedule and confirms to the customer
    // =========================================================================
    #[tokio::test]
    async fn process_payment_on_time() {
        let fx = fixture(date(2025, 1, 1)).await;
        let sub = fx
            .service
            .subscriptions
            .create_subscription(fx.customer.id, fx.plan.id, date(2025, 1, 1), 1)
            .await
            .unwrap();

        let payment = fx
            .service
            .payments
            .process_payment(sub.id, dec!(500000), PaymentMethod::Cash, None)
            .await
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Completed);
        assert_eq!(payment.late_fee, Decimal::ZERO);
        assert_eq!(payment.payment_date, Some(date(2025, 1, 1)));

        let sub = fx.service.subscriptions.subscription(sub.id).await.unwrap();
        assert_eq!(sub.last_payment_date, Some(date(2025, 1, 1)));
        assert_eq!(sub.next_payment_date, Some(date(2025, 2, 1)));

        let notifications = fx
            .service
            .notifications
            .notifications_for_customer(fx.customer.id)
            .await
            .unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(
            notifications[0].notification_type,
            NotificationType::PaymentConfirmation
        );
        assert_eq!(notifications[0].status, NotificationStatus::Sent);
        assert_eq!(fx.sender.sent_count(), 1);
    }

    // =========================================================================
    // Nine days late with 3 grace days at 10_000/day -> 60_000 late fee,
    // recorded on the payment, never added to the amount
    // =========================================================================
    #[tokio::test]
    async fn process_payment_late_records_fee() {
        let fx = fixture(date(2025, 1, 1)).await;
        let sub = fx
            .service
            .subscriptions
            .create_subscription(fx.customer.id, fx.plan.id, date(2025, 1, 1), 1)
            .await
            .unwrap();

        fx.clock.set_date(date(2025, 1, 10));
        let payment = fx
            .service
            .payments
            .process_payment(sub.id, dec!(500000), PaymentMethod::BankTransfer, Some("late"))
            .await
            .unwrap();
        assert_eq!(payment.late_fee, dec!(60000.00));
        assert_eq!(payment.amount, dec!(500000));

        let sub = fx.service.subscriptions.subscription(sub.id).await.unwrap();
        assert_eq!(sub.next_payment_date, Some(date(2025, 2, 10)));
    }

    #[tokio::test]
    async fn zero_grace_plan_accrues_from_first_late_day() {
        let fx = crate::testing::fixture_with_plan(date(2025, 1, 1), |p| {
            p.grace_period_days = 0;
            p.late_fee_per_day = dec!(500);
        })
        .await;
        let sub = fx
            .service
            .subscriptions
            .create_subscription(fx.customer.id, fx.plan.id, date(2025, 1, 1), 1)
            .await
            .unwrap();

        fx.clock.set_date(date(2025, 1, 3));
        let payment = fx
            .service
            .payments
            .process_payment(sub.id, dec!(500000), PaymentMethod::Card, None)
            .await
            .unwrap();
        assert_eq!(payment.late_fee, dec!(1000.00));
    }

    // =========================================================================
    // Customers without an email address are reached over SMS
    // =========================================================================
    #[tokio::test]
    async fn confirmation_falls_back_to_sms_without_email() {
        let fx = fixture(date(2025, 1, 1)).await;
        let customer = fx
            .service
            .accounts
            .register_customer(fx.business.id, "Bola", "Eze", "+2348098765432", None, None)
            .await
            .unwrap();
        let sub = fx
            .service
            .subscriptions
            .create_subscription(customer.id, fx.plan.id, date(2025, 1, 1), 1)
            .await
            .unwrap();

        fx.service
            .payments
            .process_payment(sub.id, dec!(500000), PaymentMethod::Cash, None)
            .await
            .unwrap();

        let messages = fx.sender.sent_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, NotificationChannel::Sms);
        assert_eq!(messages[0].1, "+2348098765432");
    }

    #[tokio::test]
    async fn paying_a_cancelled_subscription_is_rejected() {
        let fx = fixture(date(2025, 1, 1)).await;
        let sub = fx
            .service
            .subscriptions
            .create_subscription(fx.customer.id, fx.plan.id, date(2025, 1, 1), 1)
            .await
            .unwrap();
        fx.service.subscriptions.cancel(sub.id).await.unwrap();

        let result = fx
            .service
            .payments
            .process_payment(sub.id, dec!(500000), PaymentMethod::Cash, None)
            .await;
        assert!(matches!(result, Err(BillingError::InvalidPayment(_))));
    }

    // =========================================================================
    // Gateway flow: initiate creates a pending payment with a link
    // =========================================================================
    #[tokio::test]
    async fn initiate_creates_pending_payment_with_link() {
        let fx = fixture(date(2025, 1, 1)).await;
        let sub = fx
            .service
            .subscriptions
            .create_subscription(fx.customer.id, fx.plan.id, date(2025, 1, 1), 1)
            .await
            .unwrap();

        let initiation = fx
            .service
            .payments
            .initiate_payment(sub.id, dec!(500000))
            .await
            .unwrap();
        assert_eq!(initiation.payment.status, PaymentStatus::Pending);
        assert_eq!(initiation.payment.payment_date, None);
        assert!(initiation
            .redirect_url
            .ends_with(&initiation.payment.transaction_id));

        // No lifecycle side effects until verification
        let sub = fx.service.subscriptions.subscription(sub.id).await.unwrap();
        assert_eq!(sub.last_payment_date, None);
    }

    // =========================================================================
    // Verification is idempotent: the second call returns the prior
    // outcome and applies no further side effects
    // =========================================================================
    #[tokio::test]
    async fn verify_twice_applies_side_effects_once() {
        let fx = fixture(date(2025, 1, 1)).await;
        let sub = fx
            .service
            .subscriptions
            .create_subscription(fx.customer.id, fx.plan.id, date(2025, 1, 1), 1)
            .await
            .unwrap();
        let initiation = fx
            .service
            .payments
            .initiate_payment(sub.id, dec!(500000))
            .await
            .unwrap();
        let txn = initiation.payment.transaction_id.clone();

        let first = fx.service.payments.verify_payment(&txn, true).await.unwrap();
        assert_eq!(first.status, PaymentStatus::Completed);
        let after_first = fx.service.subscriptions.subscription(sub.id).await.unwrap();
        assert_eq!(after_first.next_payment_date, Some(date(2025, 2, 1)));

        let second = fx.service.payments.verify_payment(&txn, true).await.unwrap();
        assert_eq!(second.status, PaymentStatus::Completed);
        assert_eq!(second.payment_date, first.payment_date);

        let after_second = fx.service.subscriptions.subscription(sub.id).await.unwrap();
        assert_eq!(
            after_second.next_payment_date,
            after_first.next_payment_date
        );
        // Exactly one confirmation was dispatched
        let confirmations = fx
            .service
            .notifications
            .notifications_for_customer(fx.customer.id)
            .await
            .unwrap()
            .into_iter()
            .filter(|n| n.notification_type == NotificationType::PaymentConfirmation)
            .count();
        assert_eq!(confirmations, 1);
    }

    #[tokio::test]
    async fn failed_verification_is_final() {
        let fx = fixture(date(2025, 1, 1)).await;
        let sub = fx
            .service
            .subscriptions
            .create_subscription(fx.customer.id, fx.plan.id, date(2025, 1, 1), 1)
            .await
            .unwrap();
        let initiation = fx
            .service
            .payments
            .initiate_payment(sub.id, dec!(500000))
            .await
            .unwrap();
        let txn = initiation.payment.transaction_id.clone();

        let failed = fx.service.payments.verify_payment(&txn, false).await.unwrap();
        assert_eq!(failed.status, PaymentStatus::Failed);

        // A later "success" callback for the same transaction changes nothing
        let replay = fx.service.payments.verify_payment(&txn, true).await.unwrap();
        assert_eq!(replay.status, PaymentStatus::Failed);

        let sub = fx.service.subscriptions.subscription(sub.id).await.unwrap();
        assert_eq!(sub.last_payment_date, None);
        assert_eq!(sub.status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn verify_unknown_transaction_is_not_found() {
        let fx = fixture(date(2025, 1, 1)).await;
        let result = fx.service.payments.verify_payment("TXN-missing", true).await;
        assert!(matches!(result, Err(BillingError::NotFound(_))));
    }

    // =========================================================================
    // Pending-payment previews compute the late fee without persisting it
    // =========================================================================
    #[tokio::test]
    async fn pending_payments_preview_late_fee() {
        let fx = fixture(date(2025, 1, 1)).await;
        let sub = fx
            .service
            .subscriptions
            .create_subscription(fx.customer.id, fx.plan.id, date(2025, 1, 1), 1)
            .await
            .unwrap();

        fx.clock.set_date(date(2025, 1, 10));
        let pending = fx
            .service
            .payments
            .pending_payments(fx.customer.id)
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].subscription_id, sub.id);
        assert_eq!(pending[0].late_fee, dec!(60000.00));
        assert_eq!(pending[0].amount_due, dec!(500000.00));

        // Preview only: nothing was written
        let history = fx.service.payments.payment_history(sub.id).await.unwrap();
        assert!(history.is_empty());
    }
}

#[cfg(test)]
mod job_tests {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use crate::model::{
        Notification, NotificationChannel, NotificationStatus, NotificationType, PaymentStatus,
        Subscription, SubscriptionStatus,
    };
    use crate::store::Store;
    use crate::testing::{date, fixture};

    // =========================================================================
    // Overdue detection marks past-due active subscriptions; re-running
    // the pass finds nothing left to mark
    // =========================================================================
    #[tokio::test]
    async fn overdue_detection_marks_and_notifies_once() {
        let fx = fixture(date(2024, 12, 20)).await;
        let sub = fx
            .service
            .subscriptions
            .create_subscription(fx.customer.id, fx.plan.id, date(2024, 12, 20), 1)
            .await
            .unwrap();

        fx.clock.set_date(date(2025, 1, 10));
        let summary = fx.service.jobs.run_overdue_detection().await.unwrap();
        assert_eq!(summary.marked_overdue, 1);
        assert_eq!(summary.notices_sent, 1);

        let sub = fx.service.subscriptions.subscription(sub.id).await.unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Overdue);

        let rerun = fx.service.jobs.run_overdue_detection().await.unwrap();
        assert_eq!(rerun.marked_overdue, 0);
        assert_eq!(rerun.notices_sent, 0);

        let notices = fx
            .service
            .notifications
            .notifications_for_customer(fx.customer.id)
            .await
            .unwrap()
            .into_iter()
            .filter(|n| n.notification_type == NotificationType::OverdueNotice)
            .count();
        assert_eq!(notices, 1);
    }

    #[tokio::test]
    async fn overdue_detection_skips_future_due_dates() {
        let fx = fixture(date(2025, 1, 1)).await;
        fx.service
            .subscriptions
            .create_subscription(fx.customer.id, fx.plan.id, date(2025, 1, 1), 1)
            .await
            .unwrap();

        let summary = fx.service.jobs.run_overdue_detection().await.unwrap();
        assert_eq!(summary.examined, 1);
        assert_eq!(summary.marked_overdue, 0);
    }

    // =========================================================================
    // Auto-expiration: >30 days past due expires the subscription and
    // deactivates a customer left with no active subscription
    // =========================================================================
    #[tokio::test]
    async fn expiration_after_grace_deactivates_lone_customer() {
        let fx = fixture(date(2024, 12, 20)).await;
        let sub = fx
            .service
            .subscriptions
            .create_subscription(fx.customer.id, fx.plan.id, date(2024, 12, 20), 1)
            .await
            .unwrap();

        fx.clock.set_date(date(2025, 1, 10));
        fx.service.jobs.run_overdue_detection().await.unwrap();

        // Exactly 30 days past due: still inside the expiration threshold
        fx.clock.set_date(date(2025, 1, 19));
        let summary = fx.service.jobs.run_auto_expiration().await.unwrap();
        assert_eq!(summary.expired, 0);

        // 31 days past due: expired, and the lone customer is deactivated
        fx.clock.set_date(date(2025, 1, 20));
        let summary = fx.service.jobs.run_auto_expiration().await.unwrap();
        assert_eq!(summary.expired, 1);
        assert_eq!(summary.customers_deactivated, 1);

        let sub = fx.service.subscriptions.subscription(sub.id).await.unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Expired);
        let customer = fx.store.get_customer(fx.customer.id).await.unwrap().unwrap();
        assert!(!customer.active);

        // Re-running converges on the same state
        let rerun = fx.service.jobs.run_auto_expiration().await.unwrap();
        assert_eq!(rerun.examined, 0);
        assert_eq!(rerun.expired, 0);
    }

    #[tokio::test]
    async fn expiration_keeps_customer_with_other_active_subscription() {
        let fx = fixture(date(2024, 12, 20)).await;
        fx.service
            .subscriptions
            .create_subscription(fx.customer.id, fx.plan.id, date(2024, 12, 20), 1)
            .await
            .unwrap();
        // Second subscription that stays current
        fx.service
            .subscriptions
            .create_subscription(fx.customer.id, fx.plan.id, date(2025, 1, 25), 1)
            .await
            .unwrap();

        fx.clock.set_date(date(2025, 1, 10));
        fx.service.jobs.run_overdue_detection().await.unwrap();
        fx.clock.set_date(date(2025, 1, 20));
        let summary = fx.service.jobs.run_auto_expiration().await.unwrap();
        assert_eq!(summary.expired, 1);
        assert_eq!(summary.customers_deactivated, 0);

        let customer = fx.store.get_customer(fx.customer.id).await.unwrap().unwrap();
        assert!(customer.active);
    }

    // =========================================================================
    // Payment reminders: at most one per subscription per day, however
    // many times the job runs
    // =========================================================================
    #[tokio::test]
    async fn reminders_sent_at_most_once_per_day() {
        let fx = fixture(date(2025, 1, 1)).await;
        let sub = fx
            .service
            .subscriptions
            .create_subscription(fx.customer.id, fx.plan.id, date(2025, 1, 3), 1)
            .await
            .unwrap();

        let first = fx.service.jobs.run_payment_reminders().await.unwrap();
        assert_eq!(first.sent, 1);
        assert_eq!(first.suppressed, 0);
        let sub = fx.service.subscriptions.subscription(sub.id).await.unwrap();
        assert!(sub.last_reminder_sent.is_some());

        // Same day, jittered re-run: suppressed by the recorded reminder
        let second = fx.service.jobs.run_payment_reminders().await.unwrap();
        assert_eq!(second.sent, 0);
        assert_eq!(second.suppressed, 1);
        assert_eq!(fx.sender.sent_count(), 1);

        // Next day: a fresh reminder goes out
        fx.clock.advance_days(1);
        let third = fx.service.jobs.run_payment_reminders().await.unwrap();
        assert_eq!(third.sent, 1);
        assert_eq!(fx.sender.sent_count(), 2);

        let messages = fx.sender.sent_messages();
        assert!(messages
            .iter()
            .all(|(channel, recipient, message)| *channel == NotificationChannel::Email
                && recipient == "ade@example.test"
                && message.contains("Monthly Membership")));
    }

    #[tokio::test]
    async fn reminders_respect_the_due_window() {
        let fx = fixture(date(2025, 1, 1)).await;
        // Due in 4 days: outside the reminder window
        fx.service
            .subscriptions
            .create_subscription(fx.customer.id, fx.plan.id, date(2025, 1, 5), 1)
            .await
            .unwrap();

        let summary = fx.service.jobs.run_payment_reminders().await.unwrap();
        assert_eq!(summary.examined, 1);
        assert_eq!(summary.sent, 0);
    }

    // =========================================================================
    // Pending-notification processing: failures become Failed state and
    // never stop the pass
    // =========================================================================
    #[tokio::test]
    async fn pending_pass_delivers_and_stamps_sent_at() {
        let fx = fixture(date(2025, 1, 1)).await;
        for _ in 0..2 {
            let notification = pending_notification(fx.customer.id);
            fx.store.save_notification(&notification).await.unwrap();
        }

        let summary = fx.service.jobs.run_pending_notifications().await.unwrap();
        assert_eq!(summary.examined, 2);
        assert_eq!(summary.sent, 2);
        assert_eq!(summary.failed_sends, 0);

        let sent = fx
            .service
            .notifications
            .notifications_for_customer(fx.customer.id)
            .await
            .unwrap();
        assert!(sent
            .iter()
            .all(|n| n.status == NotificationStatus::Sent && n.sent_at.is_some()));
    }

    #[tokio::test]
    async fn pending_pass_survives_sender_failure() {
        let fx = fixture(date(2025, 1, 1)).await;
        for _ in 0..3 {
            let notification = pending_notification(fx.customer.id);
            fx.store.save_notification(&notification).await.unwrap();
        }
        fx.sender.set_fail(true);

        let summary = fx.service.jobs.run_pending_notifications().await.unwrap();
        assert_eq!(summary.examined, 3);
        assert_eq!(summary.sent, 0);
        assert_eq!(summary.failed_sends, 3);
        assert_eq!(summary.errors, 0);

        let failed = fx
            .service
            .notifications
            .notifications_for_customer(fx.customer.id)
            .await
            .unwrap();
        assert!(failed.iter().all(|n| n.status == NotificationStatus::Failed));
    }

    // =========================================================================
    // A broken item never blocks the rest of a pass
    // =========================================================================
    #[tokio::test]
    async fn overdue_pass_continues_past_broken_item() {
        let fx = fixture(date(2024, 12, 20)).await;
        let good = fx
            .service
            .subscriptions
            .create_subscription(fx.customer.id, fx.plan.id, date(2024, 12, 20), 1)
            .await
            .unwrap();
        // Subscription referencing a plan that no longer resolves
        let broken = Subscription {
            id: Uuid::new_v4(),
            customer_id: fx.customer.id,
            payment_plan_id: Uuid::new_v4(),
            start_date: date(2024, 12, 20),
            end_date: date(2025, 1, 20),
            status: SubscriptionStatus::Active,
            total_amount: dec!(500000),
            discount_applied: Decimal::ZERO,
            next_payment_date: Some(date(2024, 12, 20)),
            last_payment_date: None,
            last_reminder_sent: None,
        };
        fx.store.save_subscription(&broken).await.unwrap();

        fx.clock.set_date(date(2025, 1, 10));
        let summary = fx.service.jobs.run_overdue_detection().await.unwrap();
        assert_eq!(summary.examined, 2);
        assert_eq!(summary.marked_overdue, 1);
        assert_eq!(summary.failed, 1);

        let good = fx.service.subscriptions.subscription(good.id).await.unwrap();
        assert_eq!(good.status, SubscriptionStatus::Overdue);
    }

    // =========================================================================
    // Payment after overdue detection reactivates the subscription
    // =========================================================================
    #[tokio::test]
    async fn payment_reactivates_overdue_subscription() {
        let fx = fixture(date(2024, 12, 20)).await;
        let sub = fx
            .service
            .subscriptions
            .create_subscription(fx.customer.id, fx.plan.id, date(2024, 12, 20), 1)
            .await
            .unwrap();

        fx.clock.set_date(date(2025, 1, 10));
        fx.service.jobs.run_overdue_detection().await.unwrap();

        let payment = fx
            .service
            .payments
            .process_payment(sub.id, dec!(500000), crate::model::PaymentMethod::Cash, None)
            .await
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Completed);

        let sub = fx.service.subscriptions.subscription(sub.id).await.unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.next_payment_date, Some(date(2025, 2, 10)));
    }

    fn pending_notification(customer_id: Uuid) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            customer_id,
            subscription_id: None,
            notification_type: NotificationType::PaymentReminder,
            channel: NotificationChannel::Email,
            message: "Your payment is due soon.".to_string(),
            status: NotificationStatus::Pending,
            sent_at: None,
            created_at: Utc::now(),
        }
    }
}
