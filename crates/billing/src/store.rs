//! Record-store boundary
//!
//! The core treats persistence as a simple record store: lookup by id,
//! save, and a fixed set of query shapes (by status, by customer, by
//! business, by date range, by transaction id). Real storage engines live
//! behind this trait; [`crate::memory::MemoryStore`] is the in-process
//! implementation used by tests and the worker's default wiring.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::BillingResult;
use crate::model::{
    Business, Customer, Notification, NotificationStatus, Payment, PaymentPlan, Subscription,
    SubscriptionStatus,
};

#[async_trait]
pub trait Store: Send + Sync {
    async fn get_business(&self, id: Uuid) -> BillingResult<Option<Business>>;
    async fn save_business(&self, business: &Business) -> BillingResult<()>;

    async fn get_customer(&self, id: Uuid) -> BillingResult<Option<Customer>>;
    async fn save_customer(&self, customer: &Customer) -> BillingResult<()>;
    async fn customers_by_business(&self, business_id: Uuid) -> BillingResult<Vec<Customer>>;

    async fn get_plan(&self, id: Uuid) -> BillingResult<Option<PaymentPlan>>;
    async fn save_plan(&self, plan: &PaymentPlan) -> BillingResult<()>;
    async fn plans_by_business(&self, business_id: Uuid) -> BillingResult<Vec<PaymentPlan>>;

    async fn get_subscription(&self, id: Uuid) -> BillingResult<Option<Subscription>>;
    async fn save_subscription(&self, subscription: &Subscription) -> BillingResult<()>;
    async fn subscriptions_by_customer(
        &self,
        customer_id: Uuid,
    ) -> BillingResult<Vec<Subscription>>;
    async fn subscriptions_by_status(
        &self,
        status: SubscriptionStatus,
    ) -> BillingResult<Vec<Subscription>>;

    async fn get_payment(&self, id: Uuid) -> BillingResult<Option<Payment>>;
    async fn save_payment(&self, payment: &Payment) -> BillingResult<()>;
    async fn payments_by_subscription(
        &self,
        subscription_id: Uuid,
    ) -> BillingResult<Vec<Payment>>;
    /// Unique lookup used by gateway verification
    async fn payment_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> BillingResult<Option<Payment>>;
    /// Completed-or-pending payments whose due date falls in `[from, to]`
    async fn payments_between(&self, from: NaiveDate, to: NaiveDate)
        -> BillingResult<Vec<Payment>>;

    async fn get_notification(&self, id: Uuid) -> BillingResult<Option<Notification>>;
    async fn save_notification(&self, notification: &Notification) -> BillingResult<()>;
    async fn notifications_by_status(
        &self,
        status: NotificationStatus,
    ) -> BillingResult<Vec<Notification>>;
    async fn notifications_by_customer(
        &self,
        customer_id: Uuid,
    ) -> BillingResult<Vec<Notification>>;
    async fn notifications_for_subscription(
        &self,
        subscription_id: Uuid,
    ) -> BillingResult<Vec<Notification>>;
}
