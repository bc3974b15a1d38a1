//! In-memory record store
//!
//! Backs every [`Store`] query with plain hash maps behind `RwLock`s.
//! Guards are held only for the duration of a map operation, never across
//! an await point.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::{BillingError, BillingResult};
use crate::model::{
    Business, Customer, Notification, NotificationStatus, Payment, PaymentPlan, Subscription,
    SubscriptionStatus,
};
use crate::store::Store;

#[derive(Default)]
pub struct MemoryStore {
    businesses: RwLock<HashMap<Uuid, Business>>,
    customers: RwLock<HashMap<Uuid, Customer>>,
    plans: RwLock<HashMap<Uuid, PaymentPlan>>,
    subscriptions: RwLock<HashMap<Uuid, Subscription>>,
    payments: RwLock<HashMap<Uuid, Payment>>,
    notifications: RwLock<HashMap<Uuid, Notification>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn read<T>(lock: &RwLock<HashMap<Uuid, T>>) -> BillingResult<RwLockReadGuard<'_, HashMap<Uuid, T>>> {
    lock.read()
        .map_err(|_| BillingError::Store("memory store lock poisoned".to_string()))
}

fn write<T>(
    lock: &RwLock<HashMap<Uuid, T>>,
) -> BillingResult<RwLockWriteGuard<'_, HashMap<Uuid, T>>> {
    lock.write()
        .map_err(|_| BillingError::Store("memory store lock poisoned".to_string()))
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_business(&self, id: Uuid) -> BillingResult<Option<Business>> {
        Ok(read(&self.businesses)?.get(&id).cloned())
    }

    async fn save_business(&self, business: &Business) -> BillingResult<()> {
        write(&self.businesses)?.insert(business.id, business.clone());
        Ok(())
    }

    async fn get_customer(&self, id: Uuid) -> BillingResult<Option<Customer>> {
        Ok(read(&self.customers)?.get(&id).cloned())
    }

    async fn save_customer(&self, customer: &Customer) -> BillingResult<()> {
        write(&self.customers)?.insert(customer.id, customer.clone());
        Ok(())
    }

    async fn customers_by_business(&self, business_id: Uuid) -> BillingResult<Vec<Customer>> {
        Ok(read(&self.customers)?
            .values()
            .filter(|c| c.business_id == business_id)
            .cloned()
            .collect())
    }

    async fn get_plan(&self, id: Uuid) -> BillingResult<Option<PaymentPlan>> {
        Ok(read(&self.plans)?.get(&id).cloned())
    }

    async fn save_plan(&self, plan: &PaymentPlan) -> BillingResult<()> {
        write(&self.plans)?.insert(plan.id, plan.clone());
        Ok(())
    }

    async fn plans_by_business(&self, business_id: Uuid) -> BillingResult<Vec<PaymentPlan>> {
        Ok(read(&self.plans)?
            .values()
            .filter(|p| p.business_id == business_id)
            .cloned()
            .collect())
    }

    async fn get_subscription(&self, id: Uuid) -> BillingResult<Option<Subscription>> {
        Ok(read(&self.subscriptions)?.get(&id).cloned())
    }

    async fn save_subscription(&self, subscription: &Subscription) -> BillingResult<()> {
        write(&self.subscriptions)?.insert(subscription.id, subscription.clone());
        Ok(())
    }

    async fn subscriptions_by_customer(
        &self,
        customer_id: Uuid,
    ) -> BillingResult<Vec<Subscription>> {
        Ok(read(&self.subscriptions)?
            .values()
            .filter(|s| s.customer_id == customer_id)
            .cloned()
            .collect())
    }

    async fn subscriptions_by_status(
        &self,
        status: SubscriptionStatus,
    ) -> BillingResult<Vec<Subscription>> {
        Ok(read(&self.subscriptions)?
            .values()
            .filter(|s| s.status == status)
            .cloned()
            .collect())
    }

    async fn get_payment(&self, id: Uuid) -> BillingResult<Option<Payment>> {
        Ok(read(&self.payments)?.get(&id).cloned())
    }

    async fn save_payment(&self, payment: &Payment) -> BillingResult<()> {
        write(&self.payments)?.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn payments_by_subscription(
        &self,
        subscription_id: Uuid,
    ) -> BillingResult<Vec<Payment>> {
        let mut payments: Vec<Payment> = read(&self.payments)?
            .values()
            .filter(|p| p.subscription_id == subscription_id)
            .cloned()
            .collect();
        payments.sort_by_key(|p| p.due_date);
        Ok(payments)
    }

    async fn payment_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> BillingResult<Option<Payment>> {
        Ok(read(&self.payments)?
            .values()
            .find(|p| p.transaction_id == transaction_id)
            .cloned())
    }

    async fn payments_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> BillingResult<Vec<Payment>> {
        let mut payments: Vec<Payment> = read(&self.payments)?
            .values()
            .filter(|p| p.due_date >= from && p.due_date <= to)
            .cloned()
            .collect();
        payments.sort_by_key(|p| p.due_date);
        Ok(payments)
    }

    async fn get_notification(&self, id: Uuid) -> BillingResult<Option<Notification>> {
        Ok(read(&self.notifications)?.get(&id).cloned())
    }

    async fn save_notification(&self, notification: &Notification) -> BillingResult<()> {
        write(&self.notifications)?.insert(notification.id, notification.clone());
        Ok(())
    }

    async fn notifications_by_status(
        &self,
        status: NotificationStatus,
    ) -> BillingResult<Vec<Notification>> {
        Ok(read(&self.notifications)?
            .values()
            .filter(|n| n.status == status)
            .cloned()
            .collect())
    }

    async fn notifications_by_customer(
        &self,
        customer_id: Uuid,
    ) -> BillingResult<Vec<Notification>> {
        Ok(read(&self.notifications)?
            .values()
            .filter(|n| n.customer_id == customer_id)
            .cloned()
            .collect())
    }

    async fn notifications_for_subscription(
        &self,
        subscription_id: Uuid,
    ) -> BillingResult<Vec<Notification>> {
        Ok(read(&self.notifications)?
            .values()
            .filter(|n| n.subscription_id == Some(subscription_id))
            .cloned()
            .collect())
    }
}
