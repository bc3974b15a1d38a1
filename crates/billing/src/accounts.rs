//! Business, customer, and payment plan administration
//!
//! Creation plus soft-delete only. Plans and businesses are deactivated,
//! never removed, so historical subscriptions keep their references.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{BillingError, BillingResult};
use crate::model::{Business, Customer, PaymentPlan, PeriodType};
use crate::store::Store;

/// Parameters for creating a payment plan
#[derive(Debug, Clone)]
pub struct NewPlan {
    pub name: String,
    pub period_type: PeriodType,
    pub period_count: u32,
    pub base_amount: Decimal,
    pub discount_percentage: Decimal,
    pub late_fee_per_day: Decimal,
    pub grace_period_days: i64,
}

pub struct AccountService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl AccountService {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn register_business(&self, name: &str) -> BillingResult<Business> {
        let business = Business {
            id: Uuid::new_v4(),
            name: name.to_string(),
            active: true,
            created_at: self.clock.now(),
        };
        self.store.save_business(&business).await?;
        tracing::info!(business_id = %business.id, name = %business.name, "Registered business");
        Ok(business)
    }

    /// Soft delete: clears the active flag, child records stay in place.
    pub async fn deactivate_business(&self, id: Uuid) -> BillingResult<Business> {
        let mut business = self
            .store
            .get_business(id)
            .await?
            .ok_or_else(|| BillingError::NotFound(format!("business {id}")))?;
        if business.active {
            business.active = false;
            self.store.save_business(&business).await?;
            tracing::info!(business_id = %business.id, "Deactivated business");
        }
        Ok(business)
    }

    pub async fn register_customer(
        &self,
        business_id: Uuid,
        first_name: &str,
        last_name: &str,
        phone: &str,
        email: Option<&str>,
        join_date: Option<NaiveDate>,
    ) -> BillingResult<Customer> {
        let business = self
            .store
            .get_business(business_id)
            .await?
            .ok_or_else(|| BillingError::NotFound(format!("business {business_id}")))?;
        if !business.active {
            return Err(BillingError::InvalidOperation(format!(
                "business {business_id} is not active"
            )));
        }

        let customer = Customer {
            id: Uuid::new_v4(),
            business_id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            phone: phone.to_string(),
            email: email.map(str::to_string),
            active: true,
            join_date: join_date.unwrap_or_else(|| self.clock.today()),
        };
        self.store.save_customer(&customer).await?;
        tracing::info!(
            customer_id = %customer.id,
            business_id = %business_id,
            "Registered customer"
        );
        Ok(customer)
    }

    pub async fn create_plan(&self, business_id: Uuid, new_plan: NewPlan) -> BillingResult<PaymentPlan> {
        let business = self
            .store
            .get_business(business_id)
            .await?
            .ok_or_else(|| BillingError::NotFound(format!("business {business_id}")))?;
        if !business.active {
            return Err(BillingError::InvalidOperation(format!(
                "business {business_id} is not active"
            )));
        }
        if new_plan.period_count == 0 {
            return Err(BillingError::InvalidArgument(
                "period count must be at least 1".to_string(),
            ));
        }
        if new_plan.base_amount < Decimal::ZERO {
            return Err(BillingError::InvalidArgument(
                "base amount must not be negative".to_string(),
            ));
        }
        if new_plan.discount_percentage < Decimal::ZERO
            || new_plan.discount_percentage > Decimal::ONE_HUNDRED
        {
            return Err(BillingError::InvalidArgument(
                "discount percentage must be between 0 and 100".to_string(),
            ));
        }
        if new_plan.late_fee_per_day < Decimal::ZERO {
            return Err(BillingError::InvalidArgument(
                "late fee per day must not be negative".to_string(),
            ));
        }
        if new_plan.grace_period_days < 0 {
            return Err(BillingError::InvalidArgument(
                "grace period days must not be negative".to_string(),
            ));
        }

        let plan = PaymentPlan {
            id: Uuid::new_v4(),
            business_id,
            name: new_plan.name,
            period_type: new_plan.period_type,
            period_count: new_plan.period_count,
            base_amount: new_plan.base_amount,
            discount_percentage: new_plan.discount_percentage,
            late_fee_per_day: new_plan.late_fee_per_day,
            grace_period_days: new_plan.grace_period_days,
            active: true,
        };
        self.store.save_plan(&plan).await?;
        tracing::info!(plan_id = %plan.id, name = %plan.name, "Created payment plan");
        Ok(plan)
    }

    /// Deactivation blocks new subscriptions; existing ones keep billing
    /// against the plan's recorded terms.
    pub async fn deactivate_plan(&self, id: Uuid) -> BillingResult<PaymentPlan> {
        let mut plan = self
            .store
            .get_plan(id)
            .await?
            .ok_or_else(|| BillingError::NotFound(format!("payment plan {id}")))?;
        if plan.active {
            plan.active = false;
            self.store.save_plan(&plan).await?;
            tracing::info!(plan_id = %plan.id, "Deactivated payment plan");
        }
        Ok(plan)
    }

    pub async fn customers(&self, business_id: Uuid) -> BillingResult<Vec<Customer>> {
        self.store.customers_by_business(business_id).await
    }

    pub async fn plans(&self, business_id: Uuid) -> BillingResult<Vec<PaymentPlan>> {
        self.store.plans_by_business(business_id).await
    }
}
