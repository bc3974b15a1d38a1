//! Shared fixtures for the crate's tests

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal_macros::dec;

use crate::clock::{Clock, FixedClock};
use crate::memory::MemoryStore;
use crate::model::{Business, Customer, NotificationChannel, PaymentPlan, PeriodType};
use crate::notifications::{ChannelSender, SendFailure, SendReceipt};
use crate::store::Store;
use crate::{BillingService, NewPlan};

/// Sender that records every send and can be told to fail
pub struct RecordingSender {
    fail: AtomicBool,
    sent: Mutex<Vec<(NotificationChannel, String, String)>>,
}

impl RecordingSender {
    pub fn arc() -> Arc<Self> {
        Arc::new(Self {
            fail: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn sent_messages(&self) -> Vec<(NotificationChannel, String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChannelSender for RecordingSender {
    async fn send(
        &self,
        channel: NotificationChannel,
        recipient: &str,
        message: &str,
    ) -> Result<SendReceipt, SendFailure> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SendFailure::new("provider unavailable"));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push((channel, recipient.to_string(), message.to_string()));
        Ok(SendReceipt {
            provider_ref: Some(format!("msg-{}", sent.len())),
        })
    }
}

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<FixedClock>,
    pub sender: Arc<RecordingSender>,
    pub service: BillingService,
    pub business: Business,
    pub customer: Customer,
    pub plan: PaymentPlan,
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// One business, one customer (with email), and a monthly plan:
/// base 500_000, 10% advance discount, 10_000/day late fee, 3 grace days.
pub async fn fixture(today: NaiveDate) -> Fixture {
    fixture_with_plan(today, |_| {}).await
}

pub async fn fixture_with_plan(
    today: NaiveDate,
    adjust: impl FnOnce(&mut NewPlan),
) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(FixedClock::on_date(today));
    let sender = RecordingSender::arc();
    let store_dyn: Arc<dyn Store> = store.clone();
    let clock_dyn: Arc<dyn Clock> = clock.clone();
    let sender_dyn: Arc<dyn ChannelSender> = sender.clone();
    let service = BillingService::new(store_dyn, clock_dyn, sender_dyn, "https://pay.example.test");

    let business = service
        .accounts
        .register_business("Bluewater Gym")
        .await
        .unwrap();
    let customer = service
        .accounts
        .register_customer(
            business.id,
            "Ade",
            "Musa",
            "+2348012345678",
            Some("ade@example.test"),
            None,
        )
        .await
        .unwrap();

    let mut new_plan = NewPlan {
        name: "Monthly Membership".to_string(),
        period_type: PeriodType::Monthly,
        period_count: 1,
        base_amount: dec!(500000),
        discount_percentage: dec!(10),
        late_fee_per_day: dec!(10000),
        grace_period_days: 3,
    };
    adjust(&mut new_plan);
    let plan = service.accounts.create_plan(business.id, new_plan).await.unwrap();

    Fixture {
        store,
        clock,
        sender,
        service,
        business,
        customer,
        plan,
    }
}
