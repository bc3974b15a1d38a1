//! RecurPay Background Worker
//!
//! Runs the scheduled billing lifecycle jobs:
//! - Overdue detection (daily at 01:00 UTC)
//! - Auto-expiration of long-overdue subscriptions (daily at 01:30 UTC)
//! - Payment reminders (daily at 09:00 UTC)
//! - Pending-notification processing (every 5 minutes)
//! - Health check heartbeat (every 5 minutes)
//!
//! Every job body is idempotent, so the at-least-once triggering of the
//! cron scheduler (including overlapping or repeated runs) is safe.

mod sender;

use std::sync::Arc;
use std::time::Duration;

use recurpay_billing::{
    BillingService, ChannelSender, Clock, MemoryStore, Store, SystemClock,
};
use recurpay_shared::{telemetry, WorkerConfig};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::sender::HttpChannelSender;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init();

    // Load environment
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env();

    info!("Starting RecurPay Worker");

    // Persistent engines plug in behind the `Store` trait; the in-process
    // store is the default wiring.
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let channel_sender: Arc<dyn ChannelSender> = Arc::new(HttpChannelSender::new(
        &config.sender_endpoint,
        Duration::from_secs(config.sender_timeout_secs),
    )?);

    let billing = Arc::new(BillingService::new(
        store,
        clock,
        channel_sender,
        config.payment_link_base.clone(),
    ));

    // Create scheduler
    let scheduler = JobScheduler::new().await?;

    // Job 1: Overdue detection
    let overdue_billing = billing.clone();
    scheduler
        .add(Job::new_async(
            config.overdue_cron.as_str(),
            move |_uuid, _l| {
                let billing = overdue_billing.clone();
                Box::pin(async move {
                    info!("Running overdue detection job");
                    if let Err(e) = billing.jobs.run_overdue_detection().await {
                        error!(error = %e, "Overdue detection run failed");
                    }
                })
            },
        )?)
        .await?;
    info!("Scheduled: Overdue detection ({})", config.overdue_cron);

    // Job 2: Auto-expiration of long-overdue subscriptions
    let expiration_billing = billing.clone();
    scheduler
        .add(Job::new_async(
            config.expiration_cron.as_str(),
            move |_uuid, _l| {
                let billing = expiration_billing.clone();
                Box::pin(async move {
                    info!("Running auto-expiration job");
                    if let Err(e) = billing.jobs.run_auto_expiration().await {
                        error!(error = %e, "Auto-expiration run failed");
                    }
                })
            },
        )?)
        .await?;
    info!("Scheduled: Auto-expiration ({})", config.expiration_cron);

    // Job 3: Payment reminders
    let reminder_billing = billing.clone();
    scheduler
        .add(Job::new_async(
            config.reminder_cron.as_str(),
            move |_uuid, _l| {
                let billing = reminder_billing.clone();
                Box::pin(async move {
                    info!("Running payment reminder job");
                    if let Err(e) = billing.jobs.run_payment_reminders().await {
                        error!(error = %e, "Payment reminder run failed");
                    }
                })
            },
        )?)
        .await?;
    info!("Scheduled: Payment reminders ({})", config.reminder_cron);

    // Job 4: Pending-notification processing
    let notification_billing = billing.clone();
    scheduler
        .add(Job::new_async(
            config.notification_cron.as_str(),
            move |_uuid, _l| {
                let billing = notification_billing.clone();
                Box::pin(async move {
                    if let Err(e) = billing.jobs.run_pending_notifications().await {
                        error!(error = %e, "Pending notification run failed");
                    }
                })
            },
        )?)
        .await?;
    info!(
        "Scheduled: Pending notification processing ({})",
        config.notification_cron
    );

    // Job 5: Health check heartbeat (every 5 minutes)
    scheduler
        .add(Job::new_async("0 */5 * * * *", |_uuid, _l| {
            Box::pin(async move {
                info!("Worker heartbeat - all systems operational");
            })
        })?)
        .await?;
    info!("Scheduled: Health check heartbeat (every 5 minutes)");

    // Start the scheduler
    info!("Starting job scheduler");
    scheduler.start().await?;

    info!("RecurPay Worker started successfully with 5 scheduled jobs");

    // Keep the main task running
    // The scheduler runs jobs in background tasks
    loop {
        tokio::time::sleep(Duration::from_secs(3600)).await;
    }
}
