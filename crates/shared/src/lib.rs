//! Shared configuration and telemetry for RecurPay services

pub mod config;
pub mod telemetry;

pub use config::WorkerConfig;
