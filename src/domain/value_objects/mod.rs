pub mod billing_months;
pub mod subscriptions;
