pub mod proration;
pub mod subscriptions;
