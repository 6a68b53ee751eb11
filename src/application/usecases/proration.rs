use chrono::NaiveDate;

use crate::domain::{
    entities::subscriptions::SubscriptionEntity,
    value_objects::{billing_months::BillingMonth, subscriptions::BillingWindow},
};

/// Whole months of `[start_date, end_date]` (open end when `None`) that fall inside `window`.
pub fn overlap_months(
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    window: &BillingWindow,
) -> i64 {
    let window_from = window.from().first_day();
    let window_to = window.to().first_day();

    let left = start_date.max(window_from);
    let right = match end_date {
        Some(end_date) => end_date.min(window_to),
        None => window_to,
    };

    if left > right {
        return 0;
    }

    BillingMonth::months_inclusive(BillingMonth::from_date(left), BillingMonth::from_date(right))
}

/// Sum of `overlap_months * price` across `subscriptions`.
pub fn calculate_total(subscriptions: &[SubscriptionEntity], window: &BillingWindow) -> i64 {
    subscriptions
        .iter()
        .map(|subscription| {
            overlap_months(subscription.start_date, subscription.end_date, window)
                * i64::from(subscription.price)
        })
        .sum()
}
