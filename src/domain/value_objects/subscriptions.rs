use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::subscriptions::SubscriptionEntity;
use crate::domain::value_objects::billing_months::BillingMonth;

pub const DEFAULT_LIST_LIMIT: i64 = 50;
pub const MAX_LIST_LIMIT: i64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("window start {from} is after window end {to}")]
pub struct InvalidWindow {
    pub from: BillingMonth,
    pub to: BillingMonth,
}

/// Inclusive `[from, to]` reporting window. Always satisfies `from <= to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingWindow {
    from: BillingMonth,
    to: BillingMonth,
}

impl BillingWindow {
    pub fn new(from: BillingMonth, to: BillingMonth) -> Result<Self, InvalidWindow> {
        if from > to {
            return Err(InvalidWindow { from, to });
        }
        Ok(Self { from, to })
    }

    pub fn from(&self) -> BillingMonth {
        self.from
    }

    pub fn to(&self) -> BillingMonth {
        self.to
    }
}

/// Equality filters for the overlap query. `None` means the filter is not applied at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlapFilter {
    pub user_id: Option<Uuid>,
    pub service_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSubscriptionsFilter {
    pub user_id: Option<Uuid>,
    pub service_name: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for ListSubscriptionsFilter {
    fn default() -> Self {
        Self {
            user_id: None,
            service_name: None,
            limit: DEFAULT_LIST_LIMIT,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubscriptionModel {
    pub id: Uuid,
    pub service_name: String,
    pub price: i32,
    pub user_id: Uuid,
    pub start_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SubscriptionEntity> for SubscriptionModel {
    fn from(value: SubscriptionEntity) -> Self {
        Self {
            id: value.id,
            service_name: value.service_name,
            price: value.price,
            user_id: value.user_id,
            start_date: value.start_date,
            end_date: value.end_date,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

/// Request body for create and full update. Dates use the `MM-YYYY` wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertSubscriptionModel {
    pub service_name: String,
    pub price: i32,
    pub user_id: String,
    pub start_date: String,
    #[serde(default)]
    pub end_date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AggregateDto {
    pub from: String,
    pub to: String,
    pub total: i64,
}
