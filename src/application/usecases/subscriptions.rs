use std::sync::Arc;

use axum::http::StatusCode;
use chrono::NaiveDate;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    application::usecases::proration::calculate_total,
    domain::{
        entities::subscriptions::{InsertSubscriptionEntity, UpdateSubscriptionEntity},
        repositories::subscriptions::SubscriptionRepository,
        value_objects::{
            billing_months::BillingMonth,
            subscriptions::{
                BillingWindow, InsertSubscriptionModel, InvalidWindow, ListSubscriptionsFilter,
                OverlapFilter, SubscriptionModel,
            },
        },
    },
};

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("subscription not found")]
    NotFound,
    #[error("{0}")]
    Validation(String),
    #[error("from cannot be after to")]
    InvalidWindow(#[from] InvalidWindow),
    #[error("failed to retrieve subscriptions")]
    RetrievalFailure(#[source] anyhow::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl SubscriptionError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            SubscriptionError::NotFound => StatusCode::NOT_FOUND,
            SubscriptionError::Validation(_) | SubscriptionError::InvalidWindow(_) => {
                StatusCode::BAD_REQUEST
            }
            SubscriptionError::RetrievalFailure(_) | SubscriptionError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, SubscriptionError>;

pub struct SubscriptionUseCase<S>
where
    S: SubscriptionRepository + Send + Sync + 'static,
{
    subscription_repo: Arc<S>,
}

impl<S> SubscriptionUseCase<S>
where
    S: SubscriptionRepository + Send + Sync + 'static,
{
    pub fn new(subscription_repo: Arc<S>) -> Self {
        Self { subscription_repo }
    }

    pub async fn create(&self, model: InsertSubscriptionModel) -> UseCaseResult<SubscriptionModel> {
        let draft = validate(model)?;
        info!(
            user_id = %draft.user_id,
            service_name = %draft.service_name,
            "subscriptions: creating subscription"
        );

        let entity = self
            .subscription_repo
            .create(InsertSubscriptionEntity {
                service_name: draft.service_name,
                price: draft.price,
                user_id: draft.user_id,
                start_date: draft.start_date,
                end_date: draft.end_date,
            })
            .await
            .map_err(|err| {
                error!(db_error = ?err, "subscriptions: failed to create subscription");
                SubscriptionError::Internal(err)
            })?;

        info!(subscription_id = %entity.id, "subscriptions: subscription created");
        Ok(entity.into())
    }

    pub async fn get(&self, subscription_id: Uuid) -> UseCaseResult<SubscriptionModel> {
        let entity = self
            .subscription_repo
            .find_by_id(subscription_id)
            .await
            .map_err(|err| {
                error!(
                    %subscription_id,
                    db_error = ?err,
                    "subscriptions: failed to load subscription"
                );
                SubscriptionError::Internal(err)
            })?
            .ok_or(SubscriptionError::NotFound)?;

        Ok(entity.into())
    }

    pub async fn list(
        &self,
        filter: ListSubscriptionsFilter,
    ) -> UseCaseResult<Vec<SubscriptionModel>> {
        let entities = self.subscription_repo.list(&filter).await.map_err(|err| {
            error!(db_error = ?err, "subscriptions: failed to list subscriptions");
            SubscriptionError::Internal(err)
        })?;

        Ok(entities.into_iter().map(SubscriptionModel::from).collect())
    }

    pub async fn update(
        &self,
        subscription_id: Uuid,
        model: InsertSubscriptionModel,
    ) -> UseCaseResult<SubscriptionModel> {
        let draft = validate(model)?;

        let entity = self
            .subscription_repo
            .update(
                subscription_id,
                UpdateSubscriptionEntity {
                    service_name: draft.service_name,
                    price: draft.price,
                    user_id: draft.user_id,
                    start_date: draft.start_date,
                    end_date: draft.end_date,
                },
            )
            .await
            .map_err(|err| {
                error!(
                    %subscription_id,
                    db_error = ?err,
                    "subscriptions: failed to update subscription"
                );
                SubscriptionError::Internal(err)
            })?
            .ok_or(SubscriptionError::NotFound)?;

        info!(%subscription_id, "subscriptions: subscription updated");
        Ok(entity.into())
    }

    pub async fn delete(&self, subscription_id: Uuid) -> UseCaseResult<()> {
        let deleted = self
            .subscription_repo
            .delete(subscription_id)
            .await
            .map_err(|err| {
                error!(
                    %subscription_id,
                    db_error = ?err,
                    "subscriptions: failed to delete subscription"
                );
                SubscriptionError::Internal(err)
            })?;

        if !deleted {
            return Err(SubscriptionError::NotFound);
        }

        info!(%subscription_id, "subscriptions: subscription deleted");
        Ok(())
    }

    /// Total cost of every subscription overlapping `[from, to]`, in whole months.
    pub async fn aggregate(
        &self,
        from: BillingMonth,
        to: BillingMonth,
        filter: OverlapFilter,
    ) -> UseCaseResult<i64> {
        let window = BillingWindow::new(from, to).inspect_err(|err| {
            warn!(%err, "subscriptions: rejected aggregate window");
        })?;

        info!(
            %from,
            %to,
            user_id = ?filter.user_id,
            service_name = ?filter.service_name,
            "subscriptions: searching overlapping subscriptions"
        );

        let subscriptions = self
            .subscription_repo
            .find_overlapping(&window, &filter)
            .await
            .map_err(|err| {
                error!(%from, %to, db_error = ?err, "subscriptions: overlap query failed");
                SubscriptionError::RetrievalFailure(err)
            })?;

        let total = calculate_total(&subscriptions, &window);
        info!(
            matched = subscriptions.len(),
            total, "subscriptions: aggregate calculated"
        );

        Ok(total)
    }
}

struct SubscriptionDraft {
    service_name: String,
    price: i32,
    user_id: Uuid,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
}

fn validate(model: InsertSubscriptionModel) -> UseCaseResult<SubscriptionDraft> {
    if model.service_name.trim().is_empty() {
        return Err(SubscriptionError::Validation(
            "service_name is required".to_string(),
        ));
    }
    if model.price < 0 {
        return Err(SubscriptionError::Validation(
            "price must not be negative".to_string(),
        ));
    }

    let user_id = Uuid::parse_str(model.user_id.trim())
        .map_err(|_| SubscriptionError::Validation("user_id must be a UUID".to_string()))?;

    let start: BillingMonth = model.start_date.parse().map_err(|_| {
        SubscriptionError::Validation("invalid start_date format, expected MM-YYYY".to_string())
    })?;

    let end = match model.end_date.as_deref().filter(|raw| !raw.is_empty()) {
        Some(raw) => {
            let end: BillingMonth = raw.parse().map_err(|_| {
                SubscriptionError::Validation(
                    "invalid end_date format, expected MM-YYYY".to_string(),
                )
            })?;
            if end < start {
                return Err(SubscriptionError::Validation(
                    "end_date cannot be before start_date".to_string(),
                ));
            }
            Some(end)
        }
        None => None,
    };

    Ok(SubscriptionDraft {
        service_name: model.service_name,
        price: model.price,
        user_id,
        start_date: start.first_day(),
        end_date: end.map(|end| end.first_day()),
    })
}
