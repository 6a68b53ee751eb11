use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::subscriptions::{
    InsertSubscriptionEntity, SubscriptionEntity, UpdateSubscriptionEntity,
};
use crate::domain::value_objects::subscriptions::{
    BillingWindow, ListSubscriptionsFilter, OverlapFilter,
};

#[async_trait]
#[automock]
pub trait SubscriptionRepository {
    async fn create(&self, insert_entity: InsertSubscriptionEntity) -> Result<SubscriptionEntity>;

    async fn find_by_id(&self, subscription_id: Uuid) -> Result<Option<SubscriptionEntity>>;

    async fn list(&self, filter: &ListSubscriptionsFilter) -> Result<Vec<SubscriptionEntity>>;

    async fn update(
        &self,
        subscription_id: Uuid,
        update_entity: UpdateSubscriptionEntity,
    ) -> Result<Option<SubscriptionEntity>>;

    /// Returns `false` when no row matched.
    async fn delete(&self, subscription_id: Uuid) -> Result<bool>;

    /// Subscriptions with `start_date <= window.to` and an end date that is either open
    /// or `>= window.from`, narrowed by whichever filters are present. Newest first.
    async fn find_overlapping(
        &self,
        window: &BillingWindow,
        filter: &OverlapFilter,
    ) -> Result<Vec<SubscriptionEntity>>;
}
