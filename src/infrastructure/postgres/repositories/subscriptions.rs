use anyhow::Result;
use async_trait::async_trait;
use diesel::{RunQueryDsl, delete, dsl::now, insert_into, prelude::*, update};
use std::sync::Arc;
use tokio::task;
use uuid::Uuid;

use crate::{
    domain::{
        entities::subscriptions::{
            InsertSubscriptionEntity, SubscriptionEntity, UpdateSubscriptionEntity,
        },
        repositories::subscriptions::SubscriptionRepository,
        value_objects::subscriptions::{BillingWindow, ListSubscriptionsFilter, OverlapFilter},
    },
    infrastructure::postgres::{postgres_connection::PgPoolSquad, schema::subscriptions},
};

pub struct SubscriptionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SubscriptionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

// Diesel is synchronous; DB work runs on the blocking threadpool.
#[async_trait]
impl SubscriptionRepository for SubscriptionPostgres {
    async fn create(&self, insert_entity: InsertSubscriptionEntity) -> Result<SubscriptionEntity> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<SubscriptionEntity> {
            let mut conn = db_pool.get()?;

            let result = insert_into(subscriptions::table)
                .values(&insert_entity)
                .returning(SubscriptionEntity::as_returning())
                .get_result::<SubscriptionEntity>(&mut conn)?;

            Ok(result)
        })
        .await??)
    }

    async fn find_by_id(&self, subscription_id: Uuid) -> Result<Option<SubscriptionEntity>> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<Option<SubscriptionEntity>> {
            let mut conn = db_pool.get()?;

            let result = subscriptions::table
                .find(subscription_id)
                .select(SubscriptionEntity::as_select())
                .first::<SubscriptionEntity>(&mut conn)
                .optional()?;

            Ok(result)
        })
        .await??)
    }

    async fn list(&self, filter: &ListSubscriptionsFilter) -> Result<Vec<SubscriptionEntity>> {
        let db_pool = Arc::clone(&self.db_pool);
        let filter = filter.clone();

        Ok(task::spawn_blocking(move || -> Result<Vec<SubscriptionEntity>> {
            let mut conn = db_pool.get()?;

            let mut query = subscriptions::table
                .select(SubscriptionEntity::as_select())
                .into_boxed();

            if let Some(user_id) = filter.user_id {
                query = query.filter(subscriptions::user_id.eq(user_id));
            }

            if let Some(service_name) = filter.service_name {
                query = query.filter(subscriptions::service_name.eq(service_name));
            }

            let results = query
                .order((subscriptions::created_at.desc(), subscriptions::id.desc()))
                .limit(filter.limit)
                .offset(filter.offset)
                .load::<SubscriptionEntity>(&mut conn)?;

            Ok(results)
        })
        .await??)
    }

    async fn update(
        &self,
        subscription_id: Uuid,
        update_entity: UpdateSubscriptionEntity,
    ) -> Result<Option<SubscriptionEntity>> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<Option<SubscriptionEntity>> {
            let mut conn = db_pool.get()?;

            let result = update(subscriptions::table.find(subscription_id))
                .set((&update_entity, subscriptions::updated_at.eq(now)))
                .returning(SubscriptionEntity::as_returning())
                .get_result::<SubscriptionEntity>(&mut conn)
                .optional()?;

            Ok(result)
        })
        .await??)
    }

    async fn delete(&self, subscription_id: Uuid) -> Result<bool> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<bool> {
            let mut conn = db_pool.get()?;

            let deleted = delete(subscriptions::table.find(subscription_id)).execute(&mut conn)?;

            Ok(deleted > 0)
        })
        .await??)
    }

    async fn find_overlapping(
        &self,
        window: &BillingWindow,
        filter: &OverlapFilter,
    ) -> Result<Vec<SubscriptionEntity>> {
        let db_pool = Arc::clone(&self.db_pool);
        let window = *window;
        let filter = filter.clone();

        Ok(task::spawn_blocking(move || -> Result<Vec<SubscriptionEntity>> {
            let mut conn = db_pool.get()?;

            // Coarse boundary test only; exact month clamping happens in the calculator.
            let mut query = subscriptions::table
                .select(SubscriptionEntity::as_select())
                .filter(subscriptions::start_date.le(window.to().first_day()))
                .filter(
                    subscriptions::end_date
                        .is_null()
                        .or(subscriptions::end_date.ge(window.from().first_day())),
                )
                .into_boxed();

            if let Some(user_id) = filter.user_id {
                query = query.filter(subscriptions::user_id.eq(user_id));
            }

            if let Some(service_name) = filter.service_name {
                query = query.filter(subscriptions::service_name.eq(service_name));
            }

            let results = query
                .order((subscriptions::created_at.desc(), subscriptions::id.desc()))
                .load::<SubscriptionEntity>(&mut conn)?;

            Ok(results)
        })
        .await??)
    }
}
