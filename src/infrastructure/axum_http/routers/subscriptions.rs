use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::{
    application::usecases::subscriptions::SubscriptionUseCase,
    domain::{
        repositories::subscriptions::SubscriptionRepository,
        value_objects::{
            billing_months::BillingMonth,
            subscriptions::{
                AggregateDto, DEFAULT_LIST_LIMIT, InsertSubscriptionModel, ListSubscriptionsFilter,
                MAX_LIST_LIMIT, OverlapFilter,
            },
        },
    },
    infrastructure::{
        axum_http::error_responses::AppError,
        postgres::{
            postgres_connection::PgPoolSquad, repositories::subscriptions::SubscriptionPostgres,
        },
    },
};

#[derive(Debug, Default, Deserialize)]
pub struct AggregateQuery {
    from: Option<String>,
    to: Option<String>,
    user_id: Option<String>,
    service_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    user_id: Option<String>,
    service_name: Option<String>,
    limit: Option<String>,
    offset: Option<String>,
}

pub fn routes(db_pool: Arc<PgPoolSquad>) -> Router {
    let subscriptions_repository = SubscriptionPostgres::new(Arc::clone(&db_pool));
    let subscriptions_usecase = SubscriptionUseCase::new(Arc::new(subscriptions_repository));

    router(Arc::new(subscriptions_usecase))
}

pub fn router<T>(subscriptions_usecase: Arc<SubscriptionUseCase<T>>) -> Router
where
    T: SubscriptionRepository + Send + Sync + 'static,
{
    // `/aggregate` is a static segment, so it wins over `/:id`.
    Router::new()
        .route("/", get(list::<T>).post(create::<T>))
        .route("/aggregate", get(aggregate::<T>))
        .route(
            "/:id",
            get(find_one::<T>).put(update::<T>).delete(remove::<T>),
        )
        .with_state(subscriptions_usecase)
}

pub async fn aggregate<T>(
    State(subscriptions_usecase): State<Arc<SubscriptionUseCase<T>>>,
    query: Result<Query<AggregateQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError>
where
    T: SubscriptionRepository + Send + Sync + 'static,
{
    let Query(query) = query?;
    let (Some(raw_from), Some(raw_to)) = (non_empty(query.from), non_empty(query.to)) else {
        return Err(AppError::BadRequest(
            "from and to are required (MM-YYYY)".to_string(),
        ));
    };
    let from = parse_month(&raw_from, "from")?;
    let to = parse_month(&raw_to, "to")?;

    let filter = OverlapFilter {
        user_id: parse_user_id(query.user_id)?,
        service_name: non_empty(query.service_name),
    };

    let total = subscriptions_usecase.aggregate(from, to, filter).await?;

    Ok(Json(AggregateDto {
        from: raw_from,
        to: raw_to,
        total,
    }))
}

pub async fn list<T>(
    State(subscriptions_usecase): State<Arc<SubscriptionUseCase<T>>>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError>
where
    T: SubscriptionRepository + Send + Sync + 'static,
{
    let Query(query) = query?;
    let filter = list_filter(query)?;
    let subscriptions = subscriptions_usecase.list(filter).await?;
    info!(count = subscriptions.len(), "subscriptions router: listed");
    Ok(Json(subscriptions))
}

pub async fn find_one<T>(
    State(subscriptions_usecase): State<Arc<SubscriptionUseCase<T>>>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, AppError>
where
    T: SubscriptionRepository + Send + Sync + 'static,
{
    let Path(subscription_id) = path?;
    let subscription = subscriptions_usecase.get(subscription_id).await?;
    Ok(Json(subscription))
}

pub async fn create<T>(
    State(subscriptions_usecase): State<Arc<SubscriptionUseCase<T>>>,
    body: Result<Json<InsertSubscriptionModel>, JsonRejection>,
) -> Result<impl IntoResponse, AppError>
where
    T: SubscriptionRepository + Send + Sync + 'static,
{
    let Json(insert_subscription_model) = body?;
    let subscription = subscriptions_usecase
        .create(insert_subscription_model)
        .await?;
    Ok((StatusCode::CREATED, Json(subscription)))
}

pub async fn update<T>(
    State(subscriptions_usecase): State<Arc<SubscriptionUseCase<T>>>,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<InsertSubscriptionModel>, JsonRejection>,
) -> Result<impl IntoResponse, AppError>
where
    T: SubscriptionRepository + Send + Sync + 'static,
{
    let Path(subscription_id) = path?;
    let Json(insert_subscription_model) = body?;
    let subscription = subscriptions_usecase
        .update(subscription_id, insert_subscription_model)
        .await?;
    Ok(Json(subscription))
}

pub async fn remove<T>(
    State(subscriptions_usecase): State<Arc<SubscriptionUseCase<T>>>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, AppError>
where
    T: SubscriptionRepository + Send + Sync + 'static,
{
    let Path(subscription_id) = path?;
    subscriptions_usecase.delete(subscription_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn parse_month(raw: &str, field: &str) -> Result<BillingMonth, AppError> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("invalid {field} format, expected MM-YYYY")))
}

fn parse_user_id(raw: Option<String>) -> Result<Option<Uuid>, AppError> {
    non_empty(raw)
        .map(|raw| Uuid::parse_str(&raw))
        .transpose()
        .map_err(|_| AppError::BadRequest("user_id must be a UUID".to_string()))
}

/// Out-of-range or unparsable paging values fall back to defaults.
fn list_filter(query: ListQuery) -> Result<ListSubscriptionsFilter, AppError> {
    let limit = query
        .limit
        .and_then(|raw| raw.parse::<i64>().ok())
        .filter(|limit| (1..=MAX_LIST_LIMIT).contains(limit))
        .unwrap_or(DEFAULT_LIST_LIMIT);
    let offset = query
        .offset
        .and_then(|raw| raw.parse::<i64>().ok())
        .filter(|offset| *offset >= 0)
        .unwrap_or(0);

    Ok(ListSubscriptionsFilter {
        user_id: parse_user_id(query.user_id)?,
        service_name: non_empty(query.service_name),
        limit,
        offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        entities::subscriptions::SubscriptionEntity,
        repositories::subscriptions::MockSubscriptionRepository,
    };
    use axum::{body::Body, http::Request};
    use chrono::Utc;
    use mockall::predicate::{always, eq};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn test_app(subscription_repo: MockSubscriptionRepository) -> Router {
        let usecase = SubscriptionUseCase::new(Arc::new(subscription_repo));
        Router::new().nest("/subscriptions", router(Arc::new(usecase)))
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Option<String>, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get("content-type")
            .map(|value| value.to_str().unwrap().to_string());
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, content_type, body)
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_request(body: &str) -> Request<Body> {
        Request::builder()
            .uri("/subscriptions")
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn open_ended(price: i32, start: &str) -> SubscriptionEntity {
        let now = Utc::now();
        SubscriptionEntity {
            id: Uuid::new_v4(),
            service_name: "Netflix".to_string(),
            price,
            user_id: Uuid::new_v4(),
            start_date: start.parse::<BillingMonth>().unwrap().first_day(),
            end_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn aggregate_echoes_raw_months_with_total() {
        let subscription = open_ended(100, "01-2024");
        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_find_overlapping()
            .with(always(), eq(OverlapFilter::default()))
            .times(1)
            .returning(move |_, _| {
                let subscription = subscription.clone();
                Box::pin(async move { Ok(vec![subscription]) })
            });

        let (status, _, body) = send(
            test_app(subscription_repo),
            get_request("/subscriptions/aggregate?from=01-2024&to=02-2024&user_id=&service_name="),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "from": "01-2024", "to": "02-2024", "total": 200 }));
    }

    #[tokio::test]
    async fn aggregate_forwards_filters() {
        let user_id = Uuid::new_v4();
        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_find_overlapping()
            .with(
                always(),
                eq(OverlapFilter {
                    user_id: Some(user_id),
                    service_name: Some("Netflix".to_string()),
                }),
            )
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(Vec::new()) }));

        let (status, _, body) = send(
            test_app(subscription_repo),
            get_request(&format!(
                "/subscriptions/aggregate?from=01-2024&to=01-2024&user_id={user_id}&service_name=Netflix"
            )),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 0);
    }

    #[tokio::test]
    async fn aggregate_rejects_bad_windows_without_querying() {
        let cases = [
            (
                "/subscriptions/aggregate?to=02-2024",
                "from and to are required (MM-YYYY)",
            ),
            (
                "/subscriptions/aggregate?from=&to=02-2024",
                "from and to are required (MM-YYYY)",
            ),
            (
                "/subscriptions/aggregate?from=1-2024&to=02-2024",
                "invalid from format, expected MM-YYYY",
            ),
            (
                "/subscriptions/aggregate?from=01-2024&to=2024-02",
                "invalid to format, expected MM-YYYY",
            ),
            (
                "/subscriptions/aggregate?from=05-2024&to=01-2024",
                "from cannot be after to",
            ),
            (
                "/subscriptions/aggregate?from=01-2024&to=02-2024&user_id=42",
                "user_id must be a UUID",
            ),
        ];

        for (uri, message) in cases {
            let mut subscription_repo = MockSubscriptionRepository::new();
            subscription_repo.expect_find_overlapping().times(0);

            let (status, content_type, body) =
                send(test_app(subscription_repo), get_request(uri)).await;

            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(content_type.as_deref(), Some("application/json"), "{uri}");
            assert_eq!(body, json!({ "code": 400, "message": message }), "{uri}");
        }
    }

    #[tokio::test]
    async fn aggregate_hides_retrieval_failure_detail() {
        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_find_overlapping()
            .returning(|_, _| Box::pin(async { Err(anyhow::anyhow!("connection refused")) }));

        let (status, _, body) = send(
            test_app(subscription_repo),
            get_request("/subscriptions/aggregate?from=01-2024&to=02-2024"),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "code": 500, "message": "Internal server error" }));
    }

    #[tokio::test]
    async fn malformed_id_is_json_bad_request() {
        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo.expect_find_by_id().times(0);

        let (status, content_type, body) = send(
            test_app(subscription_repo),
            get_request("/subscriptions/not-a-uuid"),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(content_type.as_deref(), Some("application/json"));
        assert_eq!(body["code"], 400);
    }

    #[tokio::test]
    async fn malformed_bodies_are_json_bad_requests() {
        let bodies = [
            "{not json",
            r#"{"service_name":"Netflix","user_id":"60601fee-2bf1-4721-ae6f-7636e79a0cba","start_date":"07-2025"}"#,
        ];

        for raw in bodies {
            let mut subscription_repo = MockSubscriptionRepository::new();
            subscription_repo.expect_create().times(0);

            let (status, content_type, body) =
                send(test_app(subscription_repo), post_request(raw)).await;

            assert_eq!(status, StatusCode::BAD_REQUEST, "{raw}");
            assert_eq!(content_type.as_deref(), Some("application/json"), "{raw}");
            assert_eq!(body["code"], 400, "{raw}");
        }
    }

    #[tokio::test]
    async fn create_returns_created_row() {
        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo.expect_create().times(1).returning(|entity| {
            let now = Utc::now();
            let created = SubscriptionEntity {
                id: Uuid::new_v4(),
                service_name: entity.service_name,
                price: entity.price,
                user_id: entity.user_id,
                start_date: entity.start_date,
                end_date: entity.end_date,
                created_at: now,
                updated_at: now,
            };
            Box::pin(async move { Ok(created) })
        });

        let (status, _, body) = send(
            test_app(subscription_repo),
            post_request(
                r#"{"service_name":"Yandex Plus","price":400,"user_id":"60601fee-2bf1-4721-ae6f-7636e79a0cba","start_date":"07-2025"}"#,
            ),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["service_name"], "Yandex Plus");
        assert_eq!(body["start_date"], "2025-07-01");
        assert!(body.get("end_date").is_none());
    }

    #[tokio::test]
    async fn delete_missing_row_is_json_not_found() {
        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_delete()
            .returning(|_| Box::pin(async { Ok(false) }));

        let request = Request::builder()
            .uri(format!("/subscriptions/{}", Uuid::new_v4()))
            .method("DELETE")
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = send(test_app(subscription_repo), request).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "code": 404, "message": "not found" }));
    }

    #[test]
    fn empty_query_values_mean_no_filter() {
        assert_eq!(non_empty(Some(String::new())), None);
        assert_eq!(parse_user_id(Some(String::new())).unwrap(), None);
        assert_eq!(
            non_empty(Some("Netflix".to_string())),
            Some("Netflix".to_string())
        );
    }

    #[test]
    fn malformed_user_id_is_bad_request() {
        let err = parse_user_id(Some("42".to_string())).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn month_errors_name_the_field() {
        match parse_month("2024-01", "to") {
            Err(AppError::BadRequest(msg)) => {
                assert_eq!(msg, "invalid to format, expected MM-YYYY")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn list_paging_defaults_and_bounds() {
        let filter = list_filter(ListQuery::default()).unwrap();
        assert_eq!(filter.limit, DEFAULT_LIST_LIMIT);
        assert_eq!(filter.offset, 0);

        let filter = list_filter(ListQuery {
            limit: Some("1001".to_string()),
            offset: Some("-5".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(filter.limit, DEFAULT_LIST_LIMIT);
        assert_eq!(filter.offset, 0);

        let filter = list_filter(ListQuery {
            limit: Some("1000".to_string()),
            offset: Some("20".to_string()),
            service_name: Some("Yandex Plus".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(filter.limit, 1000);
        assert_eq!(filter.offset, 20);
        assert_eq!(filter.service_name.as_deref(), Some("Yandex Plus"));
    }
}
