//! Generic HTTP handlers for any [`Resource`].
//!
//! | Method        | Path    | Operation                                            |
//! |---------------|---------|------------------------------------------------------|
//! | `POST`        | `/`     | [`Repository::create`]                               |
//! | `GET`         | `/`     | get, filter, paginate or get with relationships      |
//! | `GET`         | `/{id}` | [`Repository::find`] or find with relationships      |
//! | `PUT`/`PATCH` | `/{id}` | [`Repository::update`]                               |
//! | `DELETE`      | `/{id}` | [`Repository::delete`]                               |
//!
//! Create and update bodies wrap their payload under the resource's key identifier:
//! `{"person": {"name": "Alice"}}`. A body without it is answered with a 400 envelope and
//! never reaches the repository.

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    response::{IntoResponse, Response},
    routing::get,
};
use hyper::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::IntoParams;

use crate::envelope::respond;
use crate::errors::ApiError;
use crate::filter::Filter;
use crate::outcome::{Listing, Outcome};
use crate::pagination::{Page, PageRequest, calculate_content_range};
use crate::repository::Repository;
use crate::resource::Resource;

/// Query parameters accepted by the listing route.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListParams {
    /// Page size. Its presence (or `page`'s) switches to a paginated listing.
    #[serde(rename = "perPage")]
    pub per_page: Option<String>,
    /// 1-based page number
    pub page: Option<String>,
    /// JSON object of field → value, e.g. `{"active": true}`
    pub filter: Option<String>,
    /// Comma separated relationship names to eager-load
    pub with: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RelationParams {
    pub with: Option<String>,
}

pub async fn create_one<R>(
    State(repository): State<Repository<R>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response
where
    R: Resource,
{
    let Some(data) = keyed_payload::<R>(body) else {
        return missing_key::<R>();
    };
    render(repository.create(&data).await)
}

pub async fn list<R>(
    State(repository): State<Repository<R>>,
    Query(params): Query<ListParams>,
) -> Response
where
    R: Resource,
{
    let filter = match Filter::parse(params.filter.as_deref()) {
        Ok(filter) => filter,
        Err(err) => return err.into_response(),
    };
    let relations = relation_names(params.with.as_deref());
    let page = (params.per_page.is_some() || params.page.is_some()).then(|| {
        PageRequest::resolve(
            params.per_page.as_deref(),
            params.page.as_deref(),
            repository.limits(),
        )
    });

    if !relations.is_empty() {
        return match repository
            .get_with_relationships(&relations, &filter, page)
            .await
        {
            Ok(outcome) => {
                let headers = match &outcome.data {
                    Listing::Page(page) => page_headers::<R, _>(page),
                    Listing::Items(_) => HeaderMap::new(),
                };
                (headers, respond(outcome)).into_response()
            }
            Err(err) => err.into_response(),
        };
    }

    if let Some(request) = page {
        return match repository.paginate(&filter, request).await {
            Ok(outcome) => {
                let headers = page_headers::<R, _>(&outcome.data);
                (headers, respond(outcome)).into_response()
            }
            Err(err) => err.into_response(),
        };
    }

    if filter.is_empty() {
        render(repository.get().await)
    } else {
        render(repository.filter(&filter).await)
    }
}

pub async fn get_one<R>(
    State(repository): State<Repository<R>>,
    Path(raw_id): Path<String>,
    Query(params): Query<RelationParams>,
) -> Response
where
    R: Resource,
{
    let Some(id) = parse_id::<R>(&raw_id) else {
        return missing_key::<R>();
    };
    let relations = relation_names(params.with.as_deref());
    if relations.is_empty() {
        render(repository.find(id).await)
    } else {
        render(repository.find_with_relationships(id, &relations).await)
    }
}

pub async fn update_one<R>(
    State(repository): State<Repository<R>>,
    Path(raw_id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response
where
    R: Resource,
{
    let Some(data) = keyed_payload::<R>(body) else {
        return missing_key::<R>();
    };
    let Some(id) = parse_id::<R>(&raw_id) else {
        return missing_key::<R>();
    };
    render(repository.update(id, &data).await)
}

pub async fn delete_one<R>(
    State(repository): State<Repository<R>>,
    Path(raw_id): Path<String>,
) -> Response
where
    R: Resource,
{
    let Some(id) = parse_id::<R>(&raw_id) else {
        return missing_key::<R>();
    };
    render(repository.delete(id).await)
}

/// Mount the five resource routes over `repository`.
///
/// ```rust,ignore
/// let app = Router::new().nest("/people", router(Repository::<Person>::new(db)));
/// ```
pub fn router<R>(repository: Repository<R>) -> Router
where
    R: Resource,
{
    Router::new()
        .route("/", get(list::<R>).post(create_one::<R>))
        .route(
            "/{id}",
            get(get_one::<R>)
                .put(update_one::<R>)
                .patch(update_one::<R>)
                .delete(delete_one::<R>),
        )
        .with_state(repository)
}

fn render<T: Serialize>(result: Result<Outcome<T>, ApiError>) -> Response {
    match result {
        Ok(outcome) => respond(outcome),
        Err(err) => err.into_response(),
    }
}

fn missing_key<R: Resource>() -> Response {
    tracing::debug!(
        key = R::KEY_IDENTIFIER,
        "Request rejected without key identifier"
    );
    ApiError::missing_key(R::MISSING_KEY_MESSAGE).into_response()
}

/// The object under the resource's key identifier. A non-object value there counts as an
/// empty payload; a missing key or unreadable body yields `None`.
fn keyed_payload<R: Resource>(
    body: Result<Json<Value>, JsonRejection>,
) -> Option<Map<String, Value>> {
    let Ok(Json(Value::Object(mut body))) = body else {
        return None;
    };
    match body.remove(R::KEY_IDENTIFIER)? {
        Value::Object(fields) => Some(fields),
        _ => Some(Map::new()),
    }
}

fn parse_id<R: Resource>(raw: &str) -> Option<R::Id> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    raw.parse().ok()
}

fn relation_names(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(String::from)
        .collect()
}

fn page_headers<R: Resource, T>(page: &Page<T>) -> HeaderMap {
    calculate_content_range(
        page.current_page.saturating_sub(1).saturating_mul(page.per_page),
        page.per_page,
        page.total,
        R::RESOURCE_NAME_PLURAL,
    )
}
