#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use resourcekit::{
    ApiError, ChildRelation, Relationship, Repository, Resource, SyncIntent, SyncPolicy, router,
};
use sea_orm::{
    ConnectionTrait, Database, DatabaseConnection, DatabaseTransaction, DbErr, Schema,
};
use serde_json::Value;
use tower::ServiceExt;

pub mod person_entity;
pub mod pet_entity;

pub struct Person;

impl Resource for Person {
    type EntityType = person_entity::Entity;
    type Model = person_entity::Model;
    type ActiveModel = person_entity::ActiveModel;
    type ColumnType = person_entity::Column;
    type Id = i32;

    const ID_COLUMN: person_entity::Column = person_entity::Column::Id;
    const KEY_IDENTIFIER: &'static str = "person";
    const RESOURCE_NAME_SINGULAR: &'static str = "person";
    const RESOURCE_NAME_PLURAL: &'static str = "people";
    const ACTIVE_COLUMN: Option<person_entity::Column> = Some(person_entity::Column::Active);

    fn fillable_columns() -> Vec<person_entity::Column> {
        vec![
            person_entity::Column::Name,
            person_entity::Column::Email,
            person_entity::Column::Active,
        ]
    }

    fn relationships() -> Vec<Box<dyn Relationship<Self>>> {
        vec![Box::new(ChildRelation::<Pet>::has_many(
            "pets",
            pet_entity::Column::PersonId,
        ))]
    }
}

pub struct Pet;

impl Resource for Pet {
    type EntityType = pet_entity::Entity;
    type Model = pet_entity::Model;
    type ActiveModel = pet_entity::ActiveModel;
    type ColumnType = pet_entity::Column;
    type Id = i32;

    const ID_COLUMN: pet_entity::Column = pet_entity::Column::Id;
    const KEY_IDENTIFIER: &'static str = "pet";
    const RESOURCE_NAME_SINGULAR: &'static str = "pet";
    const RESOURCE_NAME_PLURAL: &'static str = "pets";

    fn fillable_columns() -> Vec<pet_entity::Column> {
        vec![pet_entity::Column::Name, pet_entity::Column::Species]
    }
}

/// Same table as [`Person`], plus an `audit` relationship that rejects every save with the
/// status given in its payload. Deletes are rejected with 409.
pub struct AuditedPerson;

impl Resource for AuditedPerson {
    type EntityType = person_entity::Entity;
    type Model = person_entity::Model;
    type ActiveModel = person_entity::ActiveModel;
    type ColumnType = person_entity::Column;
    type Id = i32;

    const ID_COLUMN: person_entity::Column = person_entity::Column::Id;
    const KEY_IDENTIFIER: &'static str = "person";
    const RESOURCE_NAME_SINGULAR: &'static str = "person";
    const RESOURCE_NAME_PLURAL: &'static str = "people";
    const ACTIVE_COLUMN: Option<person_entity::Column> = Some(person_entity::Column::Active);

    fn fillable_columns() -> Vec<person_entity::Column> {
        vec![person_entity::Column::Name, person_entity::Column::Email]
    }

    fn relationships() -> Vec<Box<dyn Relationship<Self>>> {
        vec![
            Box::new(ChildRelation::<Pet>::has_many(
                "pets",
                pet_entity::Column::PersonId,
            )),
            Box::new(RejectingAudit),
        ]
    }
}

/// Same table as [`Person`]; pets are only ever added, never removed.
pub struct Keeper;

impl Resource for Keeper {
    type EntityType = person_entity::Entity;
    type Model = person_entity::Model;
    type ActiveModel = person_entity::ActiveModel;
    type ColumnType = person_entity::Column;
    type Id = i32;

    const ID_COLUMN: person_entity::Column = person_entity::Column::Id;
    const KEY_IDENTIFIER: &'static str = "keeper";
    const RESOURCE_NAME_SINGULAR: &'static str = "keeper";
    const RESOURCE_NAME_PLURAL: &'static str = "keepers";

    fn fillable_columns() -> Vec<person_entity::Column> {
        vec![person_entity::Column::Name]
    }

    fn relationships() -> Vec<Box<dyn Relationship<Self>>> {
        vec![Box::new(
            ChildRelation::<Pet>::has_many("pets", pet_entity::Column::PersonId)
                .with_policy(SyncPolicy::Append),
        )]
    }
}

/// Same table as [`Person`], with a single `favourite` pet.
pub struct Sponsor;

impl Resource for Sponsor {
    type EntityType = person_entity::Entity;
    type Model = person_entity::Model;
    type ActiveModel = person_entity::ActiveModel;
    type ColumnType = person_entity::Column;
    type Id = i32;

    const ID_COLUMN: person_entity::Column = person_entity::Column::Id;
    const KEY_IDENTIFIER: &'static str = "sponsor";
    const RESOURCE_NAME_SINGULAR: &'static str = "sponsor";
    const RESOURCE_NAME_PLURAL: &'static str = "sponsors";

    fn fillable_columns() -> Vec<person_entity::Column> {
        vec![person_entity::Column::Name]
    }

    fn relationships() -> Vec<Box<dyn Relationship<Self>>> {
        vec![Box::new(ChildRelation::<Pet>::has_one(
            "favourite",
            pet_entity::Column::PersonId,
        ))]
    }
}

pub struct RejectingAudit;

#[async_trait]
impl Relationship<AuditedPerson> for RejectingAudit {
    fn name(&self) -> &'static str {
        "audit"
    }

    fn cardinality(&self) -> resourcekit::Cardinality {
        resourcekit::Cardinality::HasOne
    }

    async fn sync(
        &self,
        _txn: &DatabaseTransaction,
        _parent: &person_entity::Model,
        payload: &Value,
        _intent: SyncIntent,
    ) -> Result<bool, ApiError> {
        let code = payload
            .as_u64()
            .and_then(|code| u16::try_from(code).ok())
            .and_then(|code| StatusCode::from_u16(code).ok())
            .unwrap_or(StatusCode::CONFLICT);
        Err(ApiError::custom(code, "Audit rejected the change", None))
    }

    async fn load(
        &self,
        _db: &DatabaseConnection,
        parents: &[person_entity::Model],
    ) -> Result<Vec<Value>, ApiError> {
        Ok(vec![Value::Null; parents.len()])
    }
}

pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect("sqlite::memory:").await?;
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    db.execute(backend.build(&schema.create_table_from_entity(person_entity::Entity)))
        .await?;
    db.execute(backend.build(&schema.create_table_from_entity(pet_entity::Entity)))
        .await?;

    Ok(db)
}

pub fn setup_test_app(db: DatabaseConnection) -> Router {
    Router::new()
        .nest("/people", router(Repository::<Person>::new(db.clone())))
        .nest("/pets", router(Repository::<Pet>::new(db)))
}

/// Send a request and decode the JSON envelope that comes back.
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<&str>,
) -> (StatusCode, HeaderMap, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.map_or_else(Body::empty, |body| Body::from(body.to_string())))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let envelope = serde_json::from_slice(&bytes).unwrap();
    (status, headers, envelope)
}

pub async fn seed_people(db: &DatabaseConnection, count: usize) {
    let repository = Repository::<Person>::new(db.clone());
    for n in 1..=count {
        let data = serde_json::json!({ "name": format!("Person {n}") });
        let outcome = repository.create(data.as_object().unwrap()).await.unwrap();
        assert!(outcome.success());
    }
}
