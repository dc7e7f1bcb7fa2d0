//! People and their pets, served through the generic resource routes.
//!
//! ```bash
//! cargo run --example people_api
//! ```
//!
//! Then try:
//!
//! ```bash
//! curl -X POST localhost:3000/people -H 'content-type: application/json' \
//!   -d '{"person": {"name": "Alice", "pets": [{"name": "Rex"}]}}'
//! ```
//!
//! - `curl 'localhost:3000/people?with=pets&perPage=5'`
//! - **OpenAPI**: <http://localhost:3000/openapi.json>

use axum::{Json, Router, routing::get};
use resourcekit::{ChildRelation, Envelope, Relationship, Repository, Resource, Settings, router};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, Schema};
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;

mod person {
    use sea_orm::entity::prelude::*;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
    #[sea_orm(table_name = "people")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub name: String,
        pub email: Option<String>,
        pub active: bool,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    /// New people start out active.
    impl Default for Model {
        fn default() -> Self {
            Self {
                id: 0,
                name: String::new(),
                email: None,
                active: true,
            }
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

mod pet {
    use sea_orm::entity::prelude::*;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, Default, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
    #[sea_orm(table_name = "pets")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub person_id: i32,
        pub name: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

struct Person;

impl Resource for Person {
    type EntityType = person::Entity;
    type Model = person::Model;
    type ActiveModel = person::ActiveModel;
    type ColumnType = person::Column;
    type Id = i32;

    const ID_COLUMN: person::Column = person::Column::Id;
    const KEY_IDENTIFIER: &'static str = "person";
    const RESOURCE_NAME_SINGULAR: &'static str = "person";
    const RESOURCE_NAME_PLURAL: &'static str = "people";
    const ACTIVE_COLUMN: Option<person::Column> = Some(person::Column::Active);

    fn fillable_columns() -> Vec<person::Column> {
        vec![person::Column::Name, person::Column::Email]
    }

    fn relationships() -> Vec<Box<dyn Relationship<Self>>> {
        vec![Box::new(ChildRelation::<Pet>::has_many(
            "pets",
            pet::Column::PersonId,
        ))]
    }
}

struct Pet;

impl Resource for Pet {
    type EntityType = pet::Entity;
    type Model = pet::Model;
    type ActiveModel = pet::ActiveModel;
    type ColumnType = pet::Column;
    type Id = i32;

    const ID_COLUMN: pet::Column = pet::Column::Id;
    const KEY_IDENTIFIER: &'static str = "pet";
    const RESOURCE_NAME_SINGULAR: &'static str = "pet";
    const RESOURCE_NAME_PLURAL: &'static str = "pets";

    fn fillable_columns() -> Vec<pet::Column> {
        vec![pet::Column::Name]
    }
}

#[derive(OpenApi)]
#[openapi(components(schemas(Envelope)))]
struct ApiDoc;

async fn create_tables(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);
    let people = schema
        .create_table_from_entity(person::Entity)
        .if_not_exists()
        .to_owned();
    let pets = schema
        .create_table_from_entity(pet::Entity)
        .if_not_exists()
        .to_owned();

    db.execute(backend.build(&people)).await?;
    db.execute(backend.build(&pets)).await?;
    Ok(())
}

async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::load()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&settings.log_filter))
        .init();

    let db = settings.connect().await?;
    create_tables(&db).await?;

    let app = Router::new()
        .nest(
            "/people",
            router(Repository::<Person>::new(db.clone()).with_limits(settings.pagination)),
        )
        .nest(
            "/pets",
            router(Repository::<Pet>::new(db).with_limits(settings.pagination)),
        )
        .route("/openapi.json", get(openapi));

    let listener = tokio::net::TcpListener::bind(&settings.bind_address).await?;
    tracing::info!(address = %settings.bind_address, "Serving people API");
    axum::serve(listener, app).await?;

    Ok(())
}
