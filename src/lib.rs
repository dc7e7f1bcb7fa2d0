//! Generic resource repositories and HTTP controllers for Sea-ORM entities.
//!
//! Implement [`Resource`] for an entity, wrap a connection in a [`Repository`], and mount
//! [`router`] to get create, list, show, update and delete endpoints. Every response is an
//! [`Envelope`].
//!
//! ```rust,ignore
//! let settings = Settings::load()?;
//! let db = settings.connect().await?;
//! let people = Repository::<Person>::new(db).with_limits(settings.pagination);
//! let app = Router::new().nest("/people", router(people));
//! ```

pub mod config;
pub mod envelope;
pub mod errors;
pub mod filter;
pub mod outcome;
pub mod pagination;
pub mod relationships;
pub mod repository;
pub mod resource;
pub mod routes;

pub use config::{ConfigError, Settings};
pub use envelope::{Envelope, respond};
pub use errors::ApiError;
pub use filter::Filter;
pub use outcome::{FAILURE_MESSAGE, Listing, Outcome, Record};
pub use pagination::{Page, PageLimits, PageRequest};
pub use relationships::{Cardinality, ChildRelation, Relationship, SyncIntent, SyncPolicy};
pub use repository::Repository;
pub use resource::Resource;
pub use routes::router;
pub use serde_with;
