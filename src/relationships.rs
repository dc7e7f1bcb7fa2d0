//! # Relationship Synchronisation
//!
//! A resource declares its relationships explicitly through
//! [`Resource::relationships`](crate::resource::Resource::relationships). When a create or
//! update payload carries a key named after one of them, the repository hands that part of
//! the payload to the relationship inside the same transaction as the parent row.
//!
//! ```rust,ignore
//! fn relationships() -> Vec<Box<dyn Relationship<Person>>> {
//!     vec![
//!         Box::new(ChildRelation::<Pet>::has_many("pets", pet::Column::OwnerId)),
//!         Box::new(ChildRelation::<Passport>::has_one("passport", passport::Column::PersonId)
//!             .with_policy(SyncPolicy::Append)),
//!     ]
//! }
//! ```
//!
//! With the default [`SyncPolicy::Replace`], a payload of
//! `{"pets": [{"id": 4, "name": "Rex"}, {"name": "Tom"}]}` updates pet 4, inserts Tom,
//! and deletes any other pet linked to the person.

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    IdenStatic, IntoActiveModel, ModelTrait, QueryFilter, QueryOrder,
};
use serde_json::{Map, Value};

use crate::errors::ApiError;
use crate::repository::{assign_fillable, new_row, parse_key};
use crate::resource::Resource;

/// Why a relationship is being synchronised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncIntent {
    Creating,
    Updating,
    Deleting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    HasOne,
    HasMany,
}

/// What happens to linked rows missing from a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPolicy {
    /// Linked rows absent from the payload are deleted, and all of them go with the parent.
    #[default]
    Replace,
    /// Payload rows are upserted; nothing is ever deleted.
    Append,
}

#[async_trait]
pub trait Relationship<P: Resource>: Send + Sync {
    /// Payload key and eager-load name.
    fn name(&self) -> &'static str;

    fn cardinality(&self) -> Cardinality;

    /// Apply `payload` to the rows linked to `parent`. Returns whether any linked row
    /// changed.
    ///
    /// # Errors
    ///
    /// Any error aborts the surrounding save, rolling the transaction back.
    async fn sync(
        &self,
        txn: &DatabaseTransaction,
        parent: &P::Model,
        payload: &Value,
        intent: SyncIntent,
    ) -> Result<bool, ApiError>;

    /// Load the linked rows of every parent, one JSON value per parent in order.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Database` if the query fails.
    async fn load(
        &self,
        db: &DatabaseConnection,
        parents: &[P::Model],
    ) -> Result<Vec<Value>, ApiError>;
}

/// Child rows of resource `C` pointing at their parent through `foreign_key`.
///
/// The foreign key column must have the same Rust type as the parent's primary key.
pub struct ChildRelation<C: Resource> {
    name: &'static str,
    cardinality: Cardinality,
    foreign_key: C::ColumnType,
    policy: SyncPolicy,
}

impl<C: Resource> ChildRelation<C> {
    #[must_use]
    pub fn has_many(name: &'static str, foreign_key: C::ColumnType) -> Self {
        Self {
            name,
            cardinality: Cardinality::HasMany,
            foreign_key,
            policy: SyncPolicy::default(),
        }
    }

    #[must_use]
    pub fn has_one(name: &'static str, foreign_key: C::ColumnType) -> Self {
        Self {
            name,
            cardinality: Cardinality::HasOne,
            foreign_key,
            policy: SyncPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: SyncPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn policy(&self) -> SyncPolicy {
        self.policy
    }

    fn items<'a>(&self, payload: &'a Value) -> Result<Vec<&'a Map<String, Value>>, ApiError> {
        let shape_error = || {
            let expected = match self.cardinality {
                Cardinality::HasMany => "an array of objects",
                Cardinality::HasOne => "an object or null",
            };
            ApiError::bad_request(format!("Relationship '{}' expects {expected}", self.name))
        };

        match (self.cardinality, payload) {
            (Cardinality::HasMany, Value::Array(items)) => items
                .iter()
                .map(|item| item.as_object().ok_or_else(shape_error))
                .collect(),
            (Cardinality::HasOne, Value::Object(item)) => Ok(vec![item]),
            (Cardinality::HasOne, Value::Null) => Ok(Vec::new()),
            _ => Err(shape_error()),
        }
    }

    /// Update the linked child named by the item's id, or insert a new one.
    async fn upsert(
        &self,
        txn: &DatabaseTransaction,
        parent_key: &sea_orm::Value,
        item: &Map<String, Value>,
    ) -> Result<C::Model, ApiError> {
        let existing = match item.get(C::ID_COLUMN.as_str()).and_then(parse_key::<C>) {
            Some(id) => C::EntityType::find_by_id(id)
                .filter(self.foreign_key.eq(parent_key.clone()))
                .one(txn)
                .await
                .map_err(ApiError::persistence)?,
            None => None,
        };

        let saved = match existing {
            Some(model) => {
                let target = model.clone().into_active_model();
                let mut child = assign_fillable::<C>(target, &model, item)?;
                child.set(self.foreign_key, parent_key.clone());
                child.update(txn).await
            }
            None => {
                let mut child = assign_fillable::<C>(new_row::<C>(), &C::Model::default(), item)?;
                child.set(self.foreign_key, parent_key.clone());
                child.insert(txn).await
            }
        };

        saved.map_err(ApiError::persistence)
    }

    /// Delete linked children whose ids are not in `kept`.
    async fn detach(
        &self,
        txn: &DatabaseTransaction,
        parent_key: &sea_orm::Value,
        kept: Vec<sea_orm::Value>,
    ) -> Result<bool, ApiError> {
        let mut query =
            C::EntityType::delete_many().filter(self.foreign_key.eq(parent_key.clone()));
        if !kept.is_empty() {
            query = query.filter(C::ID_COLUMN.is_not_in(kept));
        }
        let result = query.exec(txn).await.map_err(ApiError::persistence)?;
        Ok(result.rows_affected > 0)
    }
}

#[async_trait]
impl<P: Resource, C: Resource> Relationship<P> for ChildRelation<C> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    async fn sync(
        &self,
        txn: &DatabaseTransaction,
        parent: &P::Model,
        payload: &Value,
        intent: SyncIntent,
    ) -> Result<bool, ApiError> {
        let parent_key = parent.get(P::ID_COLUMN);

        if intent == SyncIntent::Deleting {
            return match self.policy {
                SyncPolicy::Replace => self.detach(txn, &parent_key, Vec::new()).await,
                SyncPolicy::Append => Ok(false),
            };
        }

        let items = self.items(payload)?;
        let mut kept = Vec::with_capacity(items.len());
        for item in items {
            let child = self.upsert(txn, &parent_key, item).await?;
            kept.push(child.get(C::ID_COLUMN));
        }

        let upserted = !kept.is_empty();
        let removed = match self.policy {
            SyncPolicy::Replace => self.detach(txn, &parent_key, kept).await?,
            SyncPolicy::Append => false,
        };

        tracing::debug!(
            relationship = self.name,
            intent = ?intent,
            upserted,
            removed,
            "Synchronised relationship"
        );
        Ok(upserted || removed)
    }

    async fn load(
        &self,
        db: &DatabaseConnection,
        parents: &[P::Model],
    ) -> Result<Vec<Value>, ApiError> {
        let keys: Vec<sea_orm::Value> = parents
            .iter()
            .map(|parent| parent.get(P::ID_COLUMN))
            .collect();
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let children = C::EntityType::find()
            .filter(self.foreign_key.is_in(keys.clone()))
            .order_by_asc(C::ID_COLUMN)
            .all(db)
            .await
            .map_err(ApiError::database)?;

        keys.iter()
            .map(|key| {
                let mut linked = children
                    .iter()
                    .filter(|child| child.get(self.foreign_key) == *key);
                match self.cardinality {
                    Cardinality::HasMany => serde_json::to_value(linked.collect::<Vec<_>>()),
                    Cardinality::HasOne => serde_json::to_value(linked.next()),
                }
                .map_err(ApiError::serialization)
            })
            .collect()
    }
}
