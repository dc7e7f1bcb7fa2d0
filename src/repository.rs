//! # Generic Repository
//!
//! [`Repository`] implements every store operation once, for any [`Resource`]. Reads
//! report store faults as `Err(ApiError::Database)`. Writes run inside a transaction; a
//! fault there is rolled back, logged, and reported as an `Outcome` carrying the fault's
//! status, [`FAILURE_MESSAGE`] and `false` as data.

use std::marker::PhantomData;

use axum::http::StatusCode;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, Condition, DatabaseConnection, DatabaseTransaction,
    EntityTrait, IdenStatic, IntoActiveModel, Iterable, ModelTrait, PaginatorTrait,
    PrimaryKeyToColumn, QueryFilter, QueryOrder, TransactionTrait,
};
use serde_json::{Map, Value};

use crate::errors::ApiError;
use crate::filter::Filter;
use crate::outcome::{FAILURE_MESSAGE, Listing, Outcome, Record};
use crate::pagination::{Page, PageLimits, PageRequest};
use crate::relationships::{Relationship, SyncIntent};
use crate::resource::Resource;

pub const CREATED_MESSAGE: &str = "New entry has been added";
pub const UPDATED_MESSAGE: &str = "The entry has been updated.";
pub const DELETED_MESSAGE: &str = "Entry has been deleted.";

pub struct Repository<R: Resource> {
    db: DatabaseConnection,
    limits: PageLimits,
    _resource: PhantomData<fn() -> R>,
}

impl<R: Resource> Clone for Repository<R> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            limits: self.limits,
            _resource: PhantomData,
        }
    }
}

impl<R: Resource> Repository<R> {
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            limits: PageLimits::default(),
            _resource: PhantomData,
        }
    }

    #[must_use]
    pub fn with_limits(mut self, limits: PageLimits) -> Self {
        self.limits = limits;
        self
    }

    #[must_use]
    pub fn limits(&self) -> PageLimits {
        self.limits
    }

    /// `"<plural> – Records found"`
    #[must_use]
    pub fn found_message() -> String {
        format!("{} – Records found", R::RESOURCE_NAME_PLURAL)
    }

    /// Every row, ordered by primary key.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Database` if the query fails.
    pub async fn all(&self) -> Result<Outcome<Vec<R::Model>>, ApiError> {
        self.filter(&Filter::default()).await
    }

    /// Alias of [`Repository::all`] used by the unfiltered listing route.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Database` if the query fails.
    pub async fn get(&self) -> Result<Outcome<Vec<R::Model>>, ApiError> {
        self.all().await
    }

    /// The row with the lowest primary key, if any.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Database` if the query fails.
    pub async fn first(&self) -> Result<Outcome<Option<R::Model>>, ApiError> {
        let model = R::EntityType::find()
            .order_by_asc(R::ID_COLUMN)
            .one(&self.db)
            .await
            .map_err(ApiError::database)?;
        Ok(Outcome::ok(Self::found_message(), model))
    }

    /// # Errors
    ///
    /// Returns `ApiError::Database` if the query fails.
    pub async fn find(&self, id: R::Id) -> Result<Outcome<Option<R::Model>>, ApiError> {
        let model = self.fetch(id).await?;
        Ok(Outcome::ok(Self::found_message(), model))
    }

    /// Rows matching every field of `filter`, ordered by primary key.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::BadRequest` for unknown fields and `ApiError::Database` if the
    /// query fails.
    pub async fn filter(&self, filter: &Filter) -> Result<Outcome<Vec<R::Model>>, ApiError> {
        let condition = filter.condition::<R>()?;
        let models = self.fetch_all(condition).await?;
        tracing::debug!(
            resource = R::RESOURCE_NAME_PLURAL,
            count = models.len(),
            "Listed records"
        );
        Ok(Outcome::ok(Self::found_message(), models))
    }

    /// # Errors
    ///
    /// Returns `ApiError::BadRequest` for unknown filter fields and `ApiError::Database` if
    /// a query fails.
    pub async fn paginate(
        &self,
        filter: &Filter,
        request: PageRequest,
    ) -> Result<Outcome<Page<R::Model>>, ApiError> {
        let condition = filter.condition::<R>()?;
        let request = request.bounded();
        let (models, total) = self.fetch_page(condition, request).await?;
        Ok(Outcome::ok(
            Self::found_message(),
            Page::new(models, request, total),
        ))
    }

    /// Insert a row from the fillable fields of `data`, then synchronise any relationship
    /// payloads it carries.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::BadRequest` when `data` is empty. Faults while saving are
    /// reported through the outcome instead.
    pub async fn create(
        &self,
        data: &Map<String, Value>,
    ) -> Result<Outcome<Record<R::Model>>, ApiError> {
        if data.is_empty() {
            return Err(ApiError::bad_request(format!(
                "No {} data provided",
                R::RESOURCE_NAME_SINGULAR
            )));
        }

        let base = R::Model::default();
        Ok(
            match self.save(new_row::<R>(), &base, data, SyncIntent::Creating).await {
                Ok(model) => {
                    tracing::info!(resource = R::RESOURCE_NAME_SINGULAR, "Created entry");
                    Outcome::created(CREATED_MESSAGE, Record::Found(model))
                }
                Err(err) => Self::recovered(&err, "create", Record::Missing),
            },
        )
    }

    /// Apply the fillable fields of `data` to the row `id`.
    ///
    /// An unknown `id` yields a 400 outcome with `false` as data.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Database` if looking the row up fails.
    pub async fn update(
        &self,
        id: R::Id,
        data: &Map<String, Value>,
    ) -> Result<Outcome<Record<R::Model>>, ApiError> {
        let Some(existing) = self.fetch(id.clone()).await? else {
            return Ok(Self::not_found(&id, Record::Missing));
        };

        let target = existing.clone().into_active_model();
        Ok(
            match self.save(target, &existing, data, SyncIntent::Updating).await {
                Ok(model) => {
                    tracing::info!(resource = R::RESOURCE_NAME_SINGULAR, id = %id, "Updated entry");
                    Outcome::ok(UPDATED_MESSAGE, Record::Found(model))
                }
                Err(err) => Self::recovered(&err, "update", Record::Missing),
            },
        )
    }

    /// Delete the row `id`. Rows with an active flag are deactivated first, inside the
    /// same transaction, so delete hooks observe `active = false`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Database` if looking the row up fails.
    pub async fn delete(&self, id: R::Id) -> Result<Outcome<bool>, ApiError> {
        let Some(existing) = self.fetch(id.clone()).await? else {
            return Ok(Self::not_found(&id, false));
        };

        let txn = match self.db.begin().await {
            Ok(txn) => txn,
            Err(err) => return Ok(Self::recovered(&ApiError::persistence(err), "delete", false)),
        };
        let result = match Self::remove(&txn, &id, existing).await {
            Ok(()) => txn.commit().await.map_err(ApiError::persistence),
            Err(err) => {
                Self::rollback(txn).await;
                Err(err)
            }
        };

        Ok(match result {
            Ok(()) => {
                tracing::info!(resource = R::RESOURCE_NAME_SINGULAR, id = %id, "Deleted entry");
                Outcome::ok(DELETED_MESSAGE, true)
            }
            Err(err) => Self::recovered(&err, "delete", false),
        })
    }

    /// Rows with the named relationships attached under their names. `page` switches to a
    /// paginated listing.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::BadRequest` for unknown relationships or filter fields and
    /// `ApiError::Database` if a query fails.
    pub async fn get_with_relationships(
        &self,
        names: &[String],
        filter: &Filter,
        page: Option<PageRequest>,
    ) -> Result<Outcome<Listing<Value>>, ApiError> {
        let relations = Self::resolve(names)?;
        let condition = filter.condition::<R>()?;

        let listing = match page.map(PageRequest::bounded) {
            Some(request) => {
                let (models, total) = self.fetch_page(condition, request).await?;
                let rows = self.attach(&models, &relations).await?;
                Listing::Page(Page::new(rows, request, total))
            }
            None => {
                let models = self.fetch_all(condition).await?;
                Listing::Items(self.attach(&models, &relations).await?)
            }
        };
        Ok(Outcome::ok(Self::found_message(), listing))
    }

    /// # Errors
    ///
    /// Returns `ApiError::BadRequest` for unknown relationships and `ApiError::Database` if
    /// a query fails.
    pub async fn find_with_relationships(
        &self,
        id: R::Id,
        names: &[String],
    ) -> Result<Outcome<Option<Value>>, ApiError> {
        let relations = Self::resolve(names)?;
        let row = match self.fetch(id).await? {
            Some(model) => self
                .attach(std::slice::from_ref(&model), &relations)
                .await?
                .into_iter()
                .next(),
            None => None,
        };
        Ok(Outcome::ok(Self::found_message(), row))
    }

    async fn fetch(&self, id: R::Id) -> Result<Option<R::Model>, ApiError> {
        R::EntityType::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(ApiError::database)
    }

    async fn fetch_all(&self, condition: Condition) -> Result<Vec<R::Model>, ApiError> {
        R::EntityType::find()
            .filter(condition)
            .order_by_asc(R::ID_COLUMN)
            .all(&self.db)
            .await
            .map_err(ApiError::database)
    }

    /// `request` must be [bounded](PageRequest::bounded).
    async fn fetch_page(
        &self,
        condition: Condition,
        request: PageRequest,
    ) -> Result<(Vec<R::Model>, u64), ApiError> {
        let paginator = R::EntityType::find()
            .filter(condition)
            .order_by_asc(R::ID_COLUMN)
            .paginate(&self.db, request.per_page);
        let total = paginator.num_items().await.map_err(ApiError::database)?;
        let models = paginator
            .fetch_page(request.page - 1)
            .await
            .map_err(ApiError::database)?;
        Ok((models, total))
    }

    async fn save(
        &self,
        target: R::ActiveModel,
        base: &R::Model,
        data: &Map<String, Value>,
        intent: SyncIntent,
    ) -> Result<R::Model, ApiError> {
        let txn = self.db.begin().await.map_err(ApiError::persistence)?;
        match Self::persist(&txn, target, base, data, intent).await {
            Ok(model) => {
                txn.commit().await.map_err(ApiError::persistence)?;
                Ok(model)
            }
            Err(err) => {
                Self::rollback(txn).await;
                Err(err)
            }
        }
    }

    async fn persist(
        txn: &DatabaseTransaction,
        target: R::ActiveModel,
        base: &R::Model,
        data: &Map<String, Value>,
        intent: SyncIntent,
    ) -> Result<R::Model, ApiError> {
        let active = assign_fillable::<R>(target, base, data)?;
        let saved = match intent {
            SyncIntent::Creating => active.insert(txn).await.map_err(ApiError::persistence)?,
            _ if !active.is_changed() => base.clone(),
            _ => active.update(txn).await.map_err(ApiError::persistence)?,
        };

        let mut synced = false;
        for relation in R::relationships() {
            if let Some(payload) = data.get(relation.name()) {
                synced |= relation.sync(txn, &saved, payload, intent).await?;
            }
        }
        if !synced {
            return Ok(saved);
        }

        // Save the parent again so its own hooks run after the children changed.
        saved
            .into_active_model()
            .reset_all()
            .update(txn)
            .await
            .map_err(ApiError::persistence)
    }

    async fn remove(
        txn: &DatabaseTransaction,
        id: &R::Id,
        mut model: R::Model,
    ) -> Result<(), ApiError> {
        if let Some(active) = R::ACTIVE_COLUMN {
            let mut deactivated = model.into_active_model();
            deactivated.set(active, sea_orm::Value::from(false));
            deactivated
                .update(txn)
                .await
                .map_err(ApiError::persistence)?;
            model = R::EntityType::find_by_id(id.clone())
                .one(txn)
                .await
                .map_err(ApiError::persistence)?
                .ok_or_else(|| {
                    ApiError::not_found(R::RESOURCE_NAME_SINGULAR, Some(id.to_string()))
                })?;
        }

        for relation in R::relationships() {
            relation
                .sync(txn, &model, &Value::Null, SyncIntent::Deleting)
                .await?;
        }

        let result = model
            .into_active_model()
            .delete(txn)
            .await
            .map_err(ApiError::persistence)?;
        if result.rows_affected == 0 {
            return Err(ApiError::not_found(
                R::RESOURCE_NAME_SINGULAR,
                Some(id.to_string()),
            ));
        }
        Ok(())
    }

    async fn rollback(txn: DatabaseTransaction) {
        if let Err(err) = txn.rollback().await {
            tracing::error!(
                resource = R::RESOURCE_NAME_SINGULAR,
                error = ?err,
                "Rollback failed"
            );
        }
    }

    fn recovered<T>(err: &ApiError, operation: &'static str, data: T) -> Outcome<T> {
        err.log();
        let status = err.fault_status();
        tracing::warn!(
            resource = R::RESOURCE_NAME_SINGULAR,
            operation,
            status = %status,
            "Transaction rolled back"
        );
        Outcome::new(status, FAILURE_MESSAGE, data)
    }

    fn not_found<T>(id: &R::Id, data: T) -> Outcome<T> {
        tracing::debug!(resource = R::RESOURCE_NAME_SINGULAR, id = %id, "Entry not found");
        Outcome::new(
            StatusCode::BAD_REQUEST,
            format!("{} not found", R::RESOURCE_NAME_SINGULAR),
            data,
        )
    }

    fn resolve(names: &[String]) -> Result<Vec<Box<dyn Relationship<R>>>, ApiError> {
        let mut relations: Vec<Box<dyn Relationship<R>>> = Vec::new();
        for name in names.iter().map(|name| name.trim()) {
            if name.is_empty() || relations.iter().any(|relation| relation.name() == name) {
                continue;
            }
            let relation = R::relationship(name).ok_or_else(|| {
                ApiError::bad_request(format!(
                    "Unknown relationship '{name}' for {}",
                    R::RESOURCE_NAME_PLURAL
                ))
            })?;
            relations.push(relation);
        }
        Ok(relations)
    }

    async fn attach(
        &self,
        models: &[R::Model],
        relations: &[Box<dyn Relationship<R>>],
    ) -> Result<Vec<Value>, ApiError> {
        let mut rows = models
            .iter()
            .map(|model| match serde_json::to_value(model) {
                Ok(Value::Object(fields)) => Ok(fields),
                Ok(_) => Err(ApiError::serialization("model is not a JSON object")),
                Err(err) => Err(ApiError::serialization(err)),
            })
            .collect::<Result<Vec<_>, _>>()?;

        for relation in relations {
            let loaded = relation.load(&self.db, models).await?;
            for (row, value) in rows.iter_mut().zip(loaded) {
                row.insert(relation.name().to_string(), value);
            }
        }
        Ok(rows.into_iter().map(Value::Object).collect())
    }
}

/// A row about to be inserted.
///
/// Columns set by the active model's own `ActiveModelBehavior::new` keep those values.
/// Every other non-key column is set from `R::Model::default()`, so columns outside the
/// fillable list are still written. Keys stay unset for the store to assign.
pub(crate) fn new_row<R: Resource>() -> R::ActiveModel {
    let mut target = <R::ActiveModel as ActiveModelBehavior>::new();
    let defaults = R::Model::default();
    for column in <R::ColumnType as Iterable>::iter() {
        if target.get(column).into_value().is_some() || is_primary_key::<R>(column) {
            continue;
        }
        target.set(column, defaults.get(column));
    }
    target
}

fn is_primary_key<R: Resource>(column: R::ColumnType) -> bool {
    <<R::EntityType as EntityTrait>::PrimaryKey as Iterable>::iter()
        .any(|key| key.into_column().as_str() == column.as_str())
}

/// Copy the fillable fields present in `data` onto `target`.
///
/// `data` is laid over the JSON form of `base` and read back as a model, so every value is
/// converted by the model's own deserializer. Only assigned columns are set on `target`;
/// everything else keeps its state.
pub(crate) fn assign_fillable<R: Resource>(
    mut target: R::ActiveModel,
    base: &R::Model,
    data: &Map<String, Value>,
) -> Result<R::ActiveModel, ApiError> {
    let mut merged = match serde_json::to_value(base).map_err(ApiError::serialization)? {
        Value::Object(fields) => fields,
        _ => return Err(ApiError::serialization("model is not a JSON object")),
    };

    let mut assigned = Vec::new();
    for column in R::fillable_columns() {
        if let Some(value) = data.get(column.as_str()) {
            merged.insert(column.as_str().to_string(), value.clone());
            assigned.push(column);
        }
    }

    let staged: R::Model = serde_json::from_value(Value::Object(merged)).map_err(|err| {
        ApiError::bad_request(format!("Invalid {} data: {err}", R::RESOURCE_NAME_SINGULAR))
    })?;
    let staged = staged.into_active_model();
    for column in assigned {
        if let Some(value) = staged.get(column).into_value() {
            target.set(column, value);
        }
    }
    Ok(target)
}

/// Read a primary key out of a JSON string or number.
pub(crate) fn parse_key<R: Resource>(value: &Value) -> Option<R::Id> {
    match value {
        Value::String(raw) => raw.trim().parse().ok(),
        Value::Number(number) => number.to_string().parse().ok(),
        _ => None,
    }
}
