use std::fmt::Display;
use std::str::FromStr;

use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ColumnTrait, EntityTrait, FromQueryResult, IdenStatic,
    IntoActiveModel, ModelTrait, PrimaryKeyTrait,
};
use serde::{Serialize, de::DeserializeOwned};

use crate::relationships::Relationship;

/// Primary-key value type of a resource's entity.
pub type KeyValue<R> =
    <<<R as Resource>::EntityType as EntityTrait>::PrimaryKey as PrimaryKeyTrait>::ValueType;

/// Capabilities a Sea-ORM entity exposes to the generic repository and routes.
///
/// Implement it once per entity. Everything the repository needs to know about an entity
/// is declared here at compile time: its key, which fields may be mass-assigned, which
/// fields may be filtered on, whether rows carry an "active" flag, and which child
/// relationships are synchronised alongside a save.
///
/// Models must serialize using their column names as keys, and `Default` must describe the
/// values a brand new row starts from.
///
/// ```rust,ignore
/// impl Resource for Person {
///     type EntityType = person::Entity;
///     type Model = person::Model;
///     type ActiveModel = person::ActiveModel;
///     type ColumnType = person::Column;
///     type Id = i32;
///
///     const ID_COLUMN: person::Column = person::Column::Id;
///     const KEY_IDENTIFIER: &'static str = "person";
///     const RESOURCE_NAME_SINGULAR: &'static str = "person";
///     const RESOURCE_NAME_PLURAL: &'static str = "people";
///     const ACTIVE_COLUMN: Option<person::Column> = Some(person::Column::Active);
///
///     fn fillable_columns() -> Vec<person::Column> {
///         vec![person::Column::Name, person::Column::Email]
///     }
/// }
/// ```
pub trait Resource: Sized + Send + Sync + 'static {
    type EntityType: EntityTrait<Model = Self::Model, Column = Self::ColumnType> + Sync;
    type Model: ModelTrait<Entity = Self::EntityType>
        + FromQueryResult
        + IntoActiveModel<Self::ActiveModel>
        + Serialize
        + DeserializeOwned
        + Default
        + Clone
        + Send
        + Sync;
    type ActiveModel: ActiveModelTrait<Entity = Self::EntityType>
        + ActiveModelBehavior
        + Send
        + Sync;
    type ColumnType: ColumnTrait + Send + Sync;
    type Id: FromStr + Display + Clone + Send + Sync + Into<KeyValue<Self>> + 'static;

    const ID_COLUMN: Self::ColumnType;
    /// Body key that wraps create and update payloads: `{"<key>": {...}}`.
    const KEY_IDENTIFIER: &'static str;
    const RESOURCE_NAME_SINGULAR: &'static str;
    const RESOURCE_NAME_PLURAL: &'static str;
    const MISSING_KEY_MESSAGE: &'static str = "Please provide the request key identifier.";
    /// Boolean column flipped to `false` before a row is deleted.
    const ACTIVE_COLUMN: Option<Self::ColumnType> = None;

    /// Mass-assignment allow-list. Payload fields outside it are dropped.
    fn fillable_columns() -> Vec<Self::ColumnType>;

    #[must_use]
    fn filterable_columns() -> Vec<Self::ColumnType> {
        let mut columns = vec![Self::ID_COLUMN];
        columns.extend(Self::fillable_columns());
        columns
    }

    #[must_use]
    fn relationships() -> Vec<Box<dyn Relationship<Self>>> {
        Vec::new()
    }

    #[must_use]
    fn relationship(name: &str) -> Option<Box<dyn Relationship<Self>>> {
        Self::relationships()
            .into_iter()
            .find(|relation| relation.name() == name)
    }

    #[must_use]
    fn column_named(name: &str) -> Option<Self::ColumnType> {
        Self::filterable_columns()
            .into_iter()
            .find(|column| column.as_str() == name)
    }
}
