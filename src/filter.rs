use sea_orm::{ColumnTrait, ColumnType, Condition};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::errors::ApiError;
use crate::resource::Resource;

/// Field → expected value pairs, ANDed together.
///
/// Parsed from the JSON-encoded `filter` query parameter:
///
/// ```json
/// {"name": "Alice", "active": true, "id": [1, 2, 3], "email": null}
/// ```
///
/// Scalars compare with `=`, arrays with `IN`, `null` with `IS NULL`. Only the resource's
/// filterable columns may appear.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter(Map<String, Value>);

impl Filter {
    /// Parse the raw `filter` query parameter. An absent or blank parameter is an empty
    /// filter.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::BadRequest` when the parameter is not a JSON object.
    pub fn parse(raw: Option<&str>) -> Result<Self, ApiError> {
        let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
            return Ok(Self::default());
        };
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(fields)) => Ok(Self(fields)),
            _ => Err(ApiError::bad_request("The filter must be a JSON object")),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Translate the filter into a query condition for `R`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::BadRequest` for fields that are not filterable or values that do
    /// not fit their column.
    pub fn condition<R: Resource>(&self) -> Result<Condition, ApiError> {
        let mut condition = Condition::all();
        for (field, value) in &self.0 {
            let column = R::column_named(field).ok_or_else(|| {
                ApiError::bad_request(format!("Unknown filter field '{field}'"))
            })?;
            let expr = match value {
                Value::Null => column.is_null(),
                Value::Array(values) => column.is_in(
                    values
                        .iter()
                        .map(|value| column_value(&column, field, value))
                        .collect::<Result<Vec<_>, _>>()?,
                ),
                scalar => column.eq(column_value(&column, field, scalar)?),
            };
            condition = condition.add(expr);
        }
        Ok(condition)
    }
}

/// Convert a JSON scalar into a query value shaped for the column's SQL type.
fn column_value<C: ColumnTrait>(
    column: &C,
    field: &str,
    value: &Value,
) -> Result<sea_orm::Value, ApiError> {
    let mismatch = || ApiError::bad_request(format!("Invalid value for filter field '{field}'"));

    let converted = match column.def().get_column_type() {
        ColumnType::TinyInteger
        | ColumnType::SmallInteger
        | ColumnType::Integer
        | ColumnType::BigInteger => as_i64(value).map(sea_orm::Value::from),
        ColumnType::TinyUnsigned
        | ColumnType::SmallUnsigned
        | ColumnType::Unsigned
        | ColumnType::BigUnsigned => as_u64(value).map(sea_orm::Value::from),
        ColumnType::Float | ColumnType::Double | ColumnType::Decimal(_) => {
            as_f64(value).map(sea_orm::Value::from)
        }
        ColumnType::Boolean => as_bool(value).map(sea_orm::Value::from),
        ColumnType::Uuid => value
            .as_str()
            .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
            .map(sea_orm::Value::from),
        // Text columns, and anything more exotic, compare as text.
        _ => as_text(value).map(sea_orm::Value::from),
    };

    converted.ok_or_else(mismatch)
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
