use chrono::{NaiveDate, NaiveDateTime};
use lifecycle_core_api::{AttributeType, AttributeValue, Expression, TimeZoneSpec};
use lifecycle_core_db::lifecycle::timezone::render_datetime;
use sqlx::{postgres::PgRow, Postgres, QueryBuilder, Row};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// A trait for converting a database row into a model.
pub trait TryFromRow<R>: Sized {
    /// Performs the conversion.
    fn try_from_row(row: &R) -> Result<Self, Box<dyn std::error::Error + Send + Sync>>;
}

#[derive(Debug, Error)]
pub enum PostgresStoreError {
    #[error("Identifier '{0}' cannot be used as a table or column name")]
    InvalidIdentifier(String),

    #[error("Column '{column}' of '{table}' has unsupported type '{data_type}'")]
    UnsupportedColumnType {
        table: String,
        column: String,
        data_type: String,
    },

    #[error("Value {value} cannot be stored in {ty:?} column '{attribute}'")]
    UnsupportedValue {
        attribute: String,
        ty: AttributeType,
        value: String,
    },

    #[error("Page window (limit {limit}, offset {offset}) exceeds the range of a SQL BIGINT")]
    PageOutOfRange { limit: usize, offset: usize },

    #[error("Value '{value}' of '{attribute}' does not match the datetime format '{format}'")]
    InvalidDateTime {
        attribute: String,
        value: String,
        format: String,
    },
}

/// Double-quotes an identifier for interpolation into SQL.
///
/// Only ASCII letters, digits and underscores are accepted.
pub fn quote_ident(name: &str) -> Result<String, PostgresStoreError> {
    let valid = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(format!("\"{name}\""))
    } else {
        Err(PostgresStoreError::InvalidIdentifier(name.to_string()))
    }
}

/// Maps an `information_schema.columns.data_type` to an attribute type
pub fn attribute_type_of(table: &str, column: &str, data_type: &str) -> Result<AttributeType, PostgresStoreError> {
    let ty = match data_type {
        "smallint" | "integer" | "bigint" => AttributeType::Integer,
        "real" | "double precision" | "numeric" => AttributeType::Float,
        "boolean" => AttributeType::Boolean,
        "character varying" | "character" => AttributeType::String,
        "text" => AttributeType::Text,
        "timestamp without time zone" | "timestamp with time zone" | "date" => AttributeType::DateTime,
        "uuid" => AttributeType::Uuid,
        "json" | "jsonb" => AttributeType::Json,
        other => {
            return Err(PostgresStoreError::UnsupportedColumnType {
                table: table.to_string(),
                column: column.to_string(),
                data_type: other.to_string(),
            })
        }
    };
    Ok(ty)
}

/// Select-list expression reading a column in the Rust type it decodes to
pub fn select_column(name: &str, ty: AttributeType) -> Result<String, PostgresStoreError> {
    let column = quote_ident(name)?;
    let cast = match ty {
        AttributeType::Integer => "BIGINT",
        AttributeType::Float => "DOUBLE PRECISION",
        AttributeType::Boolean => "BOOLEAN",
        AttributeType::String | AttributeType::Text => "TEXT",
        AttributeType::DateTime => "TIMESTAMP",
        AttributeType::Uuid => "UUID",
        AttributeType::Json => "JSONB",
    };
    Ok(format!("{column}::{cast} AS {column}"))
}

/// Converts datetime literals between their storage text form and
/// `TIMESTAMP` columns, which hold wall-clock time in the storage zone.
#[derive(Debug, Clone)]
pub struct DateTimeCodec {
    storage_zone: TimeZoneSpec,
    format: Arc<str>,
}

impl DateTimeCodec {
    pub fn new(storage_zone: TimeZoneSpec, format: impl Into<Arc<str>>) -> Self {
        Self {
            storage_zone,
            format: format.into(),
        }
    }

    pub fn storage_zone(&self) -> TimeZoneSpec {
        self.storage_zone
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn parse(&self, attribute: &str, value: &str) -> Result<NaiveDateTime, PostgresStoreError> {
        NaiveDateTime::parse_from_str(value, &self.format)
            .ok()
            .or_else(|| {
                NaiveDate::parse_from_str(value, &self.format)
                    .ok()
                    .and_then(|date| date.and_hms_opt(0, 0, 0))
            })
            .ok_or_else(|| PostgresStoreError::InvalidDateTime {
                attribute: attribute.to_string(),
                value: value.to_string(),
                format: self.format.to_string(),
            })
    }

    pub fn render(&self, value: NaiveDateTime) -> String {
        self.storage_zone
            .from_local(&value)
            .map(|local| render_datetime(&local, &self.format))
            .unwrap_or_default()
    }
}

/// Pushes one value as a bind parameter typed after its column.
///
/// `CURRENT_TIMESTAMP` is pushed as SQL so the database evaluates it, shifted
/// into the storage zone: by a fixed interval for offsets, through the
/// server's zone database for IANA names.
pub fn push_value(
    builder: &mut QueryBuilder<'_, Postgres>,
    attribute: &str,
    ty: AttributeType,
    value: &AttributeValue,
    codec: &DateTimeCodec,
) -> Result<(), PostgresStoreError> {
    match (ty, value) {
        (_, AttributeValue::Expression(Expression::CurrentTimestamp)) => match codec.storage_zone() {
            TimeZoneSpec::Fixed(offset) => {
                builder.push("((CURRENT_TIMESTAMP AT TIME ZONE 'UTC') + make_interval(secs => ");
                builder.push_bind(f64::from(offset.local_minus_utc()));
                builder.push("))");
            }
            zone @ TimeZoneSpec::Named(_) => {
                builder.push("(CURRENT_TIMESTAMP AT TIME ZONE ");
                builder.push_bind(zone.name());
                builder.push(")");
            }
        },
        (AttributeType::Integer, AttributeValue::Null) => {
            builder.push_bind(None::<i64>);
        }
        (AttributeType::Integer, AttributeValue::Integer(i)) => {
            builder.push_bind(*i);
        }
        (AttributeType::Float, AttributeValue::Null) => {
            builder.push_bind(None::<f64>);
        }
        (AttributeType::Float, AttributeValue::Float(f)) => {
            builder.push_bind(*f);
        }
        (AttributeType::Float, AttributeValue::Integer(i)) => {
            builder.push_bind(*i as f64);
        }
        (AttributeType::Boolean, AttributeValue::Null) => {
            builder.push_bind(None::<bool>);
        }
        (AttributeType::Boolean, AttributeValue::Bool(b)) => {
            builder.push_bind(*b);
        }
        (AttributeType::String | AttributeType::Text, AttributeValue::Null) => {
            builder.push_bind(None::<String>);
        }
        (AttributeType::String | AttributeType::Text, AttributeValue::Text(s)) => {
            builder.push_bind(s.clone());
        }
        (AttributeType::DateTime, AttributeValue::Null) => {
            builder.push_bind(None::<NaiveDateTime>);
        }
        (AttributeType::DateTime, AttributeValue::Text(s)) if s.is_empty() => {
            builder.push_bind(None::<NaiveDateTime>);
        }
        (AttributeType::DateTime, AttributeValue::Text(s)) => {
            builder.push_bind(codec.parse(attribute, s)?);
        }
        (AttributeType::Uuid, AttributeValue::Null) => {
            builder.push_bind(None::<Uuid>);
        }
        (AttributeType::Uuid, AttributeValue::Uuid(id)) => {
            builder.push_bind(*id);
        }
        (AttributeType::Uuid, AttributeValue::Text(s)) => {
            let id = Uuid::parse_str(s).map_err(|_| unsupported(attribute, ty, value))?;
            builder.push_bind(id);
        }
        (AttributeType::Json, AttributeValue::Null) => {
            builder.push_bind(None::<serde_json::Value>);
        }
        (AttributeType::Json, other) => {
            builder.push_bind(other.to_json());
        }
        (ty, value) => return Err(unsupported(attribute, ty, value)),
    }
    Ok(())
}

fn unsupported(attribute: &str, ty: AttributeType, value: &AttributeValue) -> PostgresStoreError {
    PostgresStoreError::UnsupportedValue {
        attribute: attribute.to_string(),
        ty,
        value: format!("{value:?}"),
    }
}

/// Reads one column selected through [`select_column`]
pub fn read_value(
    row: &PgRow,
    column: &str,
    ty: AttributeType,
    codec: &DateTimeCodec,
) -> Result<AttributeValue, Box<dyn std::error::Error + Send + Sync>> {
    let value = match ty {
        AttributeType::Integer => row.try_get::<Option<i64>, _>(column)?.map(AttributeValue::Integer),
        AttributeType::Float => row.try_get::<Option<f64>, _>(column)?.map(AttributeValue::Float),
        AttributeType::Boolean => row.try_get::<Option<bool>, _>(column)?.map(AttributeValue::Bool),
        AttributeType::String | AttributeType::Text => {
            row.try_get::<Option<String>, _>(column)?.map(AttributeValue::Text)
        }
        AttributeType::DateTime => row
            .try_get::<Option<NaiveDateTime>, _>(column)?
            .map(|value| AttributeValue::Text(codec.render(value))),
        AttributeType::Uuid => row.try_get::<Option<Uuid>, _>(column)?.map(AttributeValue::Uuid),
        AttributeType::Json => row
            .try_get::<Option<serde_json::Value>, _>(column)?
            .map(AttributeValue::Json),
    };
    Ok(value.unwrap_or(AttributeValue::Null))
}
