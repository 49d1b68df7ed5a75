//! Turns rows of an arbitrary SQLite result set into [`Record`]s.
//!
//! Column types are only known once the query has run, so each column picks
//! a [`DecodeStrategy`] from its declared type name. The mapping is total:
//! anything unrecognised decodes as text.

use crate::models::record::{Record, Value};
use sqlx::{Column, Row, TypeInfo, sqlite::SqliteRow};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarshalError {
    #[error("failed to decode column `{column}` of row {row}: {source}")]
    Decode {
        row: usize,
        column: String,
        #[source]
        source: sqlx::Error,
    },
}

/// How a single column is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStrategy {
    Text,
    Bool,
    Int64,
    Int32,
    Float64,
}

impl DecodeStrategy {
    /// Map a declared type name onto a strategy.
    ///
    /// Size suffixes such as `VARCHAR(64)` are ignored and matching is
    /// case-insensitive. Unknown names fall back to [`DecodeStrategy::Text`].
    pub fn for_type_name(type_name: &str) -> Self {
        let base = type_name
            .split('(')
            .next()
            .unwrap_or(type_name)
            .trim()
            .to_ascii_uppercase();

        match base.as_str() {
            "VARCHAR" | "CHAR" | "TEXT" | "UUID" | "TIMESTAMP" | "TIMESTAMPTZ" | "DATETIME"
            | "DATE" | "TIME" => DecodeStrategy::Text,
            "BOOL" | "BOOLEAN" => DecodeStrategy::Bool,
            "INT4" | "INT" | "INTEGER" | "INT8" | "BIGINT" => DecodeStrategy::Int64,
            "INT2" | "SMALLINT" | "TINYINT" | "MEDIUMINT" => DecodeStrategy::Int32,
            "FLOAT4" | "FLOAT8" | "REAL" | "FLOAT" | "DOUBLE" | "DOUBLE PRECISION" => {
                DecodeStrategy::Float64
            }
            _ => DecodeStrategy::Text,
        }
    }

    /// Decode cell `index` of `row`. NULL yields the zero value.
    ///
    /// Decoding is unchecked: the strategy already reflects the declared
    /// type, and SQLite coerces stored values on read.
    fn decode(self, row: &SqliteRow, index: usize) -> Result<Value, sqlx::Error> {
        let value = match self {
            // Raw bytes, so BLOBs and invalid UTF-8 still decode.
            DecodeStrategy::Text => Value::Text(
                row.try_get_unchecked::<Option<Vec<u8>>, _>(index)?
                    .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                    .unwrap_or_default(),
            ),
            DecodeStrategy::Bool => Value::Bool(
                row.try_get_unchecked::<Option<bool>, _>(index)?
                    .unwrap_or_default(),
            ),
            DecodeStrategy::Int64 => Value::Int(
                row.try_get_unchecked::<Option<i64>, _>(index)?
                    .unwrap_or_default(),
            ),
            DecodeStrategy::Int32 => Value::from(
                row.try_get_unchecked::<Option<i32>, _>(index)?
                    .unwrap_or_default(),
            ),
            DecodeStrategy::Float64 => Value::Float(
                row.try_get_unchecked::<Option<f64>, _>(index)?
                    .unwrap_or_default(),
            ),
        };
        Ok(value)
    }
}

/// Decode every row, keeping row order. Any failing cell fails the whole
/// batch.
pub fn marshal(rows: &[SqliteRow]) -> Result<Vec<Record>, MarshalError> {
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };

    // Every row of one result set shares the same column layout.
    let layout: Vec<(&str, DecodeStrategy)> = first
        .columns()
        .iter()
        .map(|column| {
            (
                column.name(),
                DecodeStrategy::for_type_name(column.type_info().name()),
            )
        })
        .collect();

    rows.iter()
        .enumerate()
        .map(|(row_index, row)| -> Result<Record, MarshalError> {
            let mut record = Record::with_capacity(layout.len());
            for (index, (name, strategy)) in layout.iter().enumerate() {
                let value = strategy
                    .decode(row, index)
                    .map_err(|source| MarshalError::Decode {
                        row: row_index,
                        column: name.to_string(),
                        source,
                    })?;
                record.insert(*name, value);
            }
            Ok(record)
        })
        .collect()
}
