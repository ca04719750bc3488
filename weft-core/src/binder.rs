//! Result rows onto entities.
//!
//! Column names are matched to fields once per result set by
//! [`column_to_field`]; decoding a matched column is delegated to the
//! `BindColumn` impl generated by `#[derive(Entity)]`.

use sqlx::{Column, Database, Row};

use crate::naming::to_snake_case;
use crate::schema::{Entity, EntitySchema};

/// Decodes one result column into the named field.
pub trait BindColumn<DB: Database>: Entity {
    /// Returns `false` when `field` is not a mapped field of `Self`.
    fn bind_column(&mut self, field: &str, row: &DB::Row, index: usize) -> Result<bool, sqlx::Error>;
}

/// The field a result column binds to.
///
/// An explicit column override or the field's default column name wins;
/// otherwise the snake_case of `column` is matched against the snake_case of
/// each declared field name.
pub fn column_to_field(schema: &EntitySchema, column: &str) -> Option<&'static str> {
    if let Some(def) = schema.columns.iter().find(|def| def.column_name() == column) {
        return Some(def.field);
    }
    let snake = to_snake_case(column);
    schema
        .columns
        .iter()
        .find(|def| def.column.is_none() && to_snake_case(def.field) == snake)
        .map(|def| def.field)
}

fn column_map<DB: Database>(schema: &EntitySchema, row: &DB::Row) -> Vec<Option<&'static str>> {
    row.columns()
        .iter()
        .map(|column| column_to_field(schema, column.name()))
        .collect()
}

fn bind_mapped<T, DB>(row: &DB::Row, map: &[Option<&'static str>]) -> Result<T, sqlx::Error>
where
    DB: Database,
    T: BindColumn<DB>,
{
    let mut entity = T::default();
    for (index, field) in map.iter().enumerate() {
        if let Some(field) = field {
            entity.bind_column(field, row, index)?;
        }
    }
    Ok(entity)
}

/// Binds one row; unmatched columns are skipped.
pub fn bind_row<T, DB>(row: &DB::Row) -> Result<T, sqlx::Error>
where
    DB: Database,
    T: BindColumn<DB>,
{
    bind_mapped(row, &column_map::<DB>(T::schema(), row))
}

pub fn bind_many<T, DB>(rows: &[DB::Row]) -> Result<Vec<T>, sqlx::Error>
where
    DB: Database,
    T: BindColumn<DB>,
{
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };
    let map = column_map::<DB>(T::schema(), first);
    rows.iter().map(|row| bind_mapped(row, &map)).collect()
}

/// Binds the first row only.
pub fn bind_one<T, DB>(rows: &[DB::Row]) -> Result<Option<T>, sqlx::Error>
where
    DB: Database,
    T: BindColumn<DB>,
{
    rows.first().map(bind_row::<T, DB>).transpose()
}
