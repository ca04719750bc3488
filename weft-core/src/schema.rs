use crate::naming::{table_name_for, to_snake_case};
use crate::value::Value;

/// Stable identity of a row type. Generated per type from its module path.
pub type EntityKey = &'static str;

/// A handle to one field of a registered entity.
///
/// Handles are generated as associated constants (`User::NAME`) and resolve to a
/// table/column pair through a [`Catalog`](crate::Catalog).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Field {
    entity: EntityKey,
    name: &'static str,
}

impl Field {
    pub const fn new(entity: EntityKey, name: &'static str) -> Self {
        Self { entity, name }
    }

    pub const fn entity(&self) -> EntityKey {
        self.entity
    }

    /// Declared field name.
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

/// Static description of one mapped field.
#[derive(Debug, Clone, Copy)]
pub struct ColumnDef {
    pub field: &'static str,
    pub column: Option<&'static str>,
    pub tags: &'static str,
}

impl ColumnDef {
    pub const fn new(field: &'static str, column: Option<&'static str>, tags: &'static str) -> Self {
        Self { field, column, tags }
    }

    /// Explicit column override, else the snake_case of the field name.
    pub fn column_name(&self) -> String {
        match self.column {
            Some(column) => column.to_owned(),
            None => to_snake_case(self.field),
        }
    }

    pub fn tags(&self) -> ColumnTags {
        ColumnTags::parse(self.tags)
    }
}

/// Static description of a row type, generated by `#[derive(Entity)]`.
#[derive(Debug)]
pub struct EntitySchema {
    pub key: EntityKey,
    pub type_name: &'static str,
    pub table: Option<&'static str>,
    pub columns: &'static [ColumnDef],
}

impl EntitySchema {
    pub const fn new(
        key: EntityKey,
        type_name: &'static str,
        table: Option<&'static str>,
        columns: &'static [ColumnDef],
    ) -> Self {
        Self {
            key,
            type_name,
            table,
            columns,
        }
    }

    /// Explicit table override, else the snake_case of the type name.
    pub fn table_name(&self) -> String {
        match self.table {
            Some(table) => table.to_owned(),
            None => table_name_for(self.type_name),
        }
    }

    pub fn column(&self, field: &str) -> Option<&'static ColumnDef> {
        self.columns.iter().find(|def| def.field == field)
    }

    /// The field tagged `primary`, else a field named `id`.
    pub fn primary_key(&self) -> Option<&'static ColumnDef> {
        self.columns
            .iter()
            .find(|def| def.tags().primary)
            .or_else(|| self.column("id"))
    }
}

/// A registered row type.
///
/// Implemented by `#[derive(Entity)]`; the derive also generates one [`Field`]
/// constant per mapped field and the row binding impl.
pub trait Entity: Default + Send + Sync + Unpin + Sized + 'static {
    const KEY: EntityKey;

    fn schema() -> &'static EntitySchema;

    /// Every mapped field with the value it would write, `None` when not set.
    fn values(&self) -> Vec<(&'static str, Option<Value>)>;
}

/// Parsed per-field annotation, e.g. `primary;auto_increment;size:64;not null`.
///
/// Keys are separated by `;`. Only `primary` affects query compilation; the
/// rest is carried for schema tooling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnTags {
    pub primary: bool,
    pub unique: bool,
    pub index: bool,
    pub not_null: bool,
    pub auto_increment: bool,
    pub size: Option<u32>,
    pub sql_type: Option<String>,
    pub comment: Option<String>,
    pub default: Option<String>,
}

impl ColumnTags {
    pub fn parse(tags: &str) -> Self {
        let mut parsed = Self::default();
        for entry in tags.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let (key, value) = match entry.split_once(':') {
                Some((key, value)) => (key.trim(), Some(value.trim())),
                None => (entry, None),
            };
            match (key.to_ascii_lowercase().as_str(), value) {
                ("primary", _) => parsed.primary = true,
                ("unique", _) => parsed.unique = true,
                ("index", _) => parsed.index = true,
                ("not null", _) => parsed.not_null = true,
                ("auto_increment", _) => parsed.auto_increment = true,
                ("size", Some(size)) => parsed.size = size.parse().ok(),
                ("type", Some(ty)) => parsed.sql_type = Some(ty.to_owned()),
                ("comment", Some(comment)) => parsed.comment = Some(comment.to_owned()),
                ("default", Some(default)) => parsed.default = Some(default.to_owned()),
                (other, _) => tracing::trace!(tag = other, "ignoring unknown column tag"),
            }
        }
        parsed
    }
}
