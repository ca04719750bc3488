use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use crate::schema::{Entity, EntityKey, EntitySchema, Field};

/// A field resolved to its table and column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumn {
    pub table: Arc<str>,
    pub column: Arc<str>,
}

#[derive(Debug)]
struct TableEntry {
    schema: &'static EntitySchema,
    table: Arc<str>,
    columns: HashMap<&'static str, Arc<str>>,
}

/// Maps registered row types and their field handles to table and column names.
///
/// Build one per application (or use [`Catalog::global`]) and register every
/// entity during start-up. Referencing an unregistered entity is a programming
/// error and panics.
#[derive(Debug, Default)]
pub struct Catalog {
    tables: RwLock<HashMap<EntityKey, TableEntry>>,
}

static GLOBAL: OnceLock<Catalog> = OnceLock::new();

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide catalog.
    pub fn global() -> &'static Catalog {
        GLOBAL.get_or_init(Catalog::new)
    }

    /// Registers `T`. Registering the same type twice is a no-op.
    pub fn register<T: Entity>(&self) -> &Self {
        self.register_schema(T::schema())
    }

    pub fn register_schema(&self, schema: &'static EntitySchema) -> &Self {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        if tables.contains_key(schema.key) {
            return self;
        }
        let table: Arc<str> = schema.table_name().into();
        let columns = schema
            .columns
            .iter()
            .map(|def| (def.field, Arc::from(def.column_name())))
            .collect();
        tracing::debug!(
            entity = schema.type_name,
            table = %table,
            columns = schema.columns.len(),
            "registered entity"
        );
        tables.insert(
            schema.key,
            TableEntry {
                schema,
                table,
                columns,
            },
        );
        self
    }

    pub fn is_registered<T: Entity>(&self) -> bool {
        self.read().contains_key(T::KEY)
    }

    pub fn try_resolve(&self, field: Field) -> Option<ResolvedColumn> {
        let tables = self.read();
        let entry = tables.get(field.entity())?;
        let column = entry.columns.get(field.name())?;
        Some(ResolvedColumn {
            table: entry.table.clone(),
            column: column.clone(),
        })
    }

    /// Resolves a field handle.
    ///
    /// # Panics
    /// If the entity or field was never registered.
    pub fn resolve(&self, field: Field) -> ResolvedColumn {
        self.try_resolve(field).unwrap_or_else(|| {
            panic!(
                "field `{}` of `{}` is not registered in this catalog",
                field.name(),
                field.entity()
            )
        })
    }

    /// Table name of a registered entity.
    ///
    /// # Panics
    /// If the entity was never registered.
    pub fn table_name(&self, key: EntityKey) -> Arc<str> {
        self.entry(key, |entry| entry.table.clone())
    }

    /// Schema of a registered entity.
    ///
    /// # Panics
    /// If the entity was never registered.
    pub fn schema(&self, key: EntityKey) -> &'static EntitySchema {
        self.entry(key, |entry| entry.schema)
    }

    fn entry<R>(&self, key: EntityKey, f: impl FnOnce(&TableEntry) -> R) -> R {
        match self.read().get(key) {
            Some(entry) => f(entry),
            None => panic!("entity `{}` is not registered in this catalog", key),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<EntityKey, TableEntry>> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }
}
