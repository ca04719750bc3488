//! Core of Weft: the entity catalog, the clause model, dialect-aware SQL
//! compilation and row binding over sqlx.
//!
//! Most applications use the `weft-orm` facade, which adds `#[derive(Entity)]`.

pub use sqlx;

pub mod binder;
pub mod catalog;
pub mod clause;
pub mod compiler;
pub mod dialect;
pub mod driver;
pub mod error;
pub mod executor;
mod metrics;
pub mod model;
pub mod naming;
pub mod opt;
pub mod query;
pub mod schema;
pub mod value;

#[cfg(test)]
mod fixtures;

pub use binder::{BindColumn, bind_many, bind_one, bind_row, column_to_field};
pub use catalog::{Catalog, ResolvedColumn};
pub use clause::{
    Aggregate, Clauses, ColumnRef, Direction, Join, JoinKind, Operand, Operator, OrderItem,
    Predicate, QuerySpec, RawSql, SelectExpr, SelectItem,
};
pub use compiler::{Assignment, Compiler, Statement};
pub use dialect::{Dialect, InsertId, MssqlDialect, MySqlDialect, Pagination, PostgresDialect, SqliteDialect};
pub use driver::{Driver, bind_statement};
pub use error::{WeftError, WeftResult};
pub use executor::{Executor, IntoExecutor};
pub use model::Model;
pub use opt::{Opt, OptBool, OptFloat, OptInt, OptString, OptTime};
pub use query::QueryBuilder;
pub use schema::{ColumnDef, ColumnTags, Entity, EntityKey, EntitySchema, Field};
pub use value::{ToValue, Value};

pub mod prelude {
    pub use crate::{
        Aggregate, Catalog, Clauses, ColumnRef, Direction, Entity, Executor, IntoExecutor, Model,
        Operand, Operator, Opt, OptBool, OptFloat, OptInt, OptString, OptTime, QueryBuilder,
        QuerySpec, WeftError, WeftResult,
    };
}
