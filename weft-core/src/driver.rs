use sqlx::query::Query;
use sqlx::Database;

use crate::dialect::Dialect;
use crate::value::Value;

/// A sqlx database that Weft can execute against.
///
/// Ties the database to its [`Dialect`] and knows how to bind a [`Value`] and
/// read write results.
pub trait Driver: Database + Sized + Send + Sync {
    fn dialect() -> &'static dyn Dialect;

    fn bind_value<'q>(
        query: Query<'q, Self, <Self as Database>::Arguments<'q>>,
        value: Value,
    ) -> Query<'q, Self, <Self as Database>::Arguments<'q>>;

    fn rows_affected(result: &Self::QueryResult) -> u64;

    /// Id reported by the driver for the last insert, when it reports one.
    fn last_insert_id(result: &Self::QueryResult) -> Option<i64>;

    /// Id read from the first column of a row returned by an insert.
    fn returned_id(row: &Self::Row) -> Result<i64, sqlx::Error>;
}

/// Builds a query for `sql` and binds `params` in order.
pub fn bind_statement<'q, DB: Driver>(
    sql: &'q str,
    params: Vec<Value>,
) -> Query<'q, DB, <DB as Database>::Arguments<'q>> {
    params
        .into_iter()
        .fold(sqlx::query::<DB>(sql), DB::bind_value)
}

#[cfg(any(feature = "sqlite", feature = "postgres", feature = "mysql"))]
#[inline(always)]
fn bind_value_query<'q, DB>(
    query: Query<'q, DB, <DB as Database>::Arguments<'q>>,
    value: Value,
) -> Query<'q, DB, <DB as Database>::Arguments<'q>>
where
    DB: Database,
    String: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
    i64: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
    f64: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
    bool: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
    uuid::Uuid: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
    chrono::DateTime<chrono::Utc>: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
    Option<String>: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
{
    match value {
        Value::String(v) => query.bind(v),
        Value::I64(v) => query.bind(v),
        Value::F64(v) => query.bind(v),
        Value::Bool(v) => query.bind(v),
        Value::Uuid(v) => query.bind(v),
        Value::DateTime(v) => query.bind(v),
        Value::Null => query.bind(Option::<String>::None),
    }
}

// Postgres SERIAL keys are INT4, so fall back to i32.
#[cfg(any(feature = "sqlite", feature = "postgres", feature = "mysql"))]
fn first_column_id<DB>(row: &DB::Row) -> Result<i64, sqlx::Error>
where
    DB: Database,
    usize: sqlx::ColumnIndex<DB::Row>,
    i64: for<'r> sqlx::Decode<'r, DB> + sqlx::Type<DB>,
    i32: for<'r> sqlx::Decode<'r, DB> + sqlx::Type<DB>,
{
    use sqlx::Row;
    row.try_get::<i64, _>(0)
        .or_else(|_| row.try_get::<i32, _>(0).map(i64::from))
}

#[cfg(feature = "sqlite")]
impl Driver for sqlx::Sqlite {
    fn dialect() -> &'static dyn Dialect {
        &crate::dialect::SqliteDialect
    }
    fn bind_value<'q>(
        query: Query<'q, Self, <Self as Database>::Arguments<'q>>,
        value: Value,
    ) -> Query<'q, Self, <Self as Database>::Arguments<'q>> {
        bind_value_query(query, value)
    }
    fn rows_affected(result: &sqlx::sqlite::SqliteQueryResult) -> u64 {
        result.rows_affected()
    }
    fn last_insert_id(result: &sqlx::sqlite::SqliteQueryResult) -> Option<i64> {
        Some(result.last_insert_rowid())
    }
    fn returned_id(row: &sqlx::sqlite::SqliteRow) -> Result<i64, sqlx::Error> {
        first_column_id::<Self>(row)
    }
}

#[cfg(feature = "postgres")]
impl Driver for sqlx::Postgres {
    fn dialect() -> &'static dyn Dialect {
        &crate::dialect::PostgresDialect
    }
    fn bind_value<'q>(
        query: Query<'q, Self, <Self as Database>::Arguments<'q>>,
        value: Value,
    ) -> Query<'q, Self, <Self as Database>::Arguments<'q>> {
        bind_value_query(query, value)
    }
    fn rows_affected(result: &sqlx::postgres::PgQueryResult) -> u64 {
        result.rows_affected()
    }
    fn last_insert_id(_result: &sqlx::postgres::PgQueryResult) -> Option<i64> {
        None
    }
    fn returned_id(row: &sqlx::postgres::PgRow) -> Result<i64, sqlx::Error> {
        first_column_id::<Self>(row)
    }
}

#[cfg(feature = "mysql")]
impl Driver for sqlx::MySql {
    fn dialect() -> &'static dyn Dialect {
        &crate::dialect::MySqlDialect
    }
    fn bind_value<'q>(
        query: Query<'q, Self, <Self as Database>::Arguments<'q>>,
        value: Value,
    ) -> Query<'q, Self, <Self as Database>::Arguments<'q>> {
        bind_value_query(query, value)
    }
    fn rows_affected(result: &sqlx::mysql::MySqlQueryResult) -> u64 {
        result.rows_affected()
    }
    fn last_insert_id(result: &sqlx::mysql::MySqlQueryResult) -> Option<i64> {
        i64::try_from(result.last_insert_id()).ok()
    }
    fn returned_id(row: &sqlx::mysql::MySqlRow) -> Result<i64, sqlx::Error> {
        first_column_id::<Self>(row)
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use sqlx::Row;
    use sqlx::sqlite::SqlitePoolOptions;

    #[tokio::test]
    async fn binds_every_value_kind_in_order() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let row = bind_statement::<sqlx::Sqlite>(
            "SELECT ?, ?, ?, ?",
            vec![
                Value::I64(7),
                Value::from("seven"),
                Value::F64(7.5),
                Value::Null,
            ],
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(row.get::<i64, _>(0), 7);
        assert_eq!(row.get::<String, _>(1), "seven");
        assert_eq!(row.get::<f64, _>(2), 7.5);
        assert_eq!(row.get::<Option<String>, _>(3), None);
        assert_eq!(sqlx::Sqlite::returned_id(&row).unwrap(), 7);
        assert_eq!(<sqlx::Sqlite as Driver>::dialect().name(), "sqlite");
    }
}
