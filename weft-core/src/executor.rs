use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use sqlx::Database;

use crate::compiler::Statement;
use crate::driver::{Driver, bind_statement};

/// Where a statement runs: a shared pool or one borrowed connection.
///
/// A transaction dereferences to its connection, so `&mut *tx` runs inside it.
pub enum Executor<'a, DB: Database> {
    Pool(&'a sqlx::Pool<DB>),
    Conn(&'a mut DB::Connection),
}

impl<'a, DB: Database> std::fmt::Debug for Executor<'a, DB> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pool(_) => f.write_str("Executor::Pool"),
            Self::Conn(_) => f.write_str("Executor::Conn"),
        }
    }
}

impl<'a, DB: Database> From<&'a sqlx::Pool<DB>> for Executor<'a, DB> {
    fn from(pool: &'a sqlx::Pool<DB>) -> Self {
        Self::Pool(pool)
    }
}

/// Anything that can become an [`Executor`].
pub trait IntoExecutor<'a>: Send + 'a {
    type DB: Driver;
    fn into_executor(self) -> Executor<'a, Self::DB>;
}

impl<'a, DB: Driver> IntoExecutor<'a> for &'a sqlx::Pool<DB> {
    type DB = DB;
    fn into_executor(self) -> Executor<'a, DB> {
        Executor::Pool(self)
    }
}

#[cfg(feature = "sqlite")]
impl<'a> IntoExecutor<'a> for &'a mut sqlx::SqliteConnection {
    type DB = sqlx::Sqlite;
    fn into_executor(self) -> Executor<'a, Self::DB> {
        Executor::Conn(self)
    }
}

#[cfg(feature = "postgres")]
impl<'a> IntoExecutor<'a> for &'a mut sqlx::postgres::PgConnection {
    type DB = sqlx::Postgres;
    fn into_executor(self) -> Executor<'a, Self::DB> {
        Executor::Conn(self)
    }
}

#[cfg(feature = "mysql")]
impl<'a> IntoExecutor<'a> for &'a mut sqlx::mysql::MySqlConnection {
    type DB = sqlx::MySql;
    fn into_executor(self) -> Executor<'a, Self::DB> {
        Executor::Conn(self)
    }
}

impl<'a, DB: Driver> IntoExecutor<'a> for Executor<'a, DB> {
    type DB = DB;
    fn into_executor(self) -> Executor<'a, DB> {
        self
    }
}

impl<'a, DB> Executor<'a, DB>
where
    DB: Driver,
    for<'c> &'c mut DB::Connection: sqlx::Executor<'c, Database = DB>,
    for<'q> <DB as Database>::Arguments<'q>: sqlx::IntoArguments<'q, DB>,
{
    /// Runs a statement that returns no rows.
    pub async fn execute(&mut self, statement: &Statement) -> Result<DB::QueryResult, sqlx::Error> {
        let query = bind_statement::<DB>(&statement.sql, statement.params.clone());
        match self {
            Self::Pool(pool) => query.execute(*pool).await,
            Self::Conn(conn) => query.execute(&mut **conn).await,
        }
    }

    pub async fn fetch_all(&mut self, statement: &Statement) -> Result<Vec<DB::Row>, sqlx::Error> {
        let query = bind_statement::<DB>(&statement.sql, statement.params.clone());
        match self {
            Self::Pool(pool) => query.fetch_all(*pool).await,
            Self::Conn(conn) => query.fetch_all(&mut **conn).await,
        }
    }

    pub async fn fetch_optional(
        &mut self,
        statement: &Statement,
    ) -> Result<Option<DB::Row>, sqlx::Error> {
        let query = bind_statement::<DB>(&statement.sql, statement.params.clone());
        match self {
            Self::Pool(pool) => query.fetch_optional(*pool).await,
            Self::Conn(conn) => query.fetch_optional(&mut **conn).await,
        }
    }

    /// Streams the rows of a statement, consuming the executor.
    pub fn fetch_stream(self, statement: Statement) -> BoxStream<'a, Result<DB::Row, sqlx::Error>> {
        Box::pin(async_stream::try_stream! {
            let query = bind_statement::<DB>(&statement.sql, statement.params.clone());
            let mut rows = match self {
                Executor::Pool(pool) => query.fetch(pool),
                Executor::Conn(conn) => query.fetch(conn),
            };
            while let Some(row) = rows.next().await {
                yield row?;
            }
        })
    }
}
