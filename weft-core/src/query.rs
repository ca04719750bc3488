use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use sqlx::{ColumnIndex, Database, Decode, Row, Type};

use crate::binder::{BindColumn, bind_many, bind_row};
use crate::catalog::Catalog;
use crate::clause::{Aggregate, Clauses, ColumnRef, QuerySpec};
use crate::compiler::{Assignment, Compiler, Statement};
use crate::dialect::InsertId;
use crate::driver::Driver;
use crate::error::{WeftError, WeftResult};
use crate::executor::Executor;
use crate::metrics::record_query_metrics;
use crate::opt::Opt;
use crate::schema::{Entity, Field};
use crate::value::Value;

fn trace_statement(operation: &'static str, statement: &Statement) {
    tracing::debug!(
        operation,
        sql = %statement.sql,
        params = statement.params.len(),
        "weft query"
    );
}

/// An executing query over entity `T`.
///
/// Clause methods come from [`Clauses`]; the terminal methods compile the
/// accumulated [`QuerySpec`] for `DB`'s dialect and run it on the executor.
pub struct QueryBuilder<'a, T, DB: Database> {
    executor: Executor<'a, DB>,
    catalog: &'a Catalog,
    spec: QuerySpec,
    allow_unsafe: bool,
    _marker: PhantomData<T>,
}

impl<'a, T, DB: Database> std::fmt::Debug for QueryBuilder<'a, T, DB> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("executor", &self.executor)
            .field("spec", &self.spec)
            .field("allow_unsafe", &self.allow_unsafe)
            .finish()
    }
}

impl<'a, T, DB: Database> Clauses for QueryBuilder<'a, T, DB> {
    fn spec_mut(&mut self) -> &mut QuerySpec {
        &mut self.spec
    }
}

impl<'a, T, DB> QueryBuilder<'a, T, DB>
where
    T: Entity,
    DB: Driver,
{
    pub fn new(executor: Executor<'a, DB>, catalog: &'a Catalog) -> Self {
        Self {
            executor,
            catalog,
            spec: QuerySpec::of::<T>(),
            allow_unsafe: false,
            _marker: PhantomData,
        }
    }

    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    /// The accumulated clauses, e.g. for use as a sub-query.
    pub fn into_spec(self) -> QuerySpec {
        self.spec
    }

    /// Allows update, delete, increment and decrement without WHERE predicates.
    pub fn allow_unsafe(mut self) -> Self {
        self.allow_unsafe = true;
        self
    }

    pub fn compiler(&self) -> Compiler<'a> {
        Compiler::new(self.catalog, DB::dialect())
    }

    /// Compiles the SELECT without executing it.
    pub fn to_statement(&self) -> WeftResult<Statement> {
        self.compiler().compile(&self.spec)
    }

    pub fn to_sql(&self) -> WeftResult<String> {
        self.to_statement().map(|statement| statement.sql)
    }

    fn ensure_filtered(&self, operation: &'static str) -> WeftResult<()> {
        if self.spec.wheres.is_empty() && !self.allow_unsafe {
            return Err(WeftError::UnsafeOperation(operation));
        }
        Ok(())
    }

    fn table(&self) -> Arc<str> {
        self.catalog.table_name(T::KEY)
    }
}

impl<'a, T, DB> QueryBuilder<'a, T, DB>
where
    T: BindColumn<DB>,
    DB: Driver,
    for<'c> &'c mut DB::Connection: sqlx::Executor<'c, Database = DB>,
    for<'q> <DB as Database>::Arguments<'q>: sqlx::IntoArguments<'q, DB>,
{
    async fn run_execute(
        &mut self,
        operation: &'static str,
        statement: &Statement,
    ) -> WeftResult<DB::QueryResult> {
        trace_statement(operation, statement);
        let start = Instant::now();
        let result = self.executor.execute(statement).await?;
        record_query_metrics(operation, &self.table(), start.elapsed());
        Ok(result)
    }

    async fn run_fetch_all(
        &mut self,
        operation: &'static str,
        statement: &Statement,
    ) -> WeftResult<Vec<DB::Row>> {
        trace_statement(operation, statement);
        let start = Instant::now();
        let rows = self.executor.fetch_all(statement).await?;
        record_query_metrics(operation, &self.table(), start.elapsed());
        Ok(rows)
    }

    async fn run_fetch_optional(
        &mut self,
        operation: &'static str,
        statement: &Statement,
    ) -> WeftResult<Option<DB::Row>> {
        trace_statement(operation, statement);
        let start = Instant::now();
        let row = self.executor.fetch_optional(statement).await?;
        record_query_metrics(operation, &self.table(), start.elapsed());
        Ok(row)
    }

    /// Runs the SELECT and binds every row.
    #[tracing::instrument(skip(self), fields(entity = T::schema().type_name))]
    pub async fn get_many(mut self) -> WeftResult<Vec<T>> {
        let statement = self.to_statement()?;
        let rows = self.run_fetch_all("select", &statement).await?;
        Ok(bind_many::<T, DB>(&rows)?)
    }

    /// Runs the SELECT with `LIMIT 1` and binds the row, if any.
    #[tracing::instrument(skip(self), fields(entity = T::schema().type_name))]
    pub async fn get_one(mut self) -> WeftResult<Option<T>> {
        if self.spec.raw.is_none() {
            self.spec.limit = Some(1);
        }
        let statement = self.to_statement()?;
        let row = self.run_fetch_optional("select", &statement).await?;
        Ok(row.as_ref().map(bind_row::<T, DB>).transpose()?)
    }

    /// Selects a single column of the first matching row.
    #[tracing::instrument(skip_all, fields(entity = T::schema().type_name))]
    pub async fn value<V>(mut self, column: impl Into<ColumnRef>) -> WeftResult<Option<V>>
    where
        V: for<'r> Decode<'r, DB> + Type<DB>,
        usize: ColumnIndex<DB::Row>,
    {
        let mut spec = self.spec.to_single_column(column.into());
        if spec.raw.is_none() {
            spec.limit = Some(1);
        }
        let statement = self.compiler().compile(&spec)?;
        let row = self.run_fetch_optional("value", &statement).await?;
        Ok(row.map(|row| row.try_get::<V, _>(0)).transpose()?)
    }

    /// Selects a single column of every matching row.
    #[tracing::instrument(skip_all, fields(entity = T::schema().type_name))]
    pub async fn pluck<V>(mut self, column: impl Into<ColumnRef>) -> WeftResult<Vec<V>>
    where
        V: for<'r> Decode<'r, DB> + Type<DB>,
        usize: ColumnIndex<DB::Row>,
    {
        let spec = self.spec.to_single_column(column.into());
        let statement = self.compiler().compile(&spec)?;
        let rows = self.run_fetch_all("pluck", &statement).await?;
        rows.iter()
            .map(|row| row.try_get::<V, _>(0).map_err(WeftError::from))
            .collect()
    }

    /// Streams bound rows without collecting the result set.
    #[tracing::instrument(skip(self), fields(entity = T::schema().type_name))]
    pub fn stream(self) -> WeftResult<BoxStream<'a, WeftResult<T>>>
    where
        T: 'a,
    {
        let statement = self.to_statement()?;
        trace_statement("stream", &statement);
        let executor = self.executor;
        Ok(Box::pin(async_stream::try_stream! {
            let mut rows = executor.fetch_stream(statement);
            while let Some(row) = rows.next().await {
                let row = row?;
                yield bind_row::<T, DB>(&row)?;
            }
        }))
    }

    /// Inserts the present fields of `entity` and returns the new id.
    ///
    /// The id is 0 when the backend reports none (e.g. no primary key).
    #[tracing::instrument(skip_all, fields(entity = T::schema().type_name))]
    pub async fn insert(mut self, entity: &T) -> WeftResult<i64> {
        let statement = self
            .compiler()
            .compile_insert(T::KEY, &[entity.values()], true)?;
        match DB::dialect().insert_id() {
            InsertId::Driver => {
                let result = self.run_execute("insert", &statement).await?;
                Ok(DB::last_insert_id(&result).unwrap_or_default())
            }
            InsertId::Returning | InsertId::ScopeIdentity => {
                match self.run_fetch_optional("insert", &statement).await? {
                    Some(row) => Ok(DB::returned_id(&row)?),
                    None => Ok(0),
                }
            }
        }
    }

    /// Inserts all rows in one statement and returns the affected row count.
    #[tracing::instrument(skip_all, fields(entity = T::schema().type_name, rows = entities.len()))]
    pub async fn insert_batch(mut self, entities: &[T]) -> WeftResult<u64> {
        let rows: Vec<_> = entities.iter().map(Entity::values).collect();
        let statement = self.compiler().compile_insert(T::KEY, &rows, false)?;
        let result = self.run_execute("insert_batch", &statement).await?;
        Ok(DB::rows_affected(&result))
    }

    /// Writes the present fields of `entity` to every matching row.
    #[tracing::instrument(skip_all, fields(entity = T::schema().type_name))]
    pub async fn update(mut self, entity: &T) -> WeftResult<u64> {
        self.ensure_filtered("update")?;
        let assignments: Vec<Assignment> = entity
            .values()
            .into_iter()
            .filter_map(|(field, value)| {
                value.map(|value| Assignment::Set(Field::new(T::KEY, field), value))
            })
            .collect();
        let statement = self.compiler().compile_update(&self.spec, &assignments)?;
        let result = self.run_execute("update", &statement).await?;
        Ok(DB::rows_affected(&result))
    }

    #[tracing::instrument(skip(self), fields(entity = T::schema().type_name))]
    pub async fn delete(mut self) -> WeftResult<u64> {
        self.ensure_filtered("delete")?;
        let statement = self.compiler().compile_delete(&self.spec)?;
        let result = self.run_execute("delete", &statement).await?;
        Ok(DB::rows_affected(&result))
    }

    /// `SET field = field + amount` on every matching row.
    #[tracing::instrument(skip(self, amount), fields(entity = T::schema().type_name))]
    pub async fn increment(mut self, field: Field, amount: impl Into<Value>) -> WeftResult<u64> {
        self.ensure_filtered("increment")?;
        let assignment = Assignment::Increment(field, amount.into());
        self.run_step("increment", assignment).await
    }

    /// `SET field = field - amount` on every matching row.
    #[tracing::instrument(skip(self, amount), fields(entity = T::schema().type_name))]
    pub async fn decrement(mut self, field: Field, amount: impl Into<Value>) -> WeftResult<u64> {
        self.ensure_filtered("decrement")?;
        let assignment = Assignment::Decrement(field, amount.into());
        self.run_step("decrement", assignment).await
    }

    async fn run_step(&mut self, operation: &'static str, assignment: Assignment) -> WeftResult<u64> {
        let statement = self.compiler().compile_update(&self.spec, &[assignment])?;
        let result = self.run_execute(operation, &statement).await?;
        Ok(DB::rows_affected(&result))
    }

    /// `COUNT(*)` over the matching rows.
    #[tracing::instrument(skip(self), fields(entity = T::schema().type_name))]
    pub async fn count(mut self) -> WeftResult<i64>
    where
        i64: for<'r> Decode<'r, DB> + Type<DB>,
        usize: ColumnIndex<DB::Row>,
    {
        let count = self
            .aggregate::<i64>("count", Aggregate::Count, ColumnRef::expr("*"))
            .await?;
        Ok(count.into_inner())
    }

    /// `SUM(column)`; absent when no row matches.
    pub async fn sum<V>(mut self, column: impl Into<ColumnRef>) -> WeftResult<Opt<V>>
    where
        V: for<'r> Decode<'r, DB> + Type<DB> + Default,
        usize: ColumnIndex<DB::Row>,
    {
        self.aggregate("sum", Aggregate::Sum, column.into()).await
    }

    pub async fn avg<V>(mut self, column: impl Into<ColumnRef>) -> WeftResult<Opt<V>>
    where
        V: for<'r> Decode<'r, DB> + Type<DB> + Default,
        usize: ColumnIndex<DB::Row>,
    {
        self.aggregate("avg", Aggregate::Avg, column.into()).await
    }

    pub async fn min<V>(mut self, column: impl Into<ColumnRef>) -> WeftResult<Opt<V>>
    where
        V: for<'r> Decode<'r, DB> + Type<DB> + Default,
        usize: ColumnIndex<DB::Row>,
    {
        self.aggregate("min", Aggregate::Min, column.into()).await
    }

    pub async fn max<V>(mut self, column: impl Into<ColumnRef>) -> WeftResult<Opt<V>>
    where
        V: for<'r> Decode<'r, DB> + Type<DB> + Default,
        usize: ColumnIndex<DB::Row>,
    {
        self.aggregate("max", Aggregate::Max, column.into()).await
    }

    async fn aggregate<V>(
        &mut self,
        operation: &'static str,
        aggregate: Aggregate,
        target: ColumnRef,
    ) -> WeftResult<Opt<V>>
    where
        V: for<'r> Decode<'r, DB> + Type<DB> + Default,
        usize: ColumnIndex<DB::Row>,
    {
        let spec = self.spec.to_aggregate(aggregate, target);
        let statement = self.compiler().compile(&spec)?;
        match self.run_fetch_optional(operation, &statement).await? {
            Some(row) => Ok(row.try_get::<Opt<V>, _>(0)?),
            None => Ok(Opt::absent()),
        }
    }

    #[tracing::instrument(skip(self), fields(entity = T::schema().type_name))]
    pub async fn exists(mut self) -> WeftResult<bool> {
        let statement = self.compiler().compile(&self.spec.to_exists())?;
        Ok(self.run_fetch_optional("exists", &statement).await?.is_some())
    }

    pub async fn doesnt_exist(self) -> WeftResult<bool> {
        self.exists().await.map(|exists| !exists)
    }
}
