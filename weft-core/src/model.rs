use crate::binder::BindColumn;
use crate::catalog::Catalog;
use crate::driver::Driver;
use crate::executor::{Executor, IntoExecutor};
use crate::query::QueryBuilder;

/// Entry points for querying an entity.
///
/// Implemented for every entity that can bind rows of `DB`.
pub trait Model<DB: Driver>: BindColumn<DB> {
    /// Starts a query on any executor: a pool, a connection or `&mut *tx`.
    fn find<'a, E>(executor: E, catalog: &'a Catalog) -> QueryBuilder<'a, Self, DB>
    where
        E: IntoExecutor<'a, DB = DB>,
    {
        QueryBuilder::new(executor.into_executor(), catalog)
    }

    fn find_in_pool<'a>(pool: &'a sqlx::Pool<DB>, catalog: &'a Catalog) -> QueryBuilder<'a, Self, DB> {
        QueryBuilder::new(Executor::Pool(pool), catalog)
    }

    /// Starts a query inside an open transaction.
    fn find_in_tx<'a, 't>(
        tx: &'a mut sqlx::Transaction<'t, DB>,
        catalog: &'a Catalog,
    ) -> QueryBuilder<'a, Self, DB> {
        QueryBuilder::new(Executor::Conn(&mut **tx), catalog)
    }
}

impl<T, DB> Model<DB> for T
where
    T: BindColumn<DB>,
    DB: Driver,
{
}
