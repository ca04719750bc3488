//! # Weft ORM
//!
//! Declare a row type, chain clauses on typed field handles, and Weft compiles
//! one parameterized statement for the backend's dialect (MySQL, PostgreSQL,
//! SQLite, SQL Server), runs it through sqlx and binds the rows back.
//!
//! ```rust,no_run
//! use weft_orm::prelude::*;
//!
//! #[derive(Entity, Debug, Default)]
//! struct User {
//!     #[weft(tag = "primary;auto_increment")]
//!     id: OptInt,
//!     name: OptString,
//!     age: OptInt,
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = weft_orm::sqlx::SqlitePool::connect("sqlite::memory:").await?;
//! let catalog = Catalog::new();
//! catalog.register::<User>();
//!
//! let user = User { name: "Alice".into(), age: 18.into(), ..User::default() };
//! let id = User::find(&pool, &catalog).insert(&user).await?;
//!
//! let adults = User::find(&pool, &catalog)
//!     .where_ge(User::AGE, 18)
//!     .order_desc(User::ID)
//!     .page(1, 20)
//!     .get_many()
//!     .await?;
//! # let _ = (id, adults);
//! # Ok(())
//! # }
//! ```
//!
//! Generated code refers to `weft_core`, so depend on `weft-core` alongside
//! this crate.

pub use weft_core::*;
pub use weft_macros::Entity;

pub mod prelude {
    pub use weft_core::prelude::*;

    pub use crate::Entity;
}
