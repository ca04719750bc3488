//! Hand-written entities for unit tests, shaped like `#[derive(Entity)]` output.

use sqlx::{ColumnIndex, Database, Decode, Row, Type};

use crate::binder::BindColumn;
use crate::catalog::Catalog;
use crate::opt::Opt;
use crate::schema::{ColumnDef, Entity, EntitySchema, Field};
use crate::value::{ToValue, Value};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct User {
    pub id: Opt<i64>,
    pub name: Opt<String>,
    pub age: Opt<i64>,
    pub money: Opt<f64>,
}

impl User {
    pub const ID: Field = Field::new(<Self as Entity>::KEY, "id");
    pub const NAME: Field = Field::new(<Self as Entity>::KEY, "name");
    pub const AGE: Field = Field::new(<Self as Entity>::KEY, "age");
    pub const MONEY: Field = Field::new(<Self as Entity>::KEY, "money");
}

impl Entity for User {
    const KEY: &'static str = "fixtures::User";

    fn schema() -> &'static EntitySchema {
        static COLUMNS: [ColumnDef; 4] = [
            ColumnDef::new("id", None, "primary;auto_increment"),
            ColumnDef::new("name", None, "size:64"),
            ColumnDef::new("age", None, ""),
            ColumnDef::new("money", None, ""),
        ];
        static SCHEMA: EntitySchema = EntitySchema::new("fixtures::User", "User", None, &COLUMNS);
        &SCHEMA
    }

    fn values(&self) -> Vec<(&'static str, Option<Value>)> {
        vec![
            ("id", self.id.to_value()),
            ("name", self.name.to_value()),
            ("age", self.age.to_value()),
            ("money", self.money.to_value()),
        ]
    }
}

impl<DB: Database> BindColumn<DB> for User
where
    usize: ColumnIndex<DB::Row>,
    Opt<i64>: Type<DB> + for<'r> Decode<'r, DB>,
    Opt<String>: Type<DB> + for<'r> Decode<'r, DB>,
    Opt<f64>: Type<DB> + for<'r> Decode<'r, DB>,
{
    fn bind_column(&mut self, field: &str, row: &DB::Row, index: usize) -> Result<bool, sqlx::Error> {
        match field {
            "id" => self.id = row.try_get(index)?,
            "name" => self.name = row.try_get(index)?,
            "age" => self.age = row.try_get(index)?,
            "money" => self.money = row.try_get(index)?,
            _ => return Ok(false),
        }
        Ok(true)
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Order {
    pub id: Opt<i64>,
    pub user_id: Opt<i64>,
    pub amount: Opt<i64>,
}

impl Order {
    pub const ID: Field = Field::new(<Self as Entity>::KEY, "id");
    pub const USER_ID: Field = Field::new(<Self as Entity>::KEY, "user_id");
    pub const AMOUNT: Field = Field::new(<Self as Entity>::KEY, "amount");
}

impl Entity for Order {
    const KEY: &'static str = "fixtures::Order";

    fn schema() -> &'static EntitySchema {
        static COLUMNS: [ColumnDef; 3] = [
            ColumnDef::new("id", None, "primary"),
            ColumnDef::new("user_id", None, "index"),
            ColumnDef::new("amount", None, ""),
        ];
        static SCHEMA: EntitySchema =
            EntitySchema::new("fixtures::Order", "Order", Some("orders"), &COLUMNS);
        &SCHEMA
    }

    fn values(&self) -> Vec<(&'static str, Option<Value>)> {
        vec![
            ("id", self.id.to_value()),
            ("user_id", self.user_id.to_value()),
            ("amount", self.amount.to_value()),
        ]
    }
}

impl<DB: Database> BindColumn<DB> for Order
where
    usize: ColumnIndex<DB::Row>,
    Opt<i64>: Type<DB> + for<'r> Decode<'r, DB>,
{
    fn bind_column(&mut self, field: &str, row: &DB::Row, index: usize) -> Result<bool, sqlx::Error> {
        match field {
            "id" => self.id = row.try_get(index)?,
            "user_id" => self.user_id = row.try_get(index)?,
            "amount" => self.amount = row.try_get(index)?,
            _ => return Ok(false),
        }
        Ok(true)
    }
}

pub fn catalog() -> Catalog {
    let catalog = Catalog::new();
    catalog.register::<User>().register::<Order>();
    catalog
}
