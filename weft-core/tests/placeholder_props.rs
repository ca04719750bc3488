use proptest::prelude::*;
use proptest::strategy::ValueTree;
use proptest::test_runner::{Config, TestRunner};
use weft_core::{
    Aggregate, Catalog, Clauses, ColumnDef, ColumnRef, Compiler, Dialect, Entity, EntitySchema,
    Field, MssqlDialect, MySqlDialect, Operand, Operator, PostgresDialect, QuerySpec,
    SqliteDialect, Statement, ToValue, Value,
};

#[derive(Debug, Default)]
struct Account {
    id: weft_core::OptInt,
    name: weft_core::OptString,
    balance: weft_core::OptFloat,
}

impl Account {
    const ID: Field = Field::new(<Self as Entity>::KEY, "id");
    const NAME: Field = Field::new(<Self as Entity>::KEY, "name");
    const BALANCE: Field = Field::new(<Self as Entity>::KEY, "balance");
}

impl Entity for Account {
    const KEY: &'static str = "placeholder_props::Account";

    fn schema() -> &'static EntitySchema {
        static COLUMNS: [ColumnDef; 3] = [
            ColumnDef::new("id", None, "primary"),
            ColumnDef::new("name", None, ""),
            ColumnDef::new("balance", None, ""),
        ];
        static SCHEMA: EntitySchema =
            EntitySchema::new("placeholder_props::Account", "Account", None, &COLUMNS);
        &SCHEMA
    }

    fn values(&self) -> Vec<(&'static str, Option<Value>)> {
        vec![
            ("id", self.id.to_value()),
            ("name", self.name.to_value()),
            ("balance", self.balance.to_value()),
        ]
    }
}

#[derive(Debug, Clone)]
enum Filter {
    Eq(i64),
    FloatGt(f64),
    In(Vec<i64>),
    Between(i64, i64),
    Like(Vec<String>),
    Raw,
    Null,
}

fn filter_strategy() -> impl Strategy<Value = Filter> {
    prop_oneof![
        any::<i64>().prop_map(Filter::Eq),
        (-1.0e6f64..1.0e6).prop_map(Filter::FloatGt),
        prop::collection::vec(any::<i64>(), 0..6).prop_map(Filter::In),
        (any::<i64>(), any::<i64>()).prop_map(|(a, b)| Filter::Between(a, b)),
        prop::collection::vec(prop_oneof![Just("%".to_owned()), "[a-z?$']{1,6}"], 1..4)
            .prop_map(Filter::Like),
        Just(Filter::Raw),
        Just(Filter::Null),
    ]
}

fn apply(spec: QuerySpec, filter: Filter) -> QuerySpec {
    match filter {
        Filter::Eq(v) => spec.where_eq(Account::ID, v),
        Filter::FloatGt(v) => spec.where_gt(Account::BALANCE, v),
        Filter::In(values) => spec.where_in(Account::ID, values),
        Filter::Between(a, b) => spec.where_between(Account::ID, a, b),
        Filter::Like(parts) => spec.where_like(Account::NAME, parts),
        Filter::Raw => spec.where_raw(Account::ID, " > 0"),
        Filter::Null => spec.where_null(Account::NAME),
    }
}

fn sub_query(filters: Vec<Filter>) -> QuerySpec {
    filters
        .into_iter()
        .fold(QuerySpec::of::<Account>().select([Account::ID]), apply)
}

#[derive(Debug, Clone)]
struct Shape {
    select_sub: Option<(Vec<Filter>, Option<u64>)>,
    total: bool,
    join: bool,
    having: Option<(bool, f64)>,
}

fn shape_strategy() -> impl Strategy<Value = Shape> {
    (
        prop::option::of((
            prop::collection::vec(filter_strategy(), 0..3),
            prop::option::of(1u64..20),
        )),
        any::<bool>(),
        any::<bool>(),
        prop::option::of((any::<bool>(), -1.0e3f64..1.0e3)),
    )
        .prop_map(|(select_sub, total, join, having)| Shape {
            select_sub,
            total,
            join,
            having,
        })
}

fn spec_strategy() -> impl Strategy<Value = QuerySpec> {
    (
        prop::collection::vec(filter_strategy(), 0..5),
        prop::option::of(prop::collection::vec(filter_strategy(), 0..3)),
        prop::option::of((0u64..5, 1u64..50)),
        shape_strategy(),
    )
        .prop_map(|(filters, sub_filters, page, shape)| {
            let mut spec = QuerySpec::of::<Account>().select([Account::ID]);
            if let Some((filters, limit)) = shape.select_sub.clone() {
                let mut sub = sub_query(filters);
                if let Some(limit) = limit {
                    sub = sub.limit(limit);
                }
                spec = spec.select_sub(sub, "sub");
            }
            if shape.total {
                spec = spec.select_aggregate(Aggregate::Sum, Account::BALANCE, "total");
            }
            if shape.join {
                spec = spec.inner_join::<Account>(Some("a2"), Account::ID, Account::ID.of("a2"));
            }
            spec = filters.into_iter().fold(spec, apply);
            if let Some(sub_filters) = sub_filters {
                spec = spec.where_sub(Account::ID, Operator::In, sub_query(sub_filters));
            }
            if let Some((on_sub, bound)) = shape.having {
                // HAVING may only name an alias the projection defines.
                let alias = match (on_sub, shape.select_sub.is_some(), shape.total) {
                    (true, true, _) | (false, true, false) => Some("sub"),
                    (_, _, true) => Some("total"),
                    _ => None,
                };
                spec = spec.group_by([Account::ID]);
                if let Some(alias) = alias {
                    spec = spec.having(ColumnRef::alias(alias), Operator::Gt, Operand::value(bound));
                }
            }
            if let Some((page, size)) = page {
                spec = spec.page(page, size);
            }
            spec
        })
}

fn question_marks(sql: &str) -> usize {
    let mut quoted = false;
    sql.chars()
        .filter(|&c| {
            if c == '\'' {
                quoted = !quoted;
            }
            !quoted && c == '?'
        })
        .count()
}

fn numbered(sql: &str) -> Vec<usize> {
    let mut out = Vec::new();
    let mut quoted = false;
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\'' {
            quoted = !quoted;
        }
        if !quoted && c == '$' {
            let mut digits = String::new();
            while let Some(d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                digits.push(*d);
                chars.next();
            }
            if let Ok(n) = digits.parse() {
                out.push(n);
            }
        }
    }
    out
}

fn compile(catalog: &Catalog, dialect: &dyn Dialect, spec: &QuerySpec) -> Statement {
    Compiler::new(catalog, dialect).compile(spec).unwrap()
}

#[test]
fn params_match_placeholders_for_every_dialect() {
    let catalog = Catalog::new();
    catalog.register::<Account>();
    let mut runner = TestRunner::new(Config {
        cases: 256,
        failure_persistence: None,
        ..Config::default()
    });
    let specs = spec_strategy();

    for _ in 0..256 {
        let spec = specs.new_tree(&mut runner).unwrap().current();
        for dialect in [&MySqlDialect as &dyn Dialect, &SqliteDialect, &MssqlDialect] {
            let statement = compile(&catalog, dialect, &spec);
            assert_eq!(
                question_marks(&statement.sql),
                statement.params.len(),
                "{}: {}",
                dialect.name(),
                statement.sql
            );
        }

        let statement = compile(&catalog, &PostgresDialect, &spec);
        let expected: Vec<usize> = (1..=statement.params.len()).collect();
        assert_eq!(numbered(&statement.sql), expected, "{}", statement.sql);
        assert_eq!(question_marks(&statement.sql), 0, "{}", statement.sql);
    }
}

#[test]
fn compilation_is_deterministic() {
    let catalog = Catalog::new();
    catalog.register::<Account>();
    let mut runner = TestRunner::new(Config {
        cases: 64,
        failure_persistence: None,
        ..Config::default()
    });
    let specs = spec_strategy();

    for _ in 0..64 {
        let spec = specs.new_tree(&mut runner).unwrap().current();
        assert_eq!(
            compile(&catalog, &PostgresDialect, &spec),
            compile(&catalog, &PostgresDialect, &spec)
        );
    }
}

#[test]
fn batch_insert_params_match_placeholders() {
    let catalog = Catalog::new();
    catalog.register::<Account>();
    let mut runner = TestRunner::new(Config {
        cases: 64,
        failure_persistence: None,
        ..Config::default()
    });
    let rows = prop::collection::vec(
        (
            prop::option::of("[a-z]{1,8}"),
            prop::option::of(-1.0e6f64..1.0e6),
        ),
        1..6,
    );

    for _ in 0..64 {
        let rows = rows.new_tree(&mut runner).unwrap().current();
        let accounts: Vec<Account> = rows
            .into_iter()
            .map(|(name, balance)| Account {
                name: weft_core::Opt::from_option(name),
                balance: weft_core::Opt::from_option(balance),
                ..Account::default()
            })
            .collect();
        let values: Vec<_> = accounts.iter().map(Entity::values).collect();
        let result = Compiler::new(&catalog, &PostgresDialect).compile_insert(Account::KEY, &values, true);
        match result {
            Ok(statement) => {
                let expected: Vec<usize> = (1..=statement.params.len()).collect();
                assert_eq!(numbered(&statement.sql), expected, "{}", statement.sql);
            }
            Err(err) => assert!(matches!(err, weft_core::WeftError::NothingToWrite)),
        }
    }
}
