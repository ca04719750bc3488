//! The clause model: plain data describing one query.
//!
//! A [`QuerySpec`] is built through the [`Clauses`] chain and rendered by the
//! [`Compiler`](crate::Compiler). It owns no resources and can be compiled any
//! number of times.

use smallvec::SmallVec;

use crate::schema::{Entity, EntityKey, Field};
use crate::value::Value;

/// Left-hand side of a predicate, a select item, a group or an order item.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnRef {
    /// A field, optionally qualified by a table alias (`u.name`).
    Field {
        prefix: Option<String>,
        field: Field,
    },
    /// A select-list alias (`total`).
    Alias(String),
    /// Verbatim SQL text.
    Expr(String),
}

impl ColumnRef {
    pub fn alias(name: impl Into<String>) -> Self {
        Self::Alias(name.into())
    }

    pub fn expr(sql: impl Into<String>) -> Self {
        Self::Expr(sql.into())
    }
}

impl From<Field> for ColumnRef {
    fn from(field: Field) -> Self {
        Self::Field {
            prefix: None,
            field,
        }
    }
}

impl Field {
    /// Qualifies the field with a table alias.
    pub fn of(self, prefix: impl Into<String>) -> ColumnRef {
        ColumnRef::Field {
            prefix: Some(prefix.into()),
            field: self,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    In,
    NotIn,
    Like,
    NotLike,
    Between,
    NotBetween,
    /// Target text followed verbatim by the operand string.
    Raw,
    /// Column-to-column equality.
    RawEq,
    IsNull,
    IsNotNull,
}

impl Operator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq | Self::RawEq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
            Self::Between => "BETWEEN",
            Self::NotBetween => "NOT BETWEEN",
            Self::Raw => "",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
        }
    }
}

/// Right-hand side of a predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    None,
    Value(Value),
    List(Vec<Value>),
    SubQuery(Box<QuerySpec>),
    Column(ColumnRef),
    Raw(String),
}

impl Operand {
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    pub fn list<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::List(values.into_iter().map(Into::into).collect())
    }

    pub fn sub(query: QuerySpec) -> Self {
        Self::SubQuery(Box::new(query))
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<QuerySpec> for Operand {
    fn from(query: QuerySpec) -> Self {
        Self::sub(query)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub target: ColumnRef,
    pub op: Operator,
    pub operand: Operand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl Aggregate {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Sum => "SUM",
            Self::Avg => "AVG",
            Self::Min => "MIN",
            Self::Max => "MAX",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectExpr {
    Column(ColumnRef),
    SubQuery(Box<QuerySpec>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    pub expr: SelectExpr,
    pub aggregate: Option<Aggregate>,
    pub alias: Option<String>,
}

impl SelectItem {
    pub fn column(target: impl Into<ColumnRef>) -> Self {
        Self {
            expr: SelectExpr::Column(target.into()),
            aggregate: None,
            alias: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
}

impl JoinKind {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
            Self::Right => "RIGHT JOIN",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub table: EntityKey,
    pub alias: Option<String>,
    /// Equality conditions, ANDed.
    pub on: SmallVec<[(ColumnRef, ColumnRef); 2]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub target: ColumnRef,
    pub direction: Direction,
}

/// Hand-written SQL that replaces clause compilation entirely.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSql {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Accumulated clause state for one SELECT.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub table: EntityKey,
    pub alias: Option<String>,
    pub distinct: bool,
    pub select: Vec<SelectItem>,
    pub joins: Vec<Join>,
    pub wheres: Vec<Predicate>,
    pub group_by: Vec<ColumnRef>,
    pub havings: Vec<Predicate>,
    pub order_by: Vec<OrderItem>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub lock: bool,
    pub raw: Option<RawSql>,
}

impl QuerySpec {
    pub fn new(table: EntityKey) -> Self {
        Self {
            table,
            alias: None,
            distinct: false,
            select: Vec::with_capacity(4),
            joins: Vec::new(),
            wheres: Vec::with_capacity(4),
            group_by: Vec::new(),
            havings: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            lock: false,
            raw: None,
        }
    }

    /// A query over `T`'s table, typically used as a sub-query.
    pub fn of<T: Entity>() -> Self {
        Self::new(T::KEY)
    }

    /// Same filters and joins, projected to a single aggregate with no ordering or paging.
    pub fn to_aggregate(&self, aggregate: Aggregate, target: ColumnRef) -> Self {
        let mut spec = self.clone();
        spec.select = vec![SelectItem {
            expr: SelectExpr::Column(target),
            aggregate: Some(aggregate),
            alias: None,
        }];
        spec.distinct = false;
        spec.order_by.clear();
        spec.limit = None;
        spec.offset = None;
        spec.lock = false;
        spec
    }

    /// `SELECT 1 ... LIMIT 1` over the same filters.
    pub fn to_exists(&self) -> Self {
        let mut spec = self.clone();
        spec.select = vec![SelectItem::column(ColumnRef::expr("1"))];
        spec.distinct = false;
        spec.order_by.clear();
        spec.limit = Some(1);
        spec.offset = None;
        spec.lock = false;
        spec
    }

    /// The same query projected to a single column.
    pub fn to_single_column(&self, target: ColumnRef) -> Self {
        let mut spec = self.clone();
        spec.select = vec![SelectItem::column(target)];
        spec
    }
}

/// The clause chain, shared by [`QuerySpec`] and the executing
/// [`QueryBuilder`](crate::QueryBuilder).
pub trait Clauses: Sized {
    fn spec_mut(&mut self) -> &mut QuerySpec;

    /// Aliases the base table (`FROM users AS u`).
    fn alias(mut self, alias: impl Into<String>) -> Self {
        self.spec_mut().alias = Some(alias.into());
        self
    }

    fn distinct(mut self) -> Self {
        self.spec_mut().distinct = true;
        self
    }

    fn select<I, C>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<ColumnRef>,
    {
        let spec = self.spec_mut();
        spec.select
            .extend(columns.into_iter().map(SelectItem::column));
        self
    }

    fn select_as(mut self, column: impl Into<ColumnRef>, alias: impl Into<String>) -> Self {
        let mut item = SelectItem::column(column);
        item.alias = Some(alias.into());
        self.spec_mut().select.push(item);
        self
    }

    /// `SUM(column) AS alias` and friends.
    fn select_aggregate(
        mut self,
        aggregate: Aggregate,
        column: impl Into<ColumnRef>,
        alias: impl Into<String>,
    ) -> Self {
        self.spec_mut().select.push(SelectItem {
            expr: SelectExpr::Column(column.into()),
            aggregate: Some(aggregate),
            alias: Some(alias.into()),
        });
        self
    }

    /// `(sub-query) AS alias`.
    fn select_sub(mut self, query: QuerySpec, alias: impl Into<String>) -> Self {
        self.spec_mut().select.push(SelectItem {
            expr: SelectExpr::SubQuery(Box::new(query)),
            aggregate: None,
            alias: Some(alias.into()),
        });
        self
    }

    fn join<E, I, L, R>(mut self, kind: JoinKind, alias: Option<&str>, on: I) -> Self
    where
        E: Entity,
        I: IntoIterator<Item = (L, R)>,
        L: Into<ColumnRef>,
        R: Into<ColumnRef>,
    {
        self.spec_mut().joins.push(Join {
            kind,
            table: E::KEY,
            alias: alias.map(str::to_owned),
            on: on.into_iter().map(|(l, r)| (l.into(), r.into())).collect(),
        });
        self
    }

    fn inner_join<E: Entity>(
        self,
        alias: Option<&str>,
        left: impl Into<ColumnRef>,
        right: impl Into<ColumnRef>,
    ) -> Self {
        self.join::<E, _, ColumnRef, ColumnRef>(JoinKind::Inner, alias, [(left.into(), right.into())])
    }

    fn left_join<E: Entity>(
        self,
        alias: Option<&str>,
        left: impl Into<ColumnRef>,
        right: impl Into<ColumnRef>,
    ) -> Self {
        self.join::<E, _, ColumnRef, ColumnRef>(JoinKind::Left, alias, [(left.into(), right.into())])
    }

    fn where_op(mut self, target: impl Into<ColumnRef>, op: Operator, operand: Operand) -> Self {
        self.spec_mut().wheres.push(Predicate {
            target: target.into(),
            op,
            operand,
        });
        self
    }

    fn where_eq(self, target: impl Into<ColumnRef>, value: impl Into<Value>) -> Self {
        self.where_op(target, Operator::Eq, Operand::value(value))
    }

    fn where_ne(self, target: impl Into<ColumnRef>, value: impl Into<Value>) -> Self {
        self.where_op(target, Operator::Ne, Operand::value(value))
    }

    fn where_gt(self, target: impl Into<ColumnRef>, value: impl Into<Value>) -> Self {
        self.where_op(target, Operator::Gt, Operand::value(value))
    }

    fn where_ge(self, target: impl Into<ColumnRef>, value: impl Into<Value>) -> Self {
        self.where_op(target, Operator::Ge, Operand::value(value))
    }

    fn where_lt(self, target: impl Into<ColumnRef>, value: impl Into<Value>) -> Self {
        self.where_op(target, Operator::Lt, Operand::value(value))
    }

    fn where_le(self, target: impl Into<ColumnRef>, value: impl Into<Value>) -> Self {
        self.where_op(target, Operator::Le, Operand::value(value))
    }

    fn where_in<I, V>(self, target: impl Into<ColumnRef>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.where_op(target, Operator::In, Operand::list(values))
    }

    fn where_not_in<I, V>(self, target: impl Into<ColumnRef>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.where_op(target, Operator::NotIn, Operand::list(values))
    }

    /// `col LIKE <concat(parts)>`; `"%"` parts are inlined, the rest are bound.
    fn where_like<I, V>(self, target: impl Into<ColumnRef>, parts: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.where_op(target, Operator::Like, Operand::list(parts))
    }

    fn where_not_like<I, V>(self, target: impl Into<ColumnRef>, parts: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.where_op(target, Operator::NotLike, Operand::list(parts))
    }

    fn where_between(
        self,
        target: impl Into<ColumnRef>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        self.where_op(target, Operator::Between, Operand::list([low.into(), high.into()]))
    }

    fn where_not_between(
        self,
        target: impl Into<ColumnRef>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        self.where_op(target, Operator::NotBetween, Operand::list([low.into(), high.into()]))
    }

    /// Appends `sql` verbatim after the target, e.g. `where_raw(User::AGE, " > 18")`.
    fn where_raw(self, target: impl Into<ColumnRef>, sql: impl Into<String>) -> Self {
        self.where_op(target, Operator::Raw, Operand::Raw(sql.into()))
    }

    /// Column-to-column equality.
    fn where_column(self, left: impl Into<ColumnRef>, right: impl Into<ColumnRef>) -> Self {
        self.where_op(left, Operator::RawEq, Operand::Column(right.into()))
    }

    fn where_null(self, target: impl Into<ColumnRef>) -> Self {
        self.where_op(target, Operator::IsNull, Operand::None)
    }

    fn where_not_null(self, target: impl Into<ColumnRef>) -> Self {
        self.where_op(target, Operator::IsNotNull, Operand::None)
    }

    /// `col OP (sub-query)`.
    fn where_sub(self, target: impl Into<ColumnRef>, op: Operator, query: QuerySpec) -> Self {
        self.where_op(target, op, Operand::sub(query))
    }

    fn group_by<I, C>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<ColumnRef>,
    {
        self.spec_mut()
            .group_by
            .extend(columns.into_iter().map(Into::into));
        self
    }

    fn having(mut self, target: impl Into<ColumnRef>, op: Operator, operand: Operand) -> Self {
        self.spec_mut().havings.push(Predicate {
            target: target.into(),
            op,
            operand,
        });
        self
    }

    fn order_by(mut self, target: impl Into<ColumnRef>, direction: Direction) -> Self {
        self.spec_mut().order_by.push(OrderItem {
            target: target.into(),
            direction,
        });
        self
    }

    fn order_asc(self, target: impl Into<ColumnRef>) -> Self {
        self.order_by(target, Direction::Asc)
    }

    fn order_desc(self, target: impl Into<ColumnRef>) -> Self {
        self.order_by(target, Direction::Desc)
    }

    /// Sets the maximum number of rows to return.
    fn limit(mut self, limit: u64) -> Self {
        self.spec_mut().limit = Some(limit);
        self
    }

    /// Sets the number of rows to skip.
    fn offset(mut self, offset: u64) -> Self {
        self.spec_mut().offset = Some(offset);
        self
    }

    /// One-based page of `size` rows; page 0 is treated as page 1.
    fn page(self, page: u64, size: u64) -> Self {
        self.offset(page.saturating_sub(1).saturating_mul(size)).limit(size)
    }

    fn lock_for_update(mut self) -> Self {
        self.spec_mut().lock = true;
        self
    }

    /// Replaces clause compilation with hand-written SQL.
    ///
    /// A top-level override is sent exactly as written, so it uses the backend's
    /// own placeholder syntax (`$1` on PostgreSQL). Inside a sub-query, write `?`:
    /// the text is renumbered together with the enclosing statement.
    fn raw<I, V>(mut self, sql: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.spec_mut().raw = Some(RawSql {
            sql: sql.into(),
            params: params.into_iter().map(Into::into).collect(),
        });
        self
    }
}

impl Clauses for QuerySpec {
    fn spec_mut(&mut self) -> &mut QuerySpec {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AGE: Field = Field::new("clause::User", "age");

    #[test]
    fn page_is_offset_and_limit() {
        let paged = QuerySpec::new("clause::User").page(3, 10);
        let manual = QuerySpec::new("clause::User").offset(20).limit(10);
        assert_eq!(paged, manual);
        assert_eq!(QuerySpec::new("t").page(0, 10).offset, Some(0));
    }

    #[test]
    fn huge_pages_saturate_the_offset() {
        let paged = QuerySpec::new("t").page(u64::MAX / 2, 10);
        assert_eq!(paged.offset, Some(u64::MAX));
        assert_eq!(paged.limit, Some(10));
    }

    #[test]
    fn chain_accumulates_predicates_in_order() {
        let spec = QuerySpec::new("clause::User")
            .where_gt(AGE, 18)
            .where_in(AGE.of("u"), [1, 2])
            .where_null(ColumnRef::expr("deleted_at"));
        assert_eq!(spec.wheres.len(), 3);
        assert_eq!(spec.wheres[0].operand, Operand::Value(Value::I64(18)));
        assert_eq!(
            spec.wheres[1].target,
            ColumnRef::Field {
                prefix: Some("u".to_owned()),
                field: AGE
            }
        );
        assert_eq!(spec.wheres[2].op, Operator::IsNull);
    }

    #[test]
    fn aggregate_projection_drops_paging() {
        let spec = QuerySpec::new("t")
            .where_eq(AGE, 1)
            .order_desc(AGE)
            .limit(5)
            .lock_for_update();
        let agg = spec.to_aggregate(Aggregate::Sum, AGE.into());
        assert_eq!(agg.wheres, spec.wheres);
        assert!(agg.order_by.is_empty());
        assert_eq!(agg.limit, None);
        assert!(!agg.lock);
        assert_eq!(agg.select[0].aggregate, Some(Aggregate::Sum));

        let exists = spec.to_exists();
        assert_eq!(exists.limit, Some(1));
    }
}
