use std::fmt::Write;

use crate::catalog::Catalog;
use crate::clause::{ColumnRef, Direction, Join, Operand, Operator, Predicate, QuerySpec, SelectExpr, SelectItem};
use crate::dialect::{Dialect, InsertId};
use crate::error::{WeftError, WeftResult};
use crate::schema::{EntityKey, Field};
use crate::value::Value;

/// Final SQL text and its parameters, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// One `SET` item of an UPDATE.
#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    Set(Field, Value),
    Increment(Field, Value),
    Decrement(Field, Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Where,
    Having,
}

/// Renders clause models into [`Statement`]s for one dialect.
#[derive(Debug, Clone, Copy)]
pub struct Compiler<'c> {
    catalog: &'c Catalog,
    dialect: &'c dyn Dialect,
}

impl<'c> Compiler<'c> {
    pub fn new(catalog: &'c Catalog, dialect: &'c dyn Dialect) -> Self {
        Self { catalog, dialect }
    }

    pub fn dialect(&self) -> &'c dyn Dialect {
        self.dialect
    }

    /// Compiles a SELECT. A raw override is returned unchanged.
    pub fn compile(&self, spec: &QuerySpec) -> WeftResult<Statement> {
        if let Some(raw) = &spec.raw {
            return Ok(Statement {
                sql: raw.sql.clone(),
                params: raw.params.clone(),
            });
        }
        let mut sql = String::with_capacity(128);
        let mut params = Vec::with_capacity(spec.wheres.len() + 2);
        self.render_query(spec, &mut sql, &mut params)?;
        Ok(self.finish(sql, params))
    }

    /// Compiles an INSERT of one or more rows.
    ///
    /// The column list is every field present in at least one row, in declaration
    /// order; rows missing one of those fields get `NULL`. With `returning_id` the
    /// dialect's id retrieval strategy is applied.
    pub fn compile_insert(
        &self,
        table: EntityKey,
        rows: &[Vec<(&'static str, Option<Value>)>],
        returning_id: bool,
    ) -> WeftResult<Statement> {
        if rows.is_empty() {
            return Err(WeftError::EmptyBatch);
        }
        let schema = self.catalog.schema(table);
        let fields: Vec<&'static str> = schema
            .columns
            .iter()
            .map(|def| def.field)
            .filter(|field| rows.iter().any(|row| lookup(row, field).is_some()))
            .collect();
        if fields.is_empty() {
            return Err(WeftError::NothingToWrite);
        }

        let mut sql = String::with_capacity(64 + fields.len() * 16);
        let mut params = Vec::with_capacity(rows.len() * fields.len());
        let columns = fields
            .iter()
            .map(|field| self.column_of(table, field))
            .collect::<Vec<_>>()
            .join(", ");
        let _ = write!(
            sql,
            "INSERT INTO {} ({}) VALUES ",
            self.catalog.table_name(table),
            columns
        );
        for (i, row) in rows.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push('(');
            for (j, field) in fields.iter().enumerate() {
                if j > 0 {
                    sql.push_str(", ");
                }
                match lookup(row, field) {
                    Some(value) if !value.is_null() => {
                        sql.push('?');
                        params.push(value.clone());
                    }
                    _ => sql.push_str("NULL"),
                }
            }
            sql.push(')');
        }

        if returning_id {
            match self.dialect.insert_id() {
                InsertId::Driver => {}
                InsertId::Returning => {
                    if let Some(pk) = schema.primary_key() {
                        let _ = write!(sql, " RETURNING {}", self.column_of(table, pk.field));
                    }
                }
                InsertId::ScopeIdentity => {
                    sql.push_str("; SELECT CAST(SCOPE_IDENTITY() AS BIGINT)");
                }
            }
        }
        Ok(self.finish(sql, params))
    }

    /// Compiles an UPDATE restricted by the query's WHERE predicates.
    pub fn compile_update(&self, spec: &QuerySpec, assignments: &[Assignment]) -> WeftResult<Statement> {
        if assignments.is_empty() {
            return Err(WeftError::NothingToWrite);
        }
        let mut sql = String::with_capacity(128);
        let mut params = Vec::with_capacity(assignments.len() + spec.wheres.len());
        let _ = write!(sql, "UPDATE {} SET ", self.catalog.table_name(spec.table));
        for (i, assignment) in assignments.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            let (field, value, op) = match assignment {
                Assignment::Set(field, value) => (field, value, None),
                Assignment::Increment(field, value) => (field, value, Some('+')),
                Assignment::Decrement(field, value) => (field, value, Some('-')),
            };
            let column = self.catalog.resolve(*field).column;
            match op {
                None if value.is_null() => {
                    let _ = write!(sql, "{} = NULL", column);
                    continue;
                }
                None => {
                    let _ = write!(sql, "{} = ?", column);
                }
                Some(op) => {
                    let _ = write!(sql, "{} = {} {} ?", column, column, op);
                }
            }
            params.push(value.clone());
        }
        self.render_predicates(" WHERE ", &spec.wheres, &spec.select, Section::Where, &mut sql, &mut params)?;
        Ok(self.finish(sql, params))
    }

    /// Compiles a DELETE restricted by the query's WHERE predicates.
    pub fn compile_delete(&self, spec: &QuerySpec) -> WeftResult<Statement> {
        let mut sql = String::with_capacity(128);
        let mut params = Vec::with_capacity(spec.wheres.len());
        let _ = write!(sql, "DELETE FROM {}", self.catalog.table_name(spec.table));
        self.render_predicates(" WHERE ", &spec.wheres, &spec.select, Section::Where, &mut sql, &mut params)?;
        Ok(self.finish(sql, params))
    }

    /// SQL text for a column reference.
    pub fn column_sql(&self, target: &ColumnRef) -> String {
        match target {
            ColumnRef::Field { prefix, field } => {
                let column = self.catalog.resolve(*field).column;
                match prefix {
                    Some(prefix) => format!("{}.{}", prefix, column),
                    None => column.to_string(),
                }
            }
            ColumnRef::Alias(text) | ColumnRef::Expr(text) => text.clone(),
        }
    }

    fn column_of(&self, table: EntityKey, field: &'static str) -> String {
        self.catalog.resolve(Field::new(table, field)).column.to_string()
    }

    fn finish(&self, sql: String, params: Vec<Value>) -> Statement {
        Statement {
            sql: self.dialect.rewrite_placeholders(&sql),
            params,
        }
    }

    fn render_query(&self, spec: &QuerySpec, sql: &mut String, params: &mut Vec<Value>) -> WeftResult<()> {
        if let Some(raw) = &spec.raw {
            sql.push_str(&raw.sql);
            params.extend(raw.params.iter().cloned());
            return Ok(());
        }

        sql.push_str("SELECT ");
        if spec.distinct {
            sql.push_str("DISTINCT ");
        }
        if spec.select.is_empty() {
            sql.push('*');
        }
        for (i, item) in spec.select.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            self.render_select_expr(item, sql, params)?;
            if let Some(alias) = &item.alias {
                let _ = write!(sql, " AS {}", alias);
            }
        }

        let _ = write!(sql, " FROM {}", self.catalog.table_name(spec.table));
        if let Some(alias) = &spec.alias {
            let _ = write!(sql, " AS {}", alias);
        }

        for join in &spec.joins {
            self.render_join(join, sql)?;
        }

        self.render_predicates(" WHERE ", &spec.wheres, &spec.select, Section::Where, sql, params)?;

        for (i, group) in spec.group_by.iter().enumerate() {
            sql.push_str(if i == 0 { " GROUP BY " } else { ", " });
            sql.push_str(&self.column_sql(group));
        }

        self.render_predicates(" HAVING ", &spec.havings, &spec.select, Section::Having, sql, params)?;

        for (i, order) in spec.order_by.iter().enumerate() {
            sql.push_str(if i == 0 { " ORDER BY " } else { ", " });
            sql.push_str(&self.column_sql(&order.target));
            sql.push_str(match order.direction {
                Direction::Asc => " ASC",
                Direction::Desc => " DESC",
            });
        }

        if spec.limit.is_some() || spec.offset.is_some() {
            self.dialect
                .render_pagination(sql, params, spec.limit, spec.offset, !spec.order_by.is_empty());
        }

        if spec.lock {
            if let Some(lock) = self.dialect.lock_clause() {
                sql.push_str(lock);
            }
        }
        Ok(())
    }

    fn render_select_expr(&self, item: &SelectItem, sql: &mut String, params: &mut Vec<Value>) -> WeftResult<()> {
        if let Some(aggregate) = item.aggregate {
            sql.push_str(aggregate.as_sql());
            sql.push('(');
        }
        match &item.expr {
            SelectExpr::Column(column) => sql.push_str(&self.column_sql(column)),
            SelectExpr::SubQuery(query) => {
                sql.push('(');
                self.render_query(query, sql, params)?;
                sql.push(')');
            }
        }
        if item.aggregate.is_some() {
            sql.push(')');
        }
        Ok(())
    }

    fn render_join(&self, join: &Join, sql: &mut String) -> WeftResult<()> {
        if join.on.is_empty() {
            return Err(WeftError::compile(format!(
                "join on `{}` has no conditions",
                join.table
            )));
        }
        let _ = write!(
            sql,
            " {} {}",
            join.kind.as_sql(),
            self.catalog.table_name(join.table)
        );
        if let Some(alias) = &join.alias {
            let _ = write!(sql, " AS {}", alias);
        }
        for (i, (left, right)) in join.on.iter().enumerate() {
            sql.push_str(if i == 0 { " ON " } else { " AND " });
            let _ = write!(sql, "{} = {}", self.column_sql(left), self.column_sql(right));
        }
        Ok(())
    }

    fn render_predicates(
        &self,
        keyword: &str,
        predicates: &[Predicate],
        select: &[SelectItem],
        section: Section,
        sql: &mut String,
        params: &mut Vec<Value>,
    ) -> WeftResult<()> {
        for (i, predicate) in predicates.iter().enumerate() {
            sql.push_str(if i == 0 { keyword } else { " AND " });
            self.render_predicate(predicate, select, section, sql, params)?;
        }
        Ok(())
    }

    /// Renders a predicate target. In HAVING, an alias is replaced by the aliased
    /// expression for dialects that reject aliases there.
    fn render_target(
        &self,
        target: &ColumnRef,
        select: &[SelectItem],
        section: Section,
        params: &mut Vec<Value>,
    ) -> WeftResult<String> {
        if let (Section::Having, ColumnRef::Alias(name)) = (section, target) {
            let aliased = select
                .iter()
                .find(|item| item.alias.as_deref() == Some(name.as_str()));
            if let (false, Some(item)) = (self.dialect.having_allows_alias(), aliased) {
                let mut expr = String::new();
                self.render_select_expr(item, &mut expr, params)?;
                return Ok(expr);
            }
        }
        Ok(self.column_sql(target))
    }

    fn render_predicate(
        &self,
        predicate: &Predicate,
        select: &[SelectItem],
        section: Section,
        sql: &mut String,
        params: &mut Vec<Value>,
    ) -> WeftResult<()> {
        let lhs = self.render_target(&predicate.target, select, section, params)?;
        let op = predicate.op;
        match (op, &predicate.operand) {
            (Operator::Raw, Operand::Raw(text)) | (Operator::Raw, Operand::Value(Value::String(text))) => {
                sql.push_str(&lhs);
                sql.push_str(text);
            }
            (Operator::Raw, _) => {
                return Err(WeftError::compile("raw predicate needs a SQL string operand"));
            }
            (Operator::IsNull | Operator::IsNotNull, Operand::None) => {
                let _ = write!(sql, "{} {}", lhs, op.as_sql());
            }
            (Operator::IsNull | Operator::IsNotNull, _) => {
                return Err(WeftError::compile("null checks take no operand"));
            }
            (_, Operand::SubQuery(query)) => {
                let _ = write!(sql, "{} {} (", lhs, op.as_sql());
                self.render_query(query, sql, params)?;
                sql.push(')');
            }
            (Operator::RawEq, Operand::Column(right)) => {
                let _ = write!(sql, "{} = {}", lhs, self.column_sql(right));
            }
            (Operator::RawEq, _) => {
                return Err(WeftError::compile("column equality needs a column operand"));
            }
            (Operator::In | Operator::NotIn, Operand::List(values)) => {
                if values.is_empty() {
                    sql.push_str(if op == Operator::In { "1=0" } else { "1=1" });
                    return Ok(());
                }
                let _ = write!(sql, "{} {} (", lhs, op.as_sql());
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        sql.push(',');
                    }
                    sql.push('?');
                    params.push(value.clone());
                }
                sql.push(')');
            }
            (Operator::In | Operator::NotIn, _) => {
                return Err(WeftError::compile(format!("{} expects a list operand", op.as_sql())));
            }
            (Operator::Like | Operator::NotLike, Operand::List(parts)) => {
                self.render_like(&lhs, op, parts, sql, params)?;
            }
            (Operator::Like | Operator::NotLike, Operand::Value(part)) => {
                self.render_like(&lhs, op, std::slice::from_ref(part), sql, params)?;
            }
            (Operator::Like | Operator::NotLike, _) => {
                return Err(WeftError::compile("LIKE expects a pattern"));
            }
            (Operator::Between | Operator::NotBetween, Operand::List(bounds)) if bounds.len() == 2 => {
                let _ = write!(sql, "{} {} (?) AND (?)", lhs, op.as_sql());
                params.extend(bounds.iter().cloned());
            }
            (Operator::Between | Operator::NotBetween, _) => {
                return Err(WeftError::compile(format!("{} expects exactly two values", op.as_sql())));
            }
            (Operator::Eq | Operator::Ne, Operand::Value(Value::Null)) => {
                let check = if op == Operator::Eq { Operator::IsNull } else { Operator::IsNotNull };
                let _ = write!(sql, "{} {}", lhs, check.as_sql());
            }
            // Both sides go through the database's own float-to-text conversion.
            (_, Operand::Value(value)) if value.is_float() => {
                let _ = write!(
                    sql,
                    "{} {} {}",
                    self.dialect.float_as_text(&lhs),
                    op.as_sql(),
                    self.dialect.float_as_text("?")
                );
                params.push(value.clone());
            }
            (_, Operand::Value(value)) => {
                let _ = write!(sql, "{} {} ?", lhs, op.as_sql());
                params.push(value.clone());
            }
            (_, Operand::Column(right)) => {
                let _ = write!(sql, "{} {} {}", lhs, op.as_sql(), self.column_sql(right));
            }
            (_, operand) => {
                return Err(WeftError::compile(format!(
                    "`{}` cannot take operand {:?}",
                    op.as_sql(),
                    operand
                )));
            }
        }
        Ok(())
    }

    fn render_like(
        &self,
        lhs: &str,
        op: Operator,
        parts: &[Value],
        sql: &mut String,
        params: &mut Vec<Value>,
    ) -> WeftResult<()> {
        if parts.is_empty() {
            return Err(WeftError::compile("LIKE expects at least one pattern part"));
        }
        let rendered: Vec<String> = parts
            .iter()
            .map(|part| {
                if part.is_wildcard() {
                    "'%'".to_owned()
                } else {
                    params.push(part.clone());
                    "?".to_owned()
                }
            })
            .collect();
        let pattern = match rendered.as_slice() {
            [single] => single.clone(),
            _ => self.dialect.concat(&rendered),
        };
        let _ = write!(sql, "{} {} {}", lhs, op.as_sql(), pattern);
        Ok(())
    }
}

fn lookup<'r>(row: &'r [(&'static str, Option<Value>)], field: &str) -> Option<&'r Value> {
    row.iter()
        .find(|(name, _)| *name == field)
        .and_then(|(_, value)| value.as_ref())
}
