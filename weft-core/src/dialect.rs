use crate::value::Value;

/// Shape of the pagination clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    /// `LIMIT ?,?` binding offset then count.
    OffsetCount,
    /// `LIMIT ? OFFSET ?` binding count then offset.
    CountOffset,
    /// `OFFSET ? ROWS FETCH NEXT ? ROWS ONLY`.
    OffsetFetch,
}

/// How the id of a freshly inserted row is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertId {
    /// Reported by the driver on the execute result.
    Driver,
    /// `INSERT ... RETURNING <primary key>`.
    Returning,
    /// The insert is followed by a scalar `SELECT` of the generated identity.
    ScopeIdentity,
}

/// Per-backend rendering rules.
///
/// Clause rendering always emits `?`; [`Dialect::rewrite_placeholders`] runs once
/// over the finished statement.
pub trait Dialect: std::fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether placeholders are numbered (`$1`, `$2`, ...).
    fn numbered_placeholders(&self) -> bool {
        false
    }

    /// Returns the placeholder for the `n`-th parameter (1-based).
    fn placeholder(&self, n: usize) -> String {
        if self.numbered_placeholders() {
            format!("${}", n)
        } else {
            "?".to_owned()
        }
    }

    /// Rewrites `?` placeholders left to right, skipping quoted text.
    fn rewrite_placeholders(&self, sql: &str) -> String {
        if !self.numbered_placeholders() {
            return sql.to_owned();
        }
        let mut out = String::with_capacity(sql.len() + 8);
        let mut quote: Option<char> = None;
        let mut n = 0;
        for ch in sql.chars() {
            match (quote, ch) {
                (None, '\'' | '"') => {
                    quote = Some(ch);
                    out.push(ch);
                }
                (Some(q), c) if c == q => {
                    quote = None;
                    out.push(ch);
                }
                (None, '?') => {
                    n += 1;
                    out.push_str(&self.placeholder(n));
                }
                _ => out.push(ch),
            }
        }
        out
    }

    fn pagination(&self) -> Pagination;

    /// Appends the pagination clause and binds its arguments in placeholder order.
    fn render_pagination(
        &self,
        sql: &mut String,
        params: &mut Vec<Value>,
        limit: Option<u64>,
        offset: Option<u64>,
        has_order: bool,
    ) {
        let count = limit.map_or(i64::MAX, clamp);
        let skip = offset.map_or(0, clamp);
        match self.pagination() {
            Pagination::OffsetCount => {
                sql.push_str(" LIMIT ?,?");
                params.push(Value::I64(skip));
                params.push(Value::I64(count));
            }
            Pagination::CountOffset => {
                sql.push_str(" LIMIT ? OFFSET ?");
                params.push(Value::I64(count));
                params.push(Value::I64(skip));
            }
            Pagination::OffsetFetch => {
                if !has_order {
                    sql.push_str(" ORDER BY (SELECT NULL)");
                }
                sql.push_str(" OFFSET ? ROWS");
                params.push(Value::I64(skip));
                if limit.is_some() {
                    sql.push_str(" FETCH NEXT ? ROWS ONLY");
                    params.push(Value::I64(count));
                }
            }
        }
    }

    /// Row lock suffix, `None` where unsupported.
    fn lock_clause(&self) -> Option<&'static str> {
        None
    }

    /// String concatenation of already rendered SQL fragments.
    fn concat(&self, parts: &[String]) -> String {
        parts.join(" || ")
    }

    /// Text form of a float column, so equality does not compare binary floats.
    fn float_as_text(&self, column: &str) -> String {
        format!("({} || '')", column)
    }

    fn insert_id(&self) -> InsertId {
        InsertId::Driver
    }

    /// Whether HAVING may reference select-list aliases.
    fn having_allows_alias(&self) -> bool {
        true
    }
}

fn clamp(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl Dialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }
    fn pagination(&self) -> Pagination {
        Pagination::OffsetCount
    }
    fn lock_clause(&self) -> Option<&'static str> {
        Some(" FOR UPDATE")
    }
    fn concat(&self, parts: &[String]) -> String {
        format!("CONCAT({})", parts.join(","))
    }
    fn float_as_text(&self, column: &str) -> String {
        format!("CONCAT({},'')", column)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }
    fn numbered_placeholders(&self) -> bool {
        true
    }
    fn pagination(&self) -> Pagination {
        Pagination::CountOffset
    }
    fn lock_clause(&self) -> Option<&'static str> {
        Some(" FOR UPDATE")
    }
    fn insert_id(&self) -> InsertId {
        InsertId::Returning
    }
    fn having_allows_alias(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }
    fn pagination(&self) -> Pagination {
        Pagination::CountOffset
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MssqlDialect;

impl Dialect for MssqlDialect {
    fn name(&self) -> &'static str {
        "mssql"
    }
    fn pagination(&self) -> Pagination {
        Pagination::OffsetFetch
    }
    fn concat(&self, parts: &[String]) -> String {
        parts.join(" + ")
    }
    fn float_as_text(&self, column: &str) -> String {
        column.to_owned()
    }
    fn insert_id(&self) -> InsertId {
        InsertId::ScopeIdentity
    }
    fn having_allows_alias(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postgres_numbers_placeholders_outside_literals() {
        let sql = PostgresDialect
            .rewrite_placeholders("SELECT * FROM t WHERE a = ? AND b LIKE '%?%' || ? AND \"c?\" = ?");
        assert_eq!(
            sql,
            "SELECT * FROM t WHERE a = $1 AND b LIKE '%?%' || $2 AND \"c?\" = $3"
        );
    }

    #[test]
    fn question_mark_dialects_are_untouched() {
        for dialect in [&MySqlDialect as &dyn Dialect, &SqliteDialect, &MssqlDialect] {
            assert_eq!(dialect.rewrite_placeholders("a = ? AND b = ?"), "a = ? AND b = ?");
        }
    }

    #[test]
    fn pagination_shapes_and_argument_order() {
        let mut sql = String::new();
        let mut params = Vec::new();
        MySqlDialect.render_pagination(&mut sql, &mut params, Some(10), Some(20), true);
        assert_eq!(sql, " LIMIT ?,?");
        assert_eq!(params, vec![Value::I64(20), Value::I64(10)]);

        let (mut sql, mut params) = (String::new(), Vec::new());
        SqliteDialect.render_pagination(&mut sql, &mut params, Some(10), Some(20), true);
        assert_eq!(sql, " LIMIT ? OFFSET ?");
        assert_eq!(params, vec![Value::I64(10), Value::I64(20)]);

        let (mut sql, mut params) = (String::new(), Vec::new());
        MssqlDialect.render_pagination(&mut sql, &mut params, Some(10), None, false);
        assert_eq!(sql, " ORDER BY (SELECT NULL) OFFSET ? ROWS FETCH NEXT ? ROWS ONLY");
        assert_eq!(params, vec![Value::I64(0), Value::I64(10)]);
    }

    #[test]
    fn concat_styles() {
        let parts = ["'%'".to_owned(), "?".to_owned()];
        assert_eq!(MySqlDialect.concat(&parts), "CONCAT('%',?)");
        assert_eq!(PostgresDialect.concat(&parts), "'%' || ?");
        assert_eq!(MssqlDialect.concat(&parts), "'%' + ?");
        assert_eq!(MySqlDialect.float_as_text("money"), "CONCAT(money,'')");
        assert_eq!(SqliteDialect.float_as_text("money"), "(money || '')");
        assert_eq!(MssqlDialect.float_as_text("money"), "money");
    }
}
