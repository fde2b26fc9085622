//! SELECT/DELETE compilation with ROWNUM pagination.
//!
//! Oracle has no `LIMIT`/`OFFSET`. A bare count wraps the query and filters
//! the wrapper on `ROWNUM <= n`. A `(start, count)` window needs two
//! wrappers, because `ROWNUM` is assigned as rows are produced and a filter
//! such as `ROWNUM > 20` never matches: the middle query numbers the rows up
//! to `start + count` and the outer one keeps those numbered above `start`.
//! The outermost query re-selects the projection by column name so the row
//! number never leaks into results. Expressions without a usable name are
//! aliased `"_C<n>"` first. A `*` projection cannot be enumerated, so the
//! row number is dropped again when rows are normalised.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{OracleError, Result};

static TRAILING_QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""(\w+)"$"#).expect("valid regex"));

static PLAIN_COLUMN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^(?:(?:"[^"]+"|[a-z_][a-z0-9_$#]*)\.)?([a-z_][a-z0-9_$#]*)$"#)
        .expect("valid regex")
});

static PLAIN_ALIAS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\sAS\s+([a-z_][a-z0-9_$#]*)$").expect("valid regex"));

static SIMPLE_ORDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^([a-z0-9_]+)(\s+ASC|\s+DESC)?$").expect("valid regex")
});

/// Alias of the numbered subquery in windowed pagination.
const PAGE_ALIAS: &str = "\"_PAGE\"";

/// Name of the row-number column in windowed pagination.
pub(crate) const ROW_NUMBER_COLUMN: &str = "_RNUM";

/// Alias of the row-number column in windowed pagination.
const ROW_NUMBER_ALIAS: &str = "\"_RNUM\"";

/// Prefix of the aliases given to unnamed expressions under pagination.
const GENERATED_ALIAS_PREFIX: &str = "_C";

/// Statement kind of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QueryKind {
    /// `SELECT`.
    #[default]
    Select,
    /// `DELETE`.
    Delete,
}

/// How filter fragments are joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Connective {
    /// All fragments must hold.
    #[default]
    And,
    /// Any fragment may hold.
    Or,
}

impl Connective {
    /// Returns the SQL keyword.
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

/// Row limit of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Limit {
    /// At most `n` rows.
    Count(u64),
    /// Rows ranked `start + 1 ..= start + count`.
    Window {
        /// Rows to skip.
        start: u64,
        /// Rows to return.
        count: u64,
    },
}

impl Limit {
    /// Builds a limit from separately supplied start and count text.
    ///
    /// An empty start means no offset. Anything non-numeric is rejected
    /// instead of producing broken SQL.
    pub fn from_parts(start: Option<&str>, count: &str) -> Result<Self> {
        let count = parse_bound("count", count)?;
        match start.map(str::trim).filter(|s| !s.is_empty()) {
            None => Ok(Self::Count(count)),
            Some(start) => Ok(Self::Window {
                start: parse_bound("start", start)?,
                count,
            }),
        }
    }
}

fn parse_bound(what: &str, text: &str) -> Result<u64> {
    text.trim().parse().map_err(|_| {
        OracleError::MalformedPagination(format!("{what} '{text}' is not a non-negative integer"))
    })
}

impl FromStr for Limit {
    type Err = OracleError;

    /// Parses `"10"` or `"20, 10"` (start, count).
    fn from_str(s: &str) -> Result<Self> {
        match s.split_once(',') {
            Some((start, count)) => Self::from_parts(Some(start), count),
            None => Self::from_parts(None, s),
        }
    }
}

/// Abstract description of a SELECT or DELETE.
///
/// Fragments are SQL text produced by the model layer; the compiler only
/// assembles them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueryDescriptor {
    /// SELECT or DELETE.
    pub kind: QueryKind,
    /// Whether to select distinct rows.
    pub distinct: bool,
    /// Projection expressions.
    pub select: Vec<String>,
    /// Source relation and joins, concatenated with spaces.
    pub from: Vec<String>,
    /// Filter fragments.
    pub filter: Vec<String>,
    /// Joins filter fragments.
    pub connective: Connective,
    /// Grouping expressions.
    pub group_by: Vec<String>,
    /// Having fragments, always joined with `AND`.
    pub having: Vec<String>,
    /// Ordering expression.
    pub order_by: Option<String>,
    /// Row limit.
    pub limit: Option<Limit>,
}

impl QueryDescriptor {
    /// Creates an empty SELECT descriptor.
    #[must_use]
    pub fn select<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            select: columns.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Creates an empty DELETE descriptor.
    #[must_use]
    pub fn delete() -> Self {
        Self {
            kind: QueryKind::Delete,
            ..Self::default()
        }
    }

    /// Adds a source relation or join.
    #[must_use]
    pub fn from(mut self, relation: impl Into<String>) -> Self {
        self.from.push(relation.into());
        self
    }

    /// Adds a filter fragment.
    #[must_use]
    pub fn filter(mut self, predicate: impl Into<String>) -> Self {
        self.filter.push(predicate.into());
        self
    }

    /// Sets how filter fragments are joined.
    #[must_use]
    pub fn connective(mut self, connective: Connective) -> Self {
        self.connective = connective;
        self
    }

    /// Adds a grouping expression.
    #[must_use]
    pub fn group_by(mut self, expr: impl Into<String>) -> Self {
        self.group_by.push(expr.into());
        self
    }

    /// Adds a having fragment.
    #[must_use]
    pub fn having(mut self, predicate: impl Into<String>) -> Self {
        self.having.push(predicate.into());
        self
    }

    /// Sets the ordering expression.
    #[must_use]
    pub fn order_by(mut self, expr: impl Into<String>) -> Self {
        self.order_by = Some(expr.into());
        self
    }

    /// Sets the row limit.
    #[must_use]
    pub fn limit(mut self, limit: Limit) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Selects distinct rows.
    #[must_use]
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }
}

/// A projection entry: the name the wrapper re-selects and the expression.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Projection {
    key: String,
    expr: String,
    /// Whether `key` is a column name rather than the expression itself.
    named: bool,
}

/// Compiles [`QueryDescriptor`]s into Oracle SQL.
#[derive(Debug, Default, Clone, Copy)]
pub struct QueryCompiler;

impl QueryCompiler {
    /// Creates a new compiler.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Compiles a descriptor.
    ///
    /// Returns an empty string when the descriptor has no source relation.
    pub fn compile(&self, query: &QueryDescriptor) -> Result<String> {
        if query.from.is_empty() {
            return Ok(String::new());
        }

        let paginated = query.kind == QueryKind::Select && query.limit.is_some();
        let mut projection = projection(&query.select);
        if paginated {
            alias_unnamed(&mut projection);
        }

        let mut predicate = (!query.filter.is_empty()).then(|| {
            let joiner = format!(") {} (", query.connective.as_sql());
            format!("({})", query.filter.join(&joiner))
        });
        let mut sql = match query.kind {
            QueryKind::Delete => {
                match query.limit {
                    Some(Limit::Count(n)) => {
                        // The bound applies to the whole predicate, not to one alternative.
                        let alternatives =
                            query.connective == Connective::Or && query.filter.len() > 1;
                        predicate = Some(match predicate {
                            None => format!("(ROWNUM <= {n})"),
                            Some(p) if alternatives => format!("({p}) AND (ROWNUM <= {n})"),
                            Some(p) => format!("{p} AND (ROWNUM <= {n})"),
                        });
                    }
                    Some(Limit::Window { .. }) => {
                        return Err(OracleError::UnsupportedOperation(
                            "DELETE with a row offset".into(),
                        ))
                    }
                    None => {}
                }
                String::from("DELETE")
            }
            QueryKind::Select => {
                let distinct = if query.distinct { "DISTINCT " } else { "" };
                let columns = if projection.is_empty() {
                    String::from("*")
                } else {
                    join_exprs(&projection)
                };
                format!("SELECT {distinct}{columns}")
            }
        };

        sql.push_str(" FROM ");
        sql.push_str(&query.from.join(" "));

        if let Some(predicate) = predicate {
            sql.push_str(" WHERE ");
            sql.push_str(&predicate);
        }
        if !query.group_by.is_empty() {
            sql.push_str(&format!(" GROUP BY {}", query.group_by.join(", ")));
        }
        if !query.having.is_empty() {
            sql.push_str(&format!(" HAVING ( {} )", query.having.join(" ) AND ( ")));
        }
        if let Some(ref order) = query.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order_clause(order));
        }

        match (query.kind, query.limit) {
            (QueryKind::Select, Some(limit)) => Ok(paginate(sql, &projection, limit)),
            _ => Ok(sql),
        }
    }
}

/// Returns the name an expression's column carries in the result, if it can
/// be referenced from an enclosing query.
fn output_name(expr: &str) -> Option<String> {
    if is_star(expr) {
        return None;
    }
    if let Some(caps) = TRAILING_QUOTED.captures(expr) {
        return Some(format!("\"{}\"", &caps[1]));
    }
    PLAIN_COLUMN
        .captures(expr)
        .or_else(|| PLAIN_ALIAS.captures(expr))
        .map(|caps| caps[1].to_string())
}

fn is_star(expr: &str) -> bool {
    let expr = expr.trim();
    expr == "*" || expr.ends_with(".*")
}

/// Builds the de-duplicated projection. An expression with an output name is
/// keyed by that name; a later expression with the same key replaces the
/// earlier one in place.
fn projection(select: &[String]) -> Vec<Projection> {
    let mut out: Vec<Projection> = Vec::with_capacity(select.len());
    for expr in select {
        let name = output_name(expr);
        let key = name.clone().unwrap_or_else(|| expr.clone());
        match out.iter_mut().find(|p| p.key == key) {
            Some(existing) => existing.expr.clone_from(expr),
            None => out.push(Projection {
                key,
                expr: expr.clone(),
                named: name.is_some(),
            }),
        }
    }
    out
}

/// Gives every unnamed expression a generated alias, so the pagination
/// wrapper re-selects the computed column instead of re-evaluating the
/// expression outside its scope. Not needed when the wrapper selects `*`.
fn alias_unnamed(projection: &mut [Projection]) {
    if projection.iter().any(|p| is_star(&p.expr)) {
        return;
    }
    for (i, p) in projection.iter_mut().enumerate() {
        if !p.named {
            let alias = format!("\"{GENERATED_ALIAS_PREFIX}{}\"", i + 1);
            p.expr = format!("{} AS {alias}", p.expr);
            p.key = alias;
            p.named = true;
        }
    }
}

fn join_exprs(projection: &[Projection]) -> String {
    projection
        .iter()
        .map(|p| p.expr.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Columns the pagination wrapper re-selects.
fn outer_columns(projection: &[Projection]) -> String {
    if projection.is_empty() || projection.iter().any(|p| is_star(&p.expr)) {
        return String::from("*");
    }
    projection
        .iter()
        .map(|p| p.key.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Quotes a single-column ordering; passes expressions through verbatim.
fn order_clause(order: &str) -> String {
    let order = order.trim();
    match SIMPLE_ORDER.captures(order) {
        Some(caps) => format!(
            "\"{}\"{}",
            &caps[1],
            caps.get(2).map_or("", |m| m.as_str())
        ),
        None => order.to_string(),
    }
}

fn paginate(sql: String, projection: &[Projection], limit: Limit) -> String {
    let columns = outer_columns(projection);
    match limit {
        Limit::Count(n) => format!("SELECT {columns} FROM ({sql}) WHERE ROWNUM <= {n}"),
        Limit::Window { start, count } => {
            let end = start.saturating_add(count);
            format!(
                "SELECT {columns} FROM (SELECT {PAGE_ALIAS}.*, ROWNUM AS {ROW_NUMBER_ALIAS} FROM ({sql}) {PAGE_ALIAS} WHERE ROWNUM <= {end}) WHERE {ROW_NUMBER_ALIAS} > {start}"
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(query: &QueryDescriptor) -> String {
        QueryCompiler::new().compile(query).unwrap()
    }

    #[test]
    fn test_no_from_is_empty() {
        let query = QueryDescriptor::select(["\"ID\""]);
        assert_eq!(compile(&query), "");
    }

    #[test]
    fn test_basic_select() {
        let query = QueryDescriptor::select(["\"SiteTree\".\"ID\"", "\"Title\""])
            .from("\"SiteTree\"")
            .filter("\"ParentID\" = 0")
            .filter("\"ShowInMenus\" = 1");
        assert_eq!(
            compile(&query),
            "SELECT \"SiteTree\".\"ID\", \"Title\" FROM \"SiteTree\" WHERE (\"ParentID\" = 0) AND (\"ShowInMenus\" = 1)"
        );
    }

    #[test]
    fn test_or_connective_and_distinct() {
        let query = QueryDescriptor::select(["\"ClassName\""])
            .distinct()
            .from("\"SiteTree\"")
            .filter("\"A\" = 1")
            .filter("\"B\" = 2")
            .connective(Connective::Or);
        assert_eq!(
            compile(&query),
            "SELECT DISTINCT \"ClassName\" FROM \"SiteTree\" WHERE (\"A\" = 1) OR (\"B\" = 2)"
        );
    }

    #[test]
    fn test_group_having_order() {
        let query = QueryDescriptor::select(["\"ParentID\"", "COUNT(*) AS \"Total\""])
            .from("\"SiteTree\"")
            .group_by("\"ParentID\"")
            .having("COUNT(*) > 1")
            .having("\"ParentID\" > 0")
            .order_by("ParentID DESC");
        assert_eq!(
            compile(&query),
            "SELECT \"ParentID\", COUNT(*) AS \"Total\" FROM \"SiteTree\" GROUP BY \"ParentID\" HAVING ( COUNT(*) > 1 ) AND ( \"ParentID\" > 0 ) ORDER BY \"ParentID\" DESC"
        );
    }

    #[test]
    fn test_order_expression_passes_through() {
        assert_eq!(order_clause("Sort"), "\"Sort\"");
        assert_eq!(order_clause("Sort asc"), "\"Sort\" asc");
        assert_eq!(order_clause("\"Sort\" DESC, \"ID\""), "\"Sort\" DESC, \"ID\"");
        assert_eq!(order_clause("DBMS_RANDOM.VALUE"), "DBMS_RANDOM.VALUE");
    }

    #[test]
    fn test_projection_dedup() {
        let query = QueryDescriptor::select([
            "\"SiteTree\".\"ID\"",
            "\"Title\"",
            "\"SiteTree_Live\".\"ID\"",
        ])
        .from("\"SiteTree\"");
        assert_eq!(
            compile(&query),
            "SELECT \"SiteTree_Live\".\"ID\", \"Title\" FROM \"SiteTree\""
        );
    }

    #[test]
    fn test_count_limit_wraps_query() {
        let query = QueryDescriptor::select(["\"SiteTree\".\"ID\"", "\"Title\""])
            .from("\"SiteTree\"")
            .order_by("Title")
            .limit(Limit::Count(10));
        assert_eq!(
            compile(&query),
            "SELECT \"ID\", \"Title\" FROM (SELECT \"SiteTree\".\"ID\", \"Title\" FROM \"SiteTree\" ORDER BY \"Title\") WHERE ROWNUM <= 10"
        );
    }

    #[test]
    fn test_window_limit_uses_half_open_range() {
        let query = QueryDescriptor::select(["\"ID\"", "\"Title\""])
            .from("\"SiteTree\"")
            .order_by("Title")
            .limit(Limit::Window {
                start: 20,
                count: 10,
            });
        let sql = compile(&query);
        assert_eq!(
            sql,
            "SELECT \"ID\", \"Title\" FROM (SELECT \"_PAGE\".*, ROWNUM AS \"_RNUM\" FROM (SELECT \"ID\", \"Title\" FROM \"SiteTree\" ORDER BY \"Title\") \"_PAGE\" WHERE ROWNUM <= 30) WHERE \"_RNUM\" > 20"
        );
        assert!(sql.starts_with("SELECT \"ID\", \"Title\" FROM"));
    }

    #[test]
    fn test_star_projection_wrapper() {
        let query = QueryDescriptor::select(["\"SiteTree\".*"])
            .from("\"SiteTree\"")
            .limit(Limit::Count(1));
        assert_eq!(
            compile(&query),
            "SELECT * FROM (SELECT \"SiteTree\".* FROM \"SiteTree\") WHERE ROWNUM <= 1"
        );
    }

    #[test]
    fn test_aggregate_under_limit_is_aliased() {
        let query = QueryDescriptor::select(["\"ParentID\"", "COUNT(*)"])
            .from("\"SiteTree\"")
            .group_by("\"ParentID\"")
            .limit(Limit::Count(5));
        assert_eq!(
            compile(&query),
            "SELECT \"ParentID\", \"_C2\" FROM (SELECT \"ParentID\", COUNT(*) AS \"_C2\" FROM \"SiteTree\" GROUP BY \"ParentID\") WHERE ROWNUM <= 5"
        );
    }

    #[test]
    fn test_unaliased_expressions_kept_without_limit() {
        let query = QueryDescriptor::select(["\"ParentID\"", "COUNT(*)"])
            .from("\"SiteTree\"")
            .group_by("\"ParentID\"");
        assert_eq!(
            compile(&query),
            "SELECT \"ParentID\", COUNT(*) FROM \"SiteTree\" GROUP BY \"ParentID\""
        );
    }

    #[test]
    fn test_unquoted_names_reselected_by_name() {
        let query = QueryDescriptor::select(["\"SiteTree\".ID", "LOWER(\"Title\") AS title_lower"])
            .from("\"SiteTree\"")
            .limit(Limit::Window {
                start: 10,
                count: 5,
            });
        let sql = compile(&query);
        assert!(sql.starts_with("SELECT ID, title_lower FROM (SELECT \"_PAGE\".*"));
        assert!(sql.contains(
            "FROM (SELECT \"SiteTree\".ID, LOWER(\"Title\") AS title_lower FROM \"SiteTree\") \"_PAGE\""
        ));
    }

    #[test]
    fn test_star_with_expression_not_aliased() {
        let query = QueryDescriptor::select(["\"SiteTree\".*", "1 + 1"])
            .from("\"SiteTree\"")
            .limit(Limit::Count(3));
        assert_eq!(
            compile(&query),
            "SELECT * FROM (SELECT \"SiteTree\".*, 1 + 1 FROM \"SiteTree\") WHERE ROWNUM <= 3"
        );
    }

    #[test]
    fn test_delete() {
        let query = QueryDescriptor::delete()
            .from("\"SiteTree\"")
            .filter("\"ID\" = 5");
        assert_eq!(
            compile(&query),
            "DELETE FROM \"SiteTree\" WHERE (\"ID\" = 5)"
        );
    }

    #[test]
    fn test_delete_with_count_limit() {
        let query = QueryDescriptor::delete()
            .from("\"Log\"")
            .filter("\"Expired\" = 1")
            .limit(Limit::Count(100));
        assert_eq!(
            compile(&query),
            "DELETE FROM \"Log\" WHERE (\"Expired\" = 1) AND (ROWNUM <= 100)"
        );
    }

    #[test]
    fn test_delete_count_limit_bounds_every_alternative() {
        let query = QueryDescriptor::delete()
            .from("\"Log\"")
            .filter("\"A\" = 1")
            .filter("\"B\" = 2")
            .connective(Connective::Or)
            .limit(Limit::Count(1));
        assert_eq!(
            compile(&query),
            "DELETE FROM \"Log\" WHERE ((\"A\" = 1) OR (\"B\" = 2)) AND (ROWNUM <= 1)"
        );

        let unfiltered = QueryDescriptor::delete()
            .from("\"Log\"")
            .connective(Connective::Or)
            .limit(Limit::Count(5));
        assert_eq!(
            compile(&unfiltered),
            "DELETE FROM \"Log\" WHERE (ROWNUM <= 5)"
        );
    }

    #[test]
    fn test_delete_with_window_rejected() {
        let query = QueryDescriptor::delete()
            .from("\"Log\"")
            .limit(Limit::Window { start: 1, count: 1 });
        assert!(matches!(
            QueryCompiler::new().compile(&query),
            Err(OracleError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_limit_parsing() {
        assert_eq!("10".parse::<Limit>().unwrap(), Limit::Count(10));
        assert_eq!(
            "20, 10".parse::<Limit>().unwrap(),
            Limit::Window {
                start: 20,
                count: 10
            }
        );
        assert_eq!(
            Limit::from_parts(Some(""), "5").unwrap(),
            Limit::Count(5)
        );
        assert!(matches!(
            "ten".parse::<Limit>(),
            Err(OracleError::MalformedPagination(_))
        ));
        assert!(matches!(
            Limit::from_parts(Some("abc"), "10"),
            Err(OracleError::MalformedPagination(_))
        ));
        assert!(matches!(
            Limit::from_parts(Some("1"), "-1"),
            Err(OracleError::MalformedPagination(_))
        ));
    }
}
