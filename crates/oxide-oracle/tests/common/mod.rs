#![allow(dead_code)]

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::sync::LazyLock;

use oxide_oracle::prelude::{Driver, DriverError, OracleConfig, OracleDatabase, RawRow, Value};
use regex::Regex;

static TABLE_EXISTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^SELECT TABLE_NAME FROM USER_TABLES WHERE TABLE_NAME = '([^']*)'$").unwrap()
});
static CREATE_TABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^CREATE (?:GLOBAL TEMPORARY )?TABLE "([^"]+)""#).unwrap());
static DROP_TABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^DROP TABLE "([^"]+)"$"#).unwrap());
static CREATE_SEQUENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^CREATE SEQUENCE "([^"]+)""#).unwrap());
static DROP_SEQUENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^DROP SEQUENCE "([^"]+)"$"#).unwrap());
static CREATE_TRIGGER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^CREATE OR REPLACE TRIGGER "([^"]+)" BEFORE INSERT ON "([^"]+)" .*?SELECT "([^"]+)"\.nextval"#)
        .unwrap()
});
static DROP_TRIGGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^DROP TRIGGER "([^"]+)"$"#).unwrap());
static INSERT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^INSERT INTO "([^"]+)" \((.*?)\) VALUES \((.*)\)$"#).unwrap()
});
static CURRVAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^SELECT "([^"]+)"\.CURRVAL AS ID FROM DUAL$"#).unwrap()
});
static SIMPLE_SELECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^SELECT (.+?) FROM "([^"]+)"(?: ORDER BY "([^"]+)"(\s+ASC|\s+DESC)?)?$"#).unwrap()
});
static ROWNUM_WINDOW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^SELECT (.+?) FROM \(SELECT "_PAGE"\.\*, ROWNUM AS "_RNUM" FROM \((.+)\) "_PAGE" WHERE ROWNUM <= (\d+)\) WHERE "_RNUM" > (\d+)$"#)
        .unwrap()
});
static ROWNUM_COUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^SELECT (.+?) FROM \((.+)\) WHERE ROWNUM <= (\d+)$").unwrap()
});

/// A sequence as Oracle keeps it: `None` until the first `nextval`.
#[derive(Debug, Default, Clone)]
pub struct Sequence {
    pub current: Option<i64>,
}

impl Sequence {
    fn next_val(&mut self) -> i64 {
        let next = self.current.map_or(1, |c| c + 1);
        self.current = Some(next);
        next
    }
}

/// Shared state behind one or more [`ScriptedDriver`] handles.
///
/// Handles cloned with [`ScriptedDriver::share`] see the same tables, so a
/// second session over the same state behaves like a process restart.
#[derive(Debug, Default)]
pub struct Catalog {
    pub executed: Vec<String>,
    pub tables: BTreeMap<String, Vec<RawRow>>,
    pub sequences: HashMap<String, Sequence>,
    /// trigger name -> (table, sequence).
    pub triggers: HashMap<String, (String, String)>,
    responses: Vec<(String, Vec<RawRow>)>,
    failures: Vec<(String, DriverError)>,
}

/// An in-memory [`Driver`] that records every statement.
///
/// Canned responses and injected failures are matched by substring, before
/// anything else. Otherwise a small part of Oracle is emulated: the
/// `USER_TABLES` view, table and sequence lifecycles, plain inserts, selects
/// with an optional single-column ordering, the two `ROWNUM` pagination
/// wrappers, and the key-assigning insert trigger.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDriver {
    catalog: Rc<RefCell<Catalog>>,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns another handle onto the same catalog.
    pub fn share(&self) -> Self {
        Self {
            catalog: Rc::clone(&self.catalog),
        }
    }

    /// Answers statements containing `marker` with `rows`.
    pub fn respond(&self, marker: &str, rows: Vec<RawRow>) {
        self.catalog
            .borrow_mut()
            .responses
            .push((marker.to_string(), rows));
    }

    /// Fails statements containing `marker`.
    pub fn fail_on(&self, marker: &str, error: DriverError) {
        self.catalog
            .borrow_mut()
            .failures
            .push((marker.to_string(), error));
    }

    pub fn executed(&self) -> Vec<String> {
        self.catalog.borrow().executed.clone()
    }

    pub fn clear_executed(&self) {
        self.catalog.borrow_mut().executed.clear();
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.catalog.borrow().tables.contains_key(name)
    }

    pub fn rows(&self, table: &str) -> Vec<RawRow> {
        self.catalog
            .borrow()
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// `ID` values of a table's rows in insertion order.
    pub fn ids(&self, table: &str) -> Vec<i64> {
        self.rows(table)
            .iter()
            .filter_map(|row| {
                row.iter()
                    .find(|(name, _)| name == "ID")
                    .and_then(|(_, v)| v.as_i64())
            })
            .collect()
    }
}

impl Driver for ScriptedDriver {
    type Cursor = std::vec::IntoIter<RawRow>;

    fn connect(config: &OracleConfig) -> Result<Self, DriverError> {
        if config.server == "unreachable" {
            return Err(DriverError::with_code(12541, "TNS:no listener"));
        }
        Ok(Self::new())
    }

    fn execute(&mut self, sql: &str) -> Result<Self::Cursor, DriverError> {
        let mut catalog = self.catalog.borrow_mut();
        catalog.executed.push(sql.to_string());

        if let Some((_, error)) = catalog.failures.iter().find(|(m, _)| sql.contains(m.as_str())) {
            return Err(error.clone());
        }
        if let Some((_, rows)) = catalog.responses.iter().find(|(m, _)| sql.contains(m.as_str())) {
            return Ok(rows.clone().into_iter());
        }
        catalog.emulate(sql).map(Vec::into_iter)
    }
}

fn missing(code: i32, what: &str) -> DriverError {
    DriverError::with_code(code, what)
}

impl Catalog {
    fn emulate(&mut self, sql: &str) -> Result<Vec<RawRow>, DriverError> {
        if let Some(caps) = TABLE_EXISTS.captures(sql) {
            let name = &caps[1];
            return Ok(if self.tables.contains_key(name) {
                vec![vec![("TABLE_NAME".to_string(), Value::from(name))]]
            } else {
                Vec::new()
            });
        }
        if sql == "SELECT TABLE_NAME FROM USER_TABLES" {
            return Ok(self
                .tables
                .keys()
                .map(|name| vec![("TABLE_NAME".to_string(), Value::from(name.as_str()))])
                .collect());
        }
        if let Some(caps) = CREATE_TABLE.captures(sql) {
            self.tables.insert(caps[1].to_string(), Vec::new());
            return Ok(Vec::new());
        }
        if let Some(caps) = DROP_TABLE.captures(sql) {
            return match self.tables.remove(&caps[1]) {
                Some(_) => Ok(Vec::new()),
                None => Err(missing(942, "table or view does not exist")),
            };
        }
        if let Some(caps) = CREATE_SEQUENCE.captures(sql) {
            self.sequences
                .insert(caps[1].to_string(), Sequence::default());
            return Ok(Vec::new());
        }
        if let Some(caps) = DROP_SEQUENCE.captures(sql) {
            return match self.sequences.remove(&caps[1]) {
                Some(_) => Ok(Vec::new()),
                None => Err(missing(2289, "sequence does not exist")),
            };
        }
        if let Some(caps) = CREATE_TRIGGER.captures(sql) {
            self.triggers.insert(
                caps[1].to_string(),
                (caps[2].to_string(), caps[3].to_string()),
            );
            return Ok(Vec::new());
        }
        if let Some(caps) = DROP_TRIGGER.captures(sql) {
            return match self.triggers.remove(&caps[1]) {
                Some(_) => Ok(Vec::new()),
                None => Err(missing(4080, "trigger does not exist")),
            };
        }
        if let Some(caps) = INSERT.captures(sql) {
            let columns: Vec<String> = split_list(&caps[2])
                .into_iter()
                .map(|c| c.trim_matches('"').to_string())
                .collect();
            let values: Vec<Value> = split_list(&caps[3]).iter().map(|v| parse_literal(v)).collect();
            let row: RawRow = columns.into_iter().zip(values).collect();
            return self.insert(&caps[1], row);
        }
        if let Some(caps) = CURRVAL.captures(sql) {
            return match self.sequences.get(&caps[1]).and_then(|s| s.current) {
                Some(current) => Ok(vec![vec![("ID".to_string(), Value::Int(current))]]),
                None => Err(missing(8002, "sequence CURRVAL is not yet defined in this session")),
            };
        }
        if let Some(caps) = ROWNUM_WINDOW.captures(sql) {
            let end: usize = caps[3].parse().unwrap();
            let start: i64 = caps[4].parse().unwrap();
            let numbered = self
                .emulate(&caps[2])?
                .into_iter()
                .take(end)
                .zip(1..)
                .map(|(mut row, rnum)| {
                    row.push(("_RNUM".to_string(), Value::Int(rnum)));
                    row
                })
                .filter(|row| row.last().and_then(|(_, v)| v.as_i64()) > Some(start))
                .collect();
            return Ok(project(numbered, &caps[1]));
        }
        if let Some(caps) = ROWNUM_COUNT.captures(sql) {
            let n: usize = caps[3].parse().unwrap();
            let rows = self.emulate(&caps[2])?.into_iter().take(n).collect();
            return Ok(project(rows, &caps[1]));
        }
        if let Some(caps) = SIMPLE_SELECT.captures(sql) {
            let Some(rows) = self.tables.get(&caps[2]) else {
                return Err(missing(942, "table or view does not exist"));
            };
            let mut rows = rows.clone();
            if let Some(column) = caps.get(3) {
                rows.sort_by(|a, b| compare(cell(a, column.as_str()), cell(b, column.as_str())));
                if caps.get(4).is_some_and(|d| d.as_str().trim().eq_ignore_ascii_case("DESC")) {
                    rows.reverse();
                }
            }
            return Ok(project(rows, &caps[1]));
        }
        Ok(Vec::new())
    }

    /// Inserts a row, running the key trigger of the table if one exists.
    fn insert(&mut self, table: &str, mut row: RawRow) -> Result<Vec<RawRow>, DriverError> {
        if !self.tables.contains_key(table) {
            return Err(missing(942, "table or view does not exist"));
        }

        let sequence = self
            .triggers
            .values()
            .find(|(t, _)| t == table)
            .map(|(_, s)| s.clone());
        if let Some(sequence) = sequence {
            let supplied = row
                .iter()
                .find(|(name, _)| name == "ID")
                .and_then(|(_, v)| v.as_i64());
            let max_existing = self.tables[table]
                .iter()
                .filter_map(|r| r.iter().find(|(n, _)| n == "ID").and_then(|(_, v)| v.as_i64()))
                .max()
                .unwrap_or(0);
            let seq = self
                .sequences
                .get_mut(&sequence)
                .ok_or_else(|| missing(2289, "sequence does not exist"))?;

            let id = match supplied {
                None => seq.next_val(),
                Some(id) => {
                    let max_id = max_existing.max(id);
                    let mut current = seq.next_val();
                    while current < max_id {
                        current = seq.next_val();
                    }
                    id
                }
            };
            row.retain(|(name, _)| name != "ID");
            row.insert(0, ("ID".to_string(), Value::Int(id)));
        }

        if let Some(rows) = self.tables.get_mut(table) {
            rows.push(row);
        }
        Ok(Vec::new())
    }
}

static NULL: Value = Value::Null;

fn cell<'a>(row: &'a RawRow, column: &str) -> &'a Value {
    row.iter()
        .find(|(name, _)| name == column)
        .map_or(&NULL, |(_, v)| v)
}

/// Orders numerically when both sides are numbers, by text otherwise.
fn compare(a: &Value, b: &Value) -> Ordering {
    match (a.as_i64(), b.as_i64()) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => a.to_text().cmp(&b.to_text()),
    }
}

/// Keeps the listed columns of each row, by their unqualified names.
///
/// A `*` or `T.*` entry keeps every column.
fn project(rows: Vec<RawRow>, columns: &str) -> Vec<RawRow> {
    let columns: Vec<String> = split_list(columns)
        .into_iter()
        .map(|c| {
            let last = c.rsplit("\".").next().unwrap_or(&c);
            last.trim_matches('"').to_string()
        })
        .collect();
    if columns.iter().any(|c| c == "*" || c.ends_with(".*")) {
        return rows;
    }
    rows.iter()
        .map(|row| {
            columns
                .iter()
                .map(|column| (column.clone(), cell(row, column).clone()))
                .collect()
        })
        .collect()
}

/// Splits a comma-separated list, ignoring commas inside quotes.
fn split_list(list: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    for c in list.chars() {
        match (quote, c) {
            (None, '\'' | '"') => {
                quote = Some(c);
                current.push(c);
            }
            (Some(q), c) if c == q => {
                quote = None;
                current.push(c);
            }
            (None, ',') => items.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        items.push(current.trim().to_string());
    }
    items
}

/// Parses a SQL literal as rendered by [`Value::to_sql_inline`].
fn parse_literal(text: &str) -> Value {
    let text = text.trim();
    if text.eq_ignore_ascii_case("NULL") {
        return Value::Null;
    }
    if let Some(inner) = text.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')) {
        return Value::from(inner.replace("''", "'"));
    }
    if let Ok(n) = text.parse::<i64>() {
        return Value::Int(n);
    }
    if let Ok(f) = text.parse::<f64>() {
        return Value::Float(f);
    }
    Value::from(text)
}

pub fn config() -> OracleConfig {
    OracleConfig::new("localhost/XE", "ss", "secret", "ss_site")
}

/// A session over a fresh scripted driver, plus a handle to inspect it.
pub fn session() -> (OracleDatabase<ScriptedDriver>, ScriptedDriver) {
    session_with(config())
}

pub fn session_with(config: OracleConfig) -> (OracleDatabase<ScriptedDriver>, ScriptedDriver) {
    let driver = ScriptedDriver::new();
    let handle = driver.share();
    let db = OracleDatabase::with_driver(driver, config)
        .unwrap_or_else(|e| panic!("Failed to open session: {e}"));
    (db, handle)
}

pub fn row(columns: &[(&str, Value)]) -> RawRow {
    columns
        .iter()
        .map(|(n, v)| ((*n).to_string(), v.clone()))
        .collect()
}
