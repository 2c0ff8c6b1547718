//! End-to-end commit tests against a scripted in-memory driver.
//!
//! The fake driver records every statement it executes (SQL plus bound
//! parameters, in order) and answers from a queue of scripted results, so
//! each test pins down both the exact statements the engine emits and the
//! way it reconciles what the driver reports.

use rowtx_core::{
    Capabilities, Connection, ConnectionProvider, Error, Result, Rows, RowIdAlias, Statement,
    TableSchema, TypeCode, Value,
};
use rowtx_scope::{OpKind, ScopeConfig, TxScope};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Clone, Debug)]
enum Cell {
    Null,
    I(i64),
    T(String),
}

#[derive(Clone, Debug)]
enum GenKeys {
    /// Driver has no generated-key reporting at all.
    Unsupported,
    Rows(Vec<String>, Vec<Vec<Cell>>),
}

#[derive(Debug)]
enum Script {
    Exec { affected: u64, generated: GenKeys },
    Query { columns: Vec<String>, rows: Vec<Vec<Cell>> },
}

#[derive(Default)]
struct FakeDb {
    capabilities: Capabilities,
    scripts: VecDeque<Script>,
    log: Vec<String>,
}

#[derive(Clone)]
struct Fake {
    db: Arc<Mutex<FakeDb>>,
}

impl Fake {
    fn new(capabilities: Capabilities) -> Self {
        let db = FakeDb {
            capabilities,
            ..FakeDb::default()
        };
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    fn script_exec(&self, affected: u64, generated: GenKeys) {
        self.db
            .lock()
            .unwrap()
            .scripts
            .push_back(Script::Exec { affected, generated });
    }

    fn script_query(&self, columns: &[&str], rows: Vec<Vec<Cell>>) {
        self.db.lock().unwrap().scripts.push_back(Script::Query {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
        });
    }

    fn provider(&self) -> Arc<dyn ConnectionProvider> {
        Arc::new(FakeProvider { db: self.db.clone() })
    }

    fn log(&self) -> Vec<String> {
        self.db.lock().unwrap().log.clone()
    }
}

struct FakeProvider {
    db: Arc<Mutex<FakeDb>>,
}

impl ConnectionProvider for FakeProvider {
    fn connection(&self, _config_name: &str) -> Result<Box<dyn Connection>> {
        Ok(Box::new(FakeConnection { db: self.db.clone() }))
    }
}

struct FakeConnection {
    db: Arc<Mutex<FakeDb>>,
}

impl Connection for FakeConnection {
    fn capabilities(&self) -> Capabilities {
        self.db.lock().unwrap().capabilities
    }

    fn begin(&mut self) -> Result<()> {
        self.db.lock().unwrap().log.push("BEGIN".to_string());
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.db.lock().unwrap().log.push("COMMIT".to_string());
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.db.lock().unwrap().log.push("ROLLBACK".to_string());
        Ok(())
    }

    fn prepare<'conn>(
        &'conn mut self,
        sql: &str,
        _generated_columns: &[String],
    ) -> Result<Box<dyn Statement + 'conn>> {
        Ok(Box::new(FakeStatement {
            db: self.db.clone(),
            sql: sql.to_string(),
            bound: Vec::new(),
            pending_gen: None,
        }))
    }
}

struct FakeStatement {
    db: Arc<Mutex<FakeDb>>,
    sql: String,
    bound: Vec<Option<String>>,
    pending_gen: Option<GenKeys>,
}

impl FakeStatement {
    fn record(&mut self, pos: usize, repr: String) -> Result<()> {
        if self.bound.len() <= pos {
            self.bound.resize(pos + 1, None);
        }
        self.bound[pos] = Some(repr);
        Ok(())
    }

    fn log_statement(&self) {
        let params: Vec<String> = self
            .bound
            .iter()
            .map(|b| b.clone().unwrap_or_else(|| "<unbound>".to_string()))
            .collect();
        self.db
            .lock()
            .unwrap()
            .log
            .push(format!("{} [{}]", self.sql, params.join(", ")));
    }

    fn next_script(&self) -> Script {
        self.db
            .lock()
            .unwrap()
            .scripts
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted result for: {}", self.sql))
    }
}

impl Statement for FakeStatement {
    fn bind_null(&mut self, pos: usize, code: TypeCode) -> Result<()> {
        self.record(pos, format!("null:{:?}", code))
    }
    fn bind_bool(&mut self, pos: usize, value: bool) -> Result<()> {
        self.record(pos, format!("bool:{}", value))
    }
    fn bind_i64(&mut self, pos: usize, value: i64) -> Result<()> {
        self.record(pos, format!("i64:{}", value))
    }
    fn bind_f64(&mut self, pos: usize, value: f64) -> Result<()> {
        self.record(pos, format!("f64:{}", value))
    }
    fn bind_text(&mut self, pos: usize, value: &str) -> Result<()> {
        self.record(pos, format!("text:{}", value))
    }
    fn bind_bytes(&mut self, pos: usize, value: &[u8]) -> Result<()> {
        self.record(pos, format!("bytes:{:?}", value))
    }

    fn execute_update(&mut self) -> Result<u64> {
        self.log_statement();
        match self.next_script() {
            Script::Exec { affected, generated } => {
                self.pending_gen = Some(generated);
                Ok(affected)
            }
            Script::Query { .. } => panic!("scripted a query for a write: {}", self.sql),
        }
    }

    fn execute_query<'stmt>(&'stmt mut self) -> Result<Box<dyn Rows + 'stmt>> {
        self.log_statement();
        match self.next_script() {
            Script::Query { columns, rows } => Ok(Box::new(FakeRows::new(columns, rows))),
            Script::Exec { .. } => panic!("scripted a write for a query: {}", self.sql),
        }
    }

    fn generated_keys<'stmt>(&'stmt mut self) -> Result<Option<Box<dyn Rows + 'stmt>>> {
        match self.pending_gen.take() {
            Some(GenKeys::Unsupported) | None => Ok(None),
            Some(GenKeys::Rows(columns, rows)) => Ok(Some(Box::new(FakeRows::new(columns, rows)))),
        }
    }
}

struct FakeRows {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
    cursor: Option<usize>,
}

impl FakeRows {
    fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            columns,
            rows,
            cursor: None,
        }
    }

    fn cell(&self, pos: usize) -> &Cell {
        let row = self.cursor.expect("advance not called");
        &self.rows[row][pos]
    }
}

impl Rows for FakeRows {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn advance(&mut self) -> Result<bool> {
        let next = self.cursor.map_or(0, |c| c + 1);
        if next < self.rows.len() {
            self.cursor = Some(next);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn get_bool(&self, _pos: usize) -> Result<Option<bool>> {
        panic!("no boolean columns in these tests")
    }

    fn get_i64(&self, pos: usize) -> Result<Option<i64>> {
        match self.cell(pos) {
            Cell::Null => Ok(None),
            Cell::I(v) => Ok(Some(*v)),
            other => panic!("not an integer cell: {:?}", other),
        }
    }

    fn get_f64(&self, _pos: usize) -> Result<Option<f64>> {
        panic!("no float columns in these tests")
    }

    fn get_text(&self, pos: usize) -> Result<Option<String>> {
        match self.cell(pos) {
            Cell::Null => Ok(None),
            Cell::T(v) => Ok(Some(v.clone())),
            other => panic!("not a text cell: {:?}", other),
        }
    }

    fn get_bytes(&self, _pos: usize) -> Result<Option<Vec<u8>>> {
        panic!("no blob columns in these tests")
    }
}

fn i(v: i64) -> Cell {
    Cell::I(v)
}

fn t(v: &str) -> Cell {
    Cell::T(v.to_string())
}

fn users_schema() -> Arc<TableSchema> {
    TableSchema::new("users")
        .column("id", TypeCode::BigInt)
        .column("name", TypeCode::Text)
        .primary_key(&["id"])
        .build()
}

fn scope_for(fake: &Fake) -> TxScope {
    TxScope::new(ScopeConfig::new("main", fake.provider()))
}

fn gen_row(columns: &[&str], cells: Vec<Cell>) -> GenKeys {
    GenKeys::Rows(
        columns.iter().map(|c| c.to_string()).collect(),
        vec![cells],
    )
}

#[test]
fn insert_reflects_generated_key_and_clears_changes() {
    let fake = Fake::new(Capabilities::default());
    let mut scope = scope_for(&fake);
    let users = users_schema();

    let alice = scope.insert_row(users);
    scope.set(alice, "name", "Alice").unwrap();
    assert_eq!(scope.pending_counts().inserts, 1);

    fake.script_exec(1, gen_row(&["id", "name"], vec![i(42), t("Alice")]));
    scope.commit().unwrap();

    let binding = scope.binding(alice).unwrap();
    assert_eq!(binding.kind(), OpKind::Unchanged);
    assert!(!binding.has_changes());
    assert_eq!(binding.persisted_value("id"), Some(&Value::BigInt(42)));
    assert_eq!(
        binding.persisted_value("name"),
        Some(&Value::Text("Alice".to_string()))
    );
    assert!(!scope.has_pending());

    assert_eq!(
        fake.log(),
        vec![
            "BEGIN".to_string(),
            "INSERT INTO users(name) VALUES(?) [text:Alice]".to_string(),
            "COMMIT".to_string(),
        ]
    );
}

#[test]
fn update_sets_only_changed_columns() {
    let fake = Fake::new(Capabilities::default());
    let mut scope = scope_for(&fake);
    let users = users_schema();

    let persisted = rowtx_core::Row::new(
        vec!["id".to_string(), "name".to_string()],
        vec![Value::BigInt(1), Value::Text("Alice".to_string())],
    );
    let alice = scope.attach_row(users, &persisted);
    scope.set(alice, "name", "Bob").unwrap();

    fake.script_exec(1, gen_row(&["id", "name"], vec![i(1), t("Bob")]));
    scope.commit().unwrap();

    assert_eq!(
        fake.log(),
        vec![
            "BEGIN".to_string(),
            "UPDATE users SET name=? WHERE id=? [text:Bob, i64:1]".to_string(),
            "COMMIT".to_string(),
        ]
    );
    let binding = scope.binding(alice).unwrap();
    assert_eq!(
        binding.persisted_value("name"),
        Some(&Value::Text("Bob".to_string()))
    );
}

#[test]
fn row_count_mismatch_rolls_back_and_poisons() {
    let fake = Fake::new(Capabilities::default());
    let mut scope = scope_for(&fake);
    let users = users_schema();

    let persisted = rowtx_core::Row::new(
        vec!["id".to_string(), "name".to_string()],
        vec![Value::BigInt(1), Value::Text("Alice".to_string())],
    );
    let alice = scope.attach_row(users, &persisted);
    scope.set(alice, "name", "Bob").unwrap();

    fake.script_exec(0, GenKeys::Unsupported);
    let err = scope.commit().unwrap_err();
    assert!(matches!(err, Error::RowCount(_)), "got {err}");
    assert_eq!(fake.log().last().map(String::as_str), Some("ROLLBACK"));

    // Poisoned until reset; the change set survives the failure.
    assert!(matches!(
        scope.commit().unwrap_err(),
        Error::InvalidState { .. }
    ));
    scope.reset();
    assert!(scope.binding(alice).unwrap().has_changes());

    fake.script_exec(1, gen_row(&["id", "name"], vec![i(1), t("Bob")]));
    scope.commit().unwrap();
    assert_eq!(
        scope.binding(alice).unwrap().persisted_value("name"),
        Some(&Value::Text("Bob".to_string()))
    );
}

fn cyclic_schemas() -> (Arc<TableSchema>, Arc<TableSchema>) {
    let a = TableSchema::new("a")
        .column("id", TypeCode::BigInt)
        .column("b_id", TypeCode::BigInt)
        .primary_key(&["id"])
        .build();
    let b = TableSchema::new("b")
        .column("id", TypeCode::BigInt)
        .column("a_id", TypeCode::BigInt)
        .primary_key(&["id"])
        .build();
    (a, b)
}

#[test]
fn cycle_commits_with_sentinels_and_patches() {
    let fake = Fake::new(Capabilities {
        deferred_constraints: true,
        rowid_alias: None,
    });
    let mut scope = scope_for(&fake);
    let (a, b) = cyclic_schemas();

    let row_a = scope.insert_row(a);
    let row_b = scope.insert_row(b);
    scope.set_ref(row_a, "b_id", row_b, "id").unwrap();
    scope.set_ref(row_b, "a_id", row_a, "id").unwrap();

    // a inserts first with a zero sentinel; b then resolves a's real id.
    fake.script_exec(1, gen_row(&["id", "b_id"], vec![i(10), i(0)]));
    fake.script_exec(1, gen_row(&["id", "a_id"], vec![i(20), i(10)]));
    // Patch UPDATEs, in registration order.
    fake.script_exec(1, GenKeys::Unsupported);
    fake.script_exec(1, GenKeys::Unsupported);
    scope.commit().unwrap();

    let log = fake.log();
    assert_eq!(log[0], "BEGIN");
    assert_eq!(log[1], "INSERT INTO a(b_id) VALUES(?) [i64:0]");
    assert_eq!(log[2], "INSERT INTO b(a_id) VALUES(?) [i64:10]");
    assert_eq!(log[3], "UPDATE a SET b_id=? WHERE id=? [i64:20, i64:10]");
    assert_eq!(log[4], "UPDATE b SET a_id=? WHERE id=? [i64:10, i64:20]");
    assert_eq!(log[5], "COMMIT");

    // No leftover sentinel values anywhere.
    assert_eq!(
        scope.binding(row_a).unwrap().persisted_value("b_id"),
        Some(&Value::BigInt(20))
    );
    assert_eq!(
        scope.binding(row_b).unwrap().persisted_value("a_id"),
        Some(&Value::BigInt(10))
    );
}

#[test]
fn cycle_without_deferred_constraints_is_rejected() {
    let fake = Fake::new(Capabilities::default());
    let mut scope = scope_for(&fake);
    let (a, b) = cyclic_schemas();

    let row_a = scope.insert_row(a);
    let row_b = scope.insert_row(b);
    scope.set_ref(row_a, "b_id", row_b, "id").unwrap();
    scope.set_ref(row_b, "a_id", row_a, "id").unwrap();

    let err = scope.commit().unwrap_err();
    match err {
        Error::CyclicConstraint(e) => {
            assert_eq!(e.tables, vec!["a".to_string(), "b".to_string()]);
        }
        other => panic!("expected CyclicConstraint, got {other}"),
    }
    assert_eq!(fake.log().last().map(String::as_str), Some("ROLLBACK"));
}

#[test]
fn rowid_alias_translates_to_query_column() {
    let fake = Fake::new(Capabilities {
        deferred_constraints: false,
        rowid_alias: Some(RowIdAlias {
            reported: "last_insert_rowid()",
            query_column: "_rowid_",
        }),
    });
    let mut scope = scope_for(&fake);
    let users = users_schema();

    let alice = scope.insert_row(users);
    scope.set(alice, "name", "Alice").unwrap();

    fake.script_exec(1, gen_row(&["last_insert_rowid()"], vec![i(7)]));
    fake.script_query(&["id", "name"], vec![vec![i(42), t("Alice")]]);
    scope.commit().unwrap();

    let log = fake.log();
    assert_eq!(log[1], "INSERT INTO users(name) VALUES(?) [text:Alice]");
    assert_eq!(log[2], "SELECT * FROM users WHERE _rowid_=? [i64:7]");
    assert_eq!(
        scope.binding(alice).unwrap().persisted_value("id"),
        Some(&Value::BigInt(42))
    );
}

#[test]
fn secondary_select_when_driver_reports_no_keys() {
    let fake = Fake::new(Capabilities::default());
    let mut scope = scope_for(&fake);
    let users = users_schema();

    let alice = scope.insert_row(users);
    scope.set(alice, "id", 5i64).unwrap();
    scope.set(alice, "name", "Alice").unwrap();

    fake.script_exec(1, GenKeys::Unsupported);
    fake.script_query(&["id", "name"], vec![vec![i(5), t("Alice")]]);
    scope.commit().unwrap();

    let log = fake.log();
    assert_eq!(
        log[1],
        "INSERT INTO users(id, name) VALUES(?, ?) [i64:5, text:Alice]"
    );
    assert_eq!(log[2], "SELECT * FROM users WHERE id=? [i64:5]");
}

#[test]
fn insert_with_unreflectable_pk_is_a_hard_failure() {
    let fake = Fake::new(Capabilities::default());
    let mut scope = scope_for(&fake);
    let users = users_schema();

    // Auto-increment pk never set, and the driver reports no generated keys:
    // the written row can never be found again.
    let alice = scope.insert_row(users);
    scope.set(alice, "name", "Alice").unwrap();

    fake.script_exec(1, GenKeys::Unsupported);
    let err = scope.commit().unwrap_err();
    assert!(matches!(err, Error::RowCount(_)), "got {err}");
    assert_eq!(fake.log().last().map(String::as_str), Some("ROLLBACK"));

    // Nothing promoted, change set intact.
    let binding = scope.binding(alice).unwrap();
    assert_eq!(binding.persisted_value("id"), None);
    assert!(binding.has_changes());
}

#[test]
fn key_column_update_binds_old_value_in_where() {
    let fake = Fake::new(Capabilities::default());
    let mut scope = scope_for(&fake);
    let users = users_schema();

    let persisted = rowtx_core::Row::new(
        vec!["id".to_string(), "name".to_string()],
        vec![Value::BigInt(1), Value::Text("Alice".to_string())],
    );
    let alice = scope.attach_row(users, &persisted);
    scope.set(alice, "id", 9i64).unwrap();

    fake.script_exec(1, gen_row(&["id", "name"], vec![i(9), t("Alice")]));
    scope.commit().unwrap();

    // New value in SET, pre-change value in WHERE.
    assert_eq!(
        fake.log()[1],
        "UPDATE users SET id=? WHERE id=? [i64:9, i64:1]"
    );
    assert_eq!(
        scope.binding(alice).unwrap().persisted_value("id"),
        Some(&Value::BigInt(9))
    );
}

#[test]
fn multi_row_generated_keys_rejected() {
    let fake = Fake::new(Capabilities::default());
    let mut scope = scope_for(&fake);
    let users = users_schema();

    let alice = scope.insert_row(users);
    scope.set(alice, "name", "Alice").unwrap();

    fake.script_exec(
        1,
        GenKeys::Rows(
            vec!["id".to_string(), "name".to_string()],
            vec![vec![i(1), t("Alice")], vec![i(2), t("Alice")]],
        ),
    );
    let err = scope.commit().unwrap_err();
    assert!(matches!(err, Error::MultipleRows { .. }), "got {err}");
    assert_eq!(fake.log().last().map(String::as_str), Some("ROLLBACK"));
}

#[test]
fn no_identity_insert_skips_read_back() {
    let fake = Fake::new(Capabilities::default());
    let mut scope = scope_for(&fake);
    let log_table = TableSchema::new("audit_log")
        .column("message", TypeCode::Text)
        .build();

    let entry = scope.insert_row(log_table);
    scope.set(entry, "message", "hello").unwrap();

    fake.script_exec(1, GenKeys::Unsupported);
    scope.commit().unwrap();

    // No read-back statements, and the caller's value is the snapshot.
    assert_eq!(fake.log().len(), 3); // BEGIN, INSERT, COMMIT
    assert_eq!(
        scope.binding(entry).unwrap().persisted_value("message"),
        Some(&Value::Text("hello".to_string()))
    );
}

#[test]
fn deletes_run_first_in_reverse_registration_order() {
    let fake = Fake::new(Capabilities::default());
    let mut scope = scope_for(&fake);
    let users = users_schema();

    let row1 = rowtx_core::Row::new(
        vec!["id".to_string(), "name".to_string()],
        vec![Value::BigInt(1), Value::Text("Alice".to_string())],
    );
    let row2 = rowtx_core::Row::new(
        vec!["id".to_string(), "name".to_string()],
        vec![Value::BigInt(2), Value::Text("Bob".to_string())],
    );
    let first = scope.attach_row(users.clone(), &row1);
    let second = scope.attach_row(users.clone(), &row2);
    scope.mark_delete(first).unwrap();
    scope.mark_delete(second).unwrap();

    let fresh = scope.insert_row(users);
    scope.set(fresh, "name", "Carol").unwrap();

    fake.script_exec(1, GenKeys::Unsupported); // delete id=2
    fake.script_exec(1, GenKeys::Unsupported); // delete id=1
    fake.script_exec(1, gen_row(&["id", "name"], vec![i(3), t("Carol")]));
    scope.commit().unwrap();

    let log = fake.log();
    assert_eq!(log[1], "DELETE FROM users WHERE id=? [i64:2]");
    assert_eq!(log[2], "DELETE FROM users WHERE id=? [i64:1]");
    assert_eq!(log[3], "INSERT INTO users(name) VALUES(?) [text:Carol]");

    assert!(!scope.binding(first).unwrap().is_persisted());
    assert!(!scope.binding(second).unwrap().is_persisted());
}

#[test]
fn dependent_insert_waits_for_its_target() {
    let fake = Fake::new(Capabilities::default());
    let mut scope = scope_for(&fake);
    let (a, b) = cyclic_schemas();

    // b points at a; no cycle, plain topological order.
    let row_b = scope.insert_row(b);
    let row_a = scope.insert_row(a);
    scope.set(row_a, "b_id", 0i64).unwrap();
    scope.set_ref(row_b, "a_id", row_a, "id").unwrap();

    fake.script_exec(1, gen_row(&["id", "b_id"], vec![i(10), i(0)]));
    fake.script_exec(1, gen_row(&["id", "a_id"], vec![i(20), i(10)]));
    scope.commit().unwrap();

    let log = fake.log();
    // a commits before b even though b registered first.
    assert_eq!(log[1], "INSERT INTO a(b_id) VALUES(?) [i64:0]");
    assert_eq!(log[2], "INSERT INTO b(a_id) VALUES(?) [i64:10]");
    assert_eq!(
        scope.binding(row_b).unwrap().persisted_value("a_id"),
        Some(&Value::BigInt(10))
    );
}

#[test]
fn read_one_rejects_multiple_rows() {
    let fake = Fake::new(Capabilities::default());
    let scope = scope_for(&fake);
    let users = users_schema();

    fake.script_query(
        &["id", "name"],
        vec![vec![i(1), t("Alice")], vec![i(2), t("Bob")]],
    );
    let err = scope
        .read_one(&users, &[("name", Value::Text("A".to_string()))])
        .unwrap_err();
    assert!(matches!(err, Error::MultipleRows { .. }), "got {err}");

    fake.script_query(&["id", "name"], vec![]);
    let none = scope
        .read_one(&users, &[("id", Value::BigInt(9))])
        .unwrap();
    assert!(none.is_none());
}

#[test]
fn read_many_builds_rows_in_cursor_order() {
    let fake = Fake::new(Capabilities::default());
    let scope = scope_for(&fake);
    let users = users_schema();

    fake.script_query(
        &["id", "name"],
        vec![
            vec![i(1), t("Alice")],
            vec![i(2), t("Bob")],
            vec![i(3), Cell::Null],
        ],
    );
    let names = scope
        .read_many_with(&users, &[], |row| {
            Ok(row
                .get_by_name("name")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_default())
        })
        .unwrap();
    assert_eq!(
        names,
        vec!["Alice".to_string(), "Bob".to_string(), String::new()]
    );
    assert_eq!(fake.log(), vec!["SELECT * FROM users []".to_string()]);
}

struct MapSchemas(std::collections::HashMap<String, Arc<TableSchema>>);

impl rowtx_core::SchemaSource for MapSchemas {
    fn table(&self, name: &str) -> Result<Arc<TableSchema>> {
        self.0
            .get(name)
            .cloned()
            .ok_or_else(|| Error::InvalidState {
                message: format!("unknown table '{name}'"),
            })
    }
}

#[test]
fn rows_can_be_registered_by_table_name() {
    let fake = Fake::new(Capabilities::default());
    let users = users_schema();
    let schemas = MapSchemas(
        [("users".to_string(), users)]
            .into_iter()
            .collect(),
    );
    let mut scope = TxScope::new(
        ScopeConfig::new("main", fake.provider()).schemas(Arc::new(schemas)),
    );

    assert!(scope.insert_into("missing").is_err());
    let alice = scope.insert_into("users").unwrap();
    scope.set(alice, "name", "Alice").unwrap();

    fake.script_exec(1, gen_row(&["id", "name"], vec![i(1), t("Alice")]));
    scope.commit().unwrap();
    assert_eq!(
        scope.binding(alice).unwrap().persisted_value("id"),
        Some(&Value::BigInt(1))
    );
}

#[test]
fn empty_scope_commit_is_a_no_op() {
    let fake = Fake::new(Capabilities::default());
    let mut scope = scope_for(&fake);
    scope.commit().unwrap();
    assert!(fake.log().is_empty());
}
