//! End-to-end tests: heap file + sequential index wired through the executor.

use seqdb::executor::Executor;
use seqdb::storage::{Column, ColumnType, Row, Schema, SeqFile, Value};
use tempfile::tempdir;

fn schema() -> Schema {
    vec![
        Column::new("id", ColumnType::Int),
        Column::new("nombre", ColumnType::Varchar(50)),
        Column::new("salario", ColumnType::Float),
        Column::new("ingreso", ColumnType::Date),
    ]
}

fn employee(id: i32, nombre: &str, salario: f64, ingreso: &str) -> Row {
    Row::new()
        .with("id", Value::Int(id))
        .with("nombre", Value::Text(nombre.into()))
        .with("salario", Value::Float(salario))
        .with("ingreso", Value::Date(ingreso.into()))
}

fn names(rows: &[Row]) -> Vec<String> {
    rows.iter()
        .map(|r| match r.get("nombre") {
            Some(Value::Text(s)) => s.clone(),
            other => panic!("unexpected nombre {other:?}"),
        })
        .collect()
}

fn ids(rows: &[Row]) -> Vec<i32> {
    rows.iter()
        .map(|r| match r.get("id") {
            Some(Value::Int(i)) => *i,
            other => panic!("unexpected id {other:?}"),
        })
        .collect()
}

#[test]
fn insert_select_delete_with_index() {
    let dir = tempdir().unwrap();
    let exec = Executor::open_table(dir.path(), "empleados", schema(), &["id"]).unwrap();

    let r0 = exec
        .insert(&employee(10, "Ana", 1200.5, "2024-01-01"))
        .unwrap();
    assert_eq!((r0.page, r0.slot), (0, 0));
    let r1 = exec
        .insert(&employee(15, "Luis", 2000.0, "2024-02-10"))
        .unwrap();
    assert_eq!((r1.page, r1.slot), (0, 1));
    let r2 = exec
        .insert(&employee(12, "Zoe", 1500.0, "2023-12-15"))
        .unwrap();
    assert_eq!((r2.page, r2.slot), (0, 2));
    let r3 = exec
        .insert(&employee(15, "Luis2", 2100.0, "2024-03-20"))
        .unwrap();
    assert_eq!((r3.page, r3.slot), (0, 3));

    // duplicates come back most-recent-first
    let two = exec.select_eq("id", &Value::Int(15)).unwrap();
    assert_eq!(names(&two), vec!["Luis2", "Luis"]);

    assert!(exec.select_eq("id", &Value::Int(11)).unwrap().is_empty());

    let between = exec
        .select_between("id", &Value::Int(11), &Value::Int(14))
        .unwrap();
    assert_eq!(names(&between), vec!["Zoe"]);

    assert_eq!(exec.delete("id", &Value::Int(12)).unwrap(), 1);
    let rest = exec
        .select_between("id", &Value::Int(10), &Value::Int(20))
        .unwrap();
    assert_eq!(ids(&rest), vec![10, 15, 15]);
    assert_eq!(names(&rest), vec!["Ana", "Luis2", "Luis"]);

    // swapped bounds behave the same
    let swapped = exec
        .select_between("id", &Value::Int(20), &Value::Int(10))
        .unwrap();
    assert_eq!(ids(&swapped), vec![10, 15, 15]);
}

#[test]
fn automatic_reorganization_under_inserts() {
    let dir = tempdir().unwrap();
    let exec = Executor::open_table(dir.path(), "t", schema(), &["id"]).unwrap();

    // thirteen ascending keys land exactly on a reorganization boundary
    for i in 1..=13 {
        exec.insert(&employee(i, "emp", 1000.0, "2024-01-01"))
            .unwrap();
    }

    let sf = SeqFile::open(dir.path().join("t_id.sf")).unwrap();
    assert_eq!(sf.aux_count().unwrap(), 0);
    assert_eq!(sf.main_count().unwrap(), 13);

    for i in 1..=13 {
        let rows = exec.select_eq("id", &Value::Int(i)).unwrap();
        assert_eq!(ids(&rows), vec![i], "key {i}");
    }
    let all = exec
        .select_between("id", &Value::Int(1), &Value::Int(13))
        .unwrap();
    assert_eq!(ids(&all), (1..=13).collect::<Vec<_>>());
}

#[test]
fn nulls_roundtrip_through_the_table() {
    let dir = tempdir().unwrap();
    let exec = Executor::open_table(dir.path(), "t", schema(), &["id"]).unwrap();
    exec.insert(&Row::new().with("id", Value::Int(1))).unwrap();

    let rows = exec.select_eq("id", &Value::Int(1)).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("nombre"), Some(&Value::Null));
    assert_eq!(rows[0].get("salario"), Some(&Value::Null));

    // null columns never satisfy scans
    assert!(exec
        .select_eq("nombre", &Value::Text("Ana".into()))
        .unwrap()
        .is_empty());
}

#[test]
fn heavy_churn_keeps_index_and_heap_consistent() {
    let dir = tempdir().unwrap();
    let exec = Executor::open_table(dir.path(), "t", schema(), &["id"]).unwrap();

    for round in 0..3 {
        for i in 0..20 {
            exec.insert(&employee(i, "e", 1.0, "2024-01-01")).unwrap();
        }
        for i in (0..20).step_by(2) {
            let removed = exec.delete("id", &Value::Int(i)).unwrap();
            assert!(removed >= 1, "round {round} key {i}");
        }
        for i in (0..20).step_by(2) {
            assert!(
                exec.select_eq("id", &Value::Int(i)).unwrap().is_empty(),
                "round {round} key {i}"
            );
        }
    }
    // odd keys each appeared once per round and were never deleted
    for i in (1..20).step_by(2) {
        assert_eq!(exec.select_eq("id", &Value::Int(i)).unwrap().len(), 3);
    }
}
