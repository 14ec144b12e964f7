//! SeqDB demo binary: builds an employees table with an integer index on
//! `id` and runs a few inserts, lookups, and deletes against it.
//! Usage: seqdb [CONFIG_PATH]

use anyhow::Result;
use seqdb::executor::Executor;
use seqdb::storage::{Column, ColumnType, Row, Value};
use seqdb::Config;
use std::env;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match env::args().nth(1) {
        Some(path) => Config::from_path(&PathBuf::from(path))?,
        None => Config::default_config(),
    };

    let dir = Path::new(&config.data_dir);
    std::fs::create_dir_all(dir)?;
    if config.reset {
        for file in ["employees.heap", "employees_id.sf"] {
            let p = dir.join(file);
            if p.exists() {
                std::fs::remove_file(&p)?;
            }
        }
    }

    let schema = vec![
        Column::new("id", ColumnType::Int),
        Column::new("name", ColumnType::Varchar(50)),
        Column::new("salary", ColumnType::Float),
        Column::new("hired", ColumnType::Date),
    ];
    let exec = Executor::open_table(dir, "employees", schema, &["id"])?;

    let people = [
        (10, "Ana", 1200.5, "2024-01-01"),
        (15, "Luis", 2000.0, "2024-02-10"),
        (12, "Zoe", 1500.0, "2023-12-15"),
        (15, "Luis2", 2100.0, "2024-03-20"),
    ];
    for (id, name, salary, hired) in people {
        let rid = exec.insert(
            &Row::new()
                .with("id", Value::Int(id))
                .with("name", Value::Text(name.into()))
                .with("salary", Value::Float(salary))
                .with("hired", Value::Date(hired.into())),
        )?;
        tracing::info!(id, name, ?rid, "inserted");
    }

    let v15 = Value::Int(15);
    let rows = exec.select_eq("id", &v15)?;
    tracing::info!(?rows, "select id = 15");
    let v11 = Value::Int(11);
    let rows = exec.select_eq("id", &v11)?;
    tracing::info!(?rows, "select id = 11");
    let v14 = Value::Int(14);
    let rows = exec.select_between("id", &v11, &v14)?;
    tracing::info!(?rows, "select id between 11 and 14");

    let v12 = Value::Int(12);
    let removed = exec.delete("id", &v12)?;
    tracing::info!(removed, "delete id = 12");
    let v10 = Value::Int(10);
    let v20 = Value::Int(20);
    let rows = exec.select_between("id", &v10, &v20)?;
    tracing::info!(?rows, "select id between 10 and 20");
    Ok(())
}
