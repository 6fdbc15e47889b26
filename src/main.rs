mod btree;
mod cell;
mod database;
mod executor;
mod page;
mod pager;
mod query;
mod record;
mod serial;
mod varint;

use anyhow::{bail, Result};
use database::Database;
use env_logger::Env;

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = std::env::args().collect::<Vec<_>>();
    match args.len() {
        0 | 1 => bail!("Missing <database path> and <command>"),
        2 => bail!("Missing <command>"),
        _ => {}
    }

    if let Err(err) = run(&args[1], &args[2]) {
        eprintln!("{err:#}");
        std::process::exit(1);
    }

    Ok(())
}

fn run(path: &str, command: &str) -> Result<()> {
    let mut database = Database::open(path)?;

    match command {
        ".dbinfo" => {
            let cell_count = database.page_one_cell_count()?;
            println!("database page size: {}", database.header.page_size);
            println!("number of tables: {cell_count}");
        }
        ".tables" => {
            let names = database.table_names().collect::<Vec<_>>().join(" ");
            println!("{names}");
        }
        cmd if cmd.to_ascii_lowercase().starts_with("select") => {
            for line in executor::execute_select(&mut database, cmd)? {
                println!("{line}");
            }
        }
        other => bail!("Invalid command: {other}"),
    }

    Ok(())
}
