/*
Five-step plan for a SELECT: look up the table in the catalog, fast-path
COUNT(*), prefer an index-assisted equality lookup over a full scan when the
WHERE column has a single-column index, otherwise scan with the predicate
applied inline, project the requested columns (substituting the row id for
a NULL read of an INTEGER PRIMARY KEY column), and emit rows as their
values joined with `|`.
*/
use itertools::Itertools;
use thiserror::Error;

use crate::btree::{self, BtreeError};
use crate::database::{resolve_column_index, CatalogError, Database, DatabaseError};
use crate::query::{self, ColumnDef, ComparisonOp, Literal, ParseError, SelectColumns, Statement, WhereClause};
use crate::record::Record;
use crate::serial::{compare_values, SerialData};

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Btree(#[from] BtreeError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("only SELECT statements can be executed")]
    NotASelect,
}

fn literal_to_serial_data(literal: &Literal) -> SerialData {
    match literal {
        Literal::Integer(n) => SerialData::Integer(*n),
        Literal::Text(s) => SerialData::Text(s.clone()),
    }
}

/// A row is kept iff there is no predicate, or the predicate's column
/// exists and compares true against the literal under its comparator. This
/// is deliberately the inverse of a `continue`-on-match skip: the row is
/// emitted, not dropped, when the predicate is satisfied.
fn row_matches(record: &Record, filter: &WhereClause, columns: &[ColumnDef]) -> bool {
    let Some(idx) = columns
        .iter()
        .position(|c| c.name.eq_ignore_ascii_case(&filter.column))
    else {
        return false;
    };
    let Some(value) = record.values.get(idx) else {
        return false;
    };

    let target = literal_to_serial_data(&filter.literal);
    let ordering = compare_values(value, &target);
    match filter.op {
        ComparisonOp::Eq => ordering == Some(std::cmp::Ordering::Equal),
        ComparisonOp::Ne => ordering != Some(std::cmp::Ordering::Equal),
        ComparisonOp::Lt => ordering == Some(std::cmp::Ordering::Less),
        ComparisonOp::Gt => ordering == Some(std::cmp::Ordering::Greater),
        ComparisonOp::Le => matches!(
            ordering,
            Some(std::cmp::Ordering::Less) | Some(std::cmp::Ordering::Equal)
        ),
        ComparisonOp::Ge => matches!(
            ordering,
            Some(std::cmp::Ordering::Greater) | Some(std::cmp::Ordering::Equal)
        ),
    }
}

fn resolve_projection(
    select_columns: &SelectColumns,
    columns: &[ColumnDef],
    table_name: &str,
) -> Result<Vec<usize>, ExecutorError> {
    match select_columns {
        SelectColumns::Star => Ok((0..columns.len()).collect()),
        SelectColumns::Named(names) => names
            .iter()
            .map(|name| Ok(resolve_column_index(table_name, columns, name)?))
            .collect(),
        SelectColumns::Count => unreachable!("COUNT(*) is handled before projection"),
    }
}

fn project_row(row_id: i64, record: &Record, indices: &[usize], columns: &[ColumnDef]) -> String {
    indices
        .iter()
        .map(|&idx| {
            let column = &columns[idx];
            match record.values.get(idx) {
                Some(v) if !v.is_null() => v.to_string(),
                _ if column.is_integer_primary_key() => row_id.to_string(),
                _ => String::new(),
            }
        })
        .join("|")
}

pub fn execute_select(db: &mut Database, sql: &str) -> Result<Vec<String>, ExecutorError> {
    let stmt = match query::parse(sql)? {
        Statement::Select(s) => s,
        _ => return Err(ExecutorError::NotASelect),
    };

    let table = db.find_table(&stmt.table)?.clone();
    let columns = db.table_columns(&stmt.table)?;
    let usable_page_size = db.usable_page_size();

    // COUNT(*) only short-circuits to a bare scan when there's no WHERE to
    // narrow it; a predicate (with or without an index) must still filter
    // before counting, so it falls through to the same row-gathering below.
    if matches!(stmt.columns, SelectColumns::Count) && stmt.filter.is_none() {
        let rows = btree::walk_table(db.pager_mut(), table.root_page, usable_page_size)?;
        return Ok(vec![rows.len().to_string()]);
    }

    let indexed_lookup = stmt.filter.as_ref().filter(|f| f.op == ComparisonOp::Eq).and_then(|filter| {
        db.find_index_on_column(&stmt.table, &filter.column)
            .map(|index| (filter, index.root_page))
    });

    let rows = match indexed_lookup {
        Some((filter, index_root)) => {
            let target = literal_to_serial_data(&filter.literal);
            let mut row_ids =
                btree::probe_index(db.pager_mut(), index_root, usable_page_size, &target)?;
            row_ids.sort_unstable();
            let candidates = btree::walk_table_by_rowids(
                db.pager_mut(),
                table.root_page,
                usable_page_size,
                &row_ids,
            )?;
            candidates
                .into_iter()
                .filter(|(_, record)| row_matches(record, filter, &columns))
                .collect()
        }
        None => {
            let all = btree::walk_table(db.pager_mut(), table.root_page, usable_page_size)?;
            match &stmt.filter {
                Some(filter) => all
                    .into_iter()
                    .filter(|(_, record)| row_matches(record, filter, &columns))
                    .collect(),
                None => all,
            }
        }
    };

    if matches!(stmt.columns, SelectColumns::Count) {
        return Ok(vec![rows.len().to_string()]);
    }

    let projected_indices = resolve_projection(&stmt.columns, &columns, &stmt.table)?;

    Ok(rows
        .iter()
        .map(|(row_id, record)| project_row(*row_id, record, &projected_indices, &columns))
        .collect())
}
