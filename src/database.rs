/*
Database File Header (first 100 bytes of page 1):
Offset	Size	Description
0	16	The header string: "SQLite format 3\000"
16	2	Database page size in bytes. A stored value of 1 represents 65536.
18	1	File format write version. 1 for legacy; 2 for WAL.
19	1	File format read version. 1 for legacy; 2 for WAL.
20	1	Bytes of unused "reserved" space at the end of each page.
21	1	Maximum embedded payload fraction. Must be 64.
22	1	Minimum embedded payload fraction. Must be 32.
23	1	Leaf payload fraction. Must be 32.
24	4	File change counter.
28	4	Size of the database file in pages.
32	4	Page number of the first freelist trunk page.
36	4	Total number of freelist pages.
40	4	The schema cookie.
44	4	The schema format number. Supported formats are 1-4.
48	4	Default page cache size.
52	4	Page number of the largest root b-tree page in auto/incremental-vacuum mode.
56	4	The database text encoding. 1=UTF-8, 2=UTF-16le, 3=UTF-16be.
60	4	The "user version" as set by the user_version pragma.
64	4	True (non-zero) for incremental-vacuum mode.
68	4	The "Application ID" set by PRAGMA application_id.
92	4	The version-valid-for number.
96	4	SQLITE_VERSION_NUMBER.

sqlite_schema (the catalog) is itself a table b-tree rooted at page 1, with
columns (type, name, tbl_name, rootpage, sql). Row names starting with
"sqlite_" are internal bookkeeping and are excluded from anything
user-facing.
*/
use thiserror::Error;

use crate::btree::{self, BtreeError};
use crate::pager::{Pager, PagerError};
use crate::query::{self, ColumnDef, ParseError, Statement};
use crate::record::Record;
use crate::varint::read_uint_be;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("no such table: {0}")]
    NoSuchTable(String),
    #[error("no such column '{0}' on table '{1}'")]
    NoSuchColumn(String, String),
}

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Pager(#[from] PagerError),
    #[error(transparent)]
    Btree(#[from] BtreeError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("sqlite_schema row did not have the expected shape")]
    MalformedSchemaRow,
}

#[derive(Debug)]
pub struct DatabaseHeader {
    pub page_size: u32,
    pub file_format_write_version: u8,
    pub file_format_read_version: u8,
    pub reserved_bytes_per_page: u8,
    pub file_change_counter: u32,
    pub db_size_in_pages: u32,
    pub schema_cookie: u32,
    pub schema_format_number: u32,
    pub database_text_encoding: u32,
    pub user_version: u32,
    pub application_id: u32,
    pub version_valid_for: u32,
    pub sqlite_version_number: u32,
}

impl DatabaseHeader {
    pub fn parse(bytes: &[u8; 100]) -> Self {
        let raw_page_size = read_uint_be(bytes, 16, 2) as u32;
        let page_size = if raw_page_size == 1 { 65536 } else { raw_page_size };

        DatabaseHeader {
            page_size,
            file_format_write_version: bytes[18],
            file_format_read_version: bytes[19],
            reserved_bytes_per_page: bytes[20],
            file_change_counter: read_uint_be(bytes, 24, 4) as u32,
            db_size_in_pages: read_uint_be(bytes, 28, 4) as u32,
            schema_cookie: read_uint_be(bytes, 40, 4) as u32,
            schema_format_number: read_uint_be(bytes, 44, 4) as u32,
            database_text_encoding: read_uint_be(bytes, 56, 4) as u32,
            user_version: read_uint_be(bytes, 60, 4) as u32,
            application_id: read_uint_be(bytes, 68, 4) as u32,
            version_valid_for: read_uint_be(bytes, 92, 4) as u32,
            sqlite_version_number: read_uint_be(bytes, 96, 4) as u32,
        }
    }

}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Table,
    Index,
}

#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub kind: ObjectKind,
    pub name: String,
    pub table_name: String,
    pub root_page: u32,
    pub sql: String,
}

impl CatalogEntry {
    fn from_schema_record(record: &Record) -> Result<Self, DatabaseError> {
        if record.values.len() < 5 {
            return Err(DatabaseError::MalformedSchemaRow);
        }

        let kind = match record.values[0].as_text() {
            Some("table") => ObjectKind::Table,
            Some("index") => ObjectKind::Index,
            _ => return Err(DatabaseError::MalformedSchemaRow),
        };
        let name = record.values[1]
            .as_text()
            .ok_or(DatabaseError::MalformedSchemaRow)?
            .to_string();
        let table_name = record.values[2]
            .as_text()
            .ok_or(DatabaseError::MalformedSchemaRow)?
            .to_string();
        let root_page = record.values[3]
            .as_i64()
            .ok_or(DatabaseError::MalformedSchemaRow)? as u32;
        let sql = record.values[4].as_text().unwrap_or("").to_string();

        Ok(CatalogEntry {
            kind,
            name,
            table_name,
            root_page,
            sql,
        })
    }
}

#[derive(Debug, Default)]
pub struct Catalog {
    tables: Vec<CatalogEntry>,
    indexes: Vec<CatalogEntry>,
}

pub struct Database {
    pager: Pager,
    pub header: DatabaseHeader,
    catalog: Catalog,
}

impl Database {
    pub fn open(path: &str) -> Result<Self, DatabaseError> {
        use std::io::Read;

        let mut header_bytes = [0u8; 100];
        std::fs::File::open(path)?.read_exact(&mut header_bytes)?;
        let header = DatabaseHeader::parse(&header_bytes);

        let mut pager = Pager::open(path, header.page_size)?;
        let usable_page_size = header.page_size - header.reserved_bytes_per_page as u32;

        let mut catalog = Catalog::default();
        for (_, record) in btree::walk_table(&mut pager, 1, usable_page_size)? {
            let entry = CatalogEntry::from_schema_record(&record)?;
            if entry.name.starts_with("sqlite_") {
                continue;
            }
            match entry.kind {
                ObjectKind::Table => catalog.tables.push(entry),
                ObjectKind::Index => catalog.indexes.push(entry),
            }
        }

        Ok(Database {
            pager,
            header,
            catalog,
        })
    }

    /// The cell count of page 1's own b-tree header: the number of rows in
    /// sqlite_schema, used by `.dbinfo` as "number of tables".
    pub fn page_one_cell_count(&mut self) -> Result<u32, DatabaseError> {
        let page_one = self.pager.read_page(1)?;
        Ok(read_uint_be(&page_one, 103, 2) as u32)
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.catalog.tables.iter().map(|e| e.name.as_str())
    }

    pub fn find_table(&self, table_name: &str) -> Result<&CatalogEntry, CatalogError> {
        self.catalog
            .tables
            .iter()
            .find(|e| e.table_name == table_name)
            .ok_or_else(|| CatalogError::NoSuchTable(table_name.to_string()))
    }

    pub fn find_index_on_column(&self, table_name: &str, column: &str) -> Option<&CatalogEntry> {
        self.catalog.indexes.iter().find(|e| {
            e.table_name == table_name
                && index_column(&e.sql).is_some_and(|c| c.eq_ignore_ascii_case(column))
        })
    }

    pub fn table_columns(&self, table_name: &str) -> Result<Vec<ColumnDef>, DatabaseError> {
        let entry = self.find_table(table_name)?;
        match query::parse(&entry.sql)? {
            Statement::CreateTable(stmt) => Ok(stmt.columns),
            _ => Err(DatabaseError::MalformedSchemaRow),
        }
    }

    pub fn usable_page_size(&self) -> u32 {
        self.header.page_size - self.header.reserved_bytes_per_page as u32
    }

    pub fn pager_mut(&mut self) -> &mut Pager {
        &mut self.pager
    }
}

fn index_column(sql: &str) -> Option<String> {
    match query::parse(sql).ok()? {
        Statement::CreateIndex(stmt) => Some(stmt.column),
        _ => None,
    }
}

/// Resolves `column` to its declared position in `table_name`'s column
/// list, case-insensitively. Free-standing rather than a `Database` method
/// since it only operates on a column list the caller already holds (the
/// result of `table_columns`), with no catalog or pager access needed.
pub fn resolve_column_index(
    table_name: &str,
    columns: &[ColumnDef],
    column: &str,
) -> Result<usize, CatalogError> {
    columns
        .iter()
        .position(|c| c.name.eq_ignore_ascii_case(column))
        .ok_or_else(|| CatalogError::NoSuchColumn(column.to_string(), table_name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_parses_page_size_and_reserved_bytes() {
        let mut bytes = [0u8; 100];
        bytes[16..18].copy_from_slice(&4096u16.to_be_bytes());
        bytes[20] = 0;

        let header = DatabaseHeader::parse(&bytes);
        assert_eq!(header.page_size, 4096);
        assert_eq!(header.reserved_bytes_per_page, 0);
    }

    #[test]
    fn page_size_value_one_means_65536() {
        let mut bytes = [0u8; 100];
        bytes[16..18].copy_from_slice(&1u16.to_be_bytes());

        let header = DatabaseHeader::parse(&bytes);
        assert_eq!(header.page_size, 65536);
    }

    #[test]
    fn catalog_entry_rejects_short_records() {
        let record = Record { values: vec![] };
        assert!(CatalogEntry::from_schema_record(&record).is_err());
    }
}
