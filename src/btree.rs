/*
A b-tree page is divided into regions in the following order: the 100-byte
database file header (page 1 only), the 8/12-byte b-tree page header, the
cell pointer array, unallocated space, the cell content area, and the
reserved region. Table b-tree interior pages hold (left child page, row id
key) cells and route traversal; table b-tree leaf pages hold the actual
rows. Every row id in the subtree reached through an interior cell's left
child is less than or equal to that cell's key; the page header's rightmost
child holds everything greater than the last key on the page. Index b-tree
pages follow the same left-subtree-then-key-then-next-subtree shape, but
the "key" is the indexed column's value and the row id rides along as the
record's last field.
*/
use log::debug;
use thiserror::Error;

use crate::cell::{CellError, IndexInteriorCell, IndexLeafCell, TableInteriorCell, TableLeafCell};
use crate::page::{PageError, PageHeader, PageKind};
use crate::pager::{Pager, PagerError};
use crate::record::Record;
use crate::serial::SerialData;

#[derive(Debug, Error)]
pub enum BtreeError {
    #[error(transparent)]
    Pager(#[from] PagerError),
    #[error(transparent)]
    Page(#[from] PageError),
    #[error(transparent)]
    Cell(#[from] CellError),
    #[error("expected a table or index page at this position in the tree")]
    UnexpectedPageKind,
    #[error("index record did not carry enough columns for a row id")]
    MalformedIndexRecord,
}

fn read_header(pager: &mut Pager, page_number: u32) -> Result<(Vec<u8>, PageHeader), BtreeError> {
    let buf = pager.read_page(page_number)?;
    let offset_adjust = if page_number == 1 { 100 } else { 0 };
    let header = PageHeader::parse(&buf, offset_adjust)?;
    Ok((buf, header))
}

/// Full scan of a table b-tree rooted at `page_number`, in row-id order.
pub fn walk_table(
    pager: &mut Pager,
    page_number: u32,
    usable_page_size: u32,
) -> Result<Vec<(i64, Record)>, BtreeError> {
    let (buf, header) = read_header(pager, page_number)?;
    let mut rows = Vec::new();

    match header.kind {
        PageKind::LeafTable => {
            debug!("leaf table page {page_number} with {} cells", header.cell_count);
            for &ptr in &header.cell_pointers {
                let cell_content = &buf[ptr as usize..];
                let (cell, _) = TableLeafCell::parse(cell_content, usable_page_size, pager)?;
                rows.push((cell.row_id, cell.record));
            }
        }
        PageKind::InteriorTable => {
            debug!("interior table page {page_number} with {} cells", header.cell_count);
            for &ptr in &header.cell_pointers {
                let cell_content = &buf[ptr as usize..];
                let (cell, _) = TableInteriorCell::parse(cell_content)?;
                rows.extend(walk_table(pager, cell.left_child_page, usable_page_size)?);
            }
            if let Some(rightmost) = header.rightmost_child {
                rows.extend(walk_table(pager, rightmost, usable_page_size)?);
            }
        }
        PageKind::LeafIndex | PageKind::InteriorIndex => return Err(BtreeError::UnexpectedPageKind),
    }

    Ok(rows)
}

/// Targeted lookup of specific row ids out of a table b-tree. `row_ids` must
/// be sorted ascending; a page's cell keys partition the caller's remaining
/// ids the same way the tree itself partitions row ids, so only the
/// subtrees that can contain a requested id are ever visited.
pub fn walk_table_by_rowids(
    pager: &mut Pager,
    page_number: u32,
    usable_page_size: u32,
    row_ids: &[i64],
) -> Result<Vec<(i64, Record)>, BtreeError> {
    if row_ids.is_empty() {
        return Ok(Vec::new());
    }

    let (buf, header) = read_header(pager, page_number)?;
    let mut rows = Vec::new();

    match header.kind {
        PageKind::LeafTable => {
            for &ptr in &header.cell_pointers {
                let cell_content = &buf[ptr as usize..];
                let (cell, _) = TableLeafCell::parse(cell_content, usable_page_size, pager)?;
                if row_ids.binary_search(&cell.row_id).is_ok() {
                    rows.push((cell.row_id, cell.record));
                }
            }
        }
        PageKind::InteriorTable => {
            let mut remaining = row_ids;
            for &ptr in &header.cell_pointers {
                let cell_content = &buf[ptr as usize..];
                let (cell, _) = TableInteriorCell::parse(cell_content)?;

                let split = remaining.partition_point(|id| *id <= cell.row_id_key);
                let (left_ids, rest) = remaining.split_at(split);
                if !left_ids.is_empty() {
                    rows.extend(walk_table_by_rowids(
                        pager,
                        cell.left_child_page,
                        usable_page_size,
                        left_ids,
                    )?);
                }
                remaining = rest;
            }
            if let Some(rightmost) = header.rightmost_child {
                if !remaining.is_empty() {
                    rows.extend(walk_table_by_rowids(
                        pager,
                        rightmost,
                        usable_page_size,
                        remaining,
                    )?);
                }
            }
        }
        PageKind::LeafIndex | PageKind::InteriorIndex => return Err(BtreeError::UnexpectedPageKind),
    }

    Ok(rows)
}

/// Orders two record values the way the b-tree that holds them would: same
/// storage class compares natively, integers and reals compare numerically
/// against each other, and NULL sorts before everything. Mismatched
/// non-numeric classes (e.g. a BLOB against a TEXT) have no natural order in
/// this crate's scope and are treated as equal so they neither prune a
/// subtree nor falsely match.
fn compare_serial_data(a: &SerialData, b: &SerialData) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    use SerialData::*;

    match (a, b) {
        (Null, Null) => Ordering::Equal,
        (Null, _) => Ordering::Less,
        (_, Null) => Ordering::Greater,
        (Integer(x), Integer(y)) => x.cmp(y),
        (Real(x), Real(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Integer(x), Real(y)) => (*x as f64).partial_cmp(y).unwrap_or(Ordering::Equal),
        (Real(x), Integer(y)) => x.partial_cmp(&(*y as f64)).unwrap_or(Ordering::Equal),
        (Text(x), Text(y)) => x.cmp(y),
        (Blob(x), Blob(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

fn push_if_match(record: &Record, target: &SerialData, out: &mut Vec<i64>) -> Result<(), BtreeError> {
    let key = record.values.first().ok_or(BtreeError::MalformedIndexRecord)?;
    if compare_serial_data(key, target) == std::cmp::Ordering::Equal {
        let row_id = record
            .values
            .last()
            .and_then(|v| v.as_i64())
            .ok_or(BtreeError::MalformedIndexRecord)?;
        out.push(row_id);
    }
    Ok(())
}

/// Equality probe over a single-column index b-tree: returns the table row
/// ids of every indexed record whose indexed value equals `target`.
pub fn probe_index(
    pager: &mut Pager,
    page_number: u32,
    usable_page_size: u32,
    target: &SerialData,
) -> Result<Vec<i64>, BtreeError> {
    let (buf, header) = read_header(pager, page_number)?;
    let mut results = Vec::new();

    match header.kind {
        PageKind::LeafIndex => {
            for &ptr in &header.cell_pointers {
                let cell_content = &buf[ptr as usize..];
                let (cell, _) = IndexLeafCell::parse(cell_content, usable_page_size, pager)?;
                push_if_match(&cell.record, target, &mut results)?;
            }
        }
        PageKind::InteriorIndex => {
            let mut descend_rightmost = header.cell_pointers.is_empty();
            for &ptr in &header.cell_pointers {
                let cell_content = &buf[ptr as usize..];
                let (cell, _) = IndexInteriorCell::parse(cell_content, usable_page_size, pager)?;
                let key = cell
                    .record
                    .values
                    .first()
                    .ok_or(BtreeError::MalformedIndexRecord)?;
                let cmp = compare_serial_data(key, target);

                if cmp != std::cmp::Ordering::Less {
                    results.extend(probe_index(
                        pager,
                        cell.left_child_page,
                        usable_page_size,
                        target,
                    )?);
                }
                push_if_match(&cell.record, target, &mut results)?;
                descend_rightmost = cmp != std::cmp::Ordering::Greater;
            }
            if descend_rightmost {
                if let Some(rightmost) = header.rightmost_child {
                    results.extend(probe_index(pager, rightmost, usable_page_size, target)?);
                }
            }
        }
        PageKind::LeafTable | PageKind::InteriorTable => return Err(BtreeError::UnexpectedPageKind),
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    const PAGE_SIZE: u32 = 512;

    fn leaf_table_page_with_rows(rows: &[(i64, &str)]) -> Vec<u8> {
        let mut page = vec![0u8; PAGE_SIZE as usize];
        page[0] = 0x0D;

        let mut cell_bytes = Vec::new();
        let mut pointers = Vec::new();
        let mut content_cursor = PAGE_SIZE as usize;

        for &(row_id, text) in rows {
            let mut record = vec![3u8, (13 + 2 * text.len()) as u8];
            record.extend(text.as_bytes());

            let mut cell = vec![record.len() as u8, row_id as u8];
            cell.extend(&record);
            cell_bytes.push(cell);
        }

        for cell in cell_bytes.iter().rev() {
            content_cursor -= cell.len();
            page[content_cursor..content_cursor + cell.len()].copy_from_slice(cell);
            pointers.push(content_cursor as u16);
        }
        pointers.reverse();

        page[3..5].copy_from_slice(&(rows.len() as u16).to_be_bytes());
        for (i, &ptr) in pointers.iter().enumerate() {
            page[8 + i * 2..10 + i * 2].copy_from_slice(&ptr.to_be_bytes());
        }

        page
    }

    fn write_pages(pages: &[Vec<u8>]) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("pagequery-btree-test-{}", std::process::id()));
        let mut f = File::create(&path).unwrap();
        for page in pages {
            f.write_all(page).unwrap();
        }
        path
    }

    #[test]
    fn walk_table_scans_a_single_leaf_page() {
        let page = leaf_table_page_with_rows(&[(1, "a"), (2, "b"), (3, "c")]);
        let path = write_pages(&[page]);
        let mut pager = Pager::open(path.to_str().unwrap(), PAGE_SIZE).unwrap();

        let rows = walk_table(&mut pager, 1, PAGE_SIZE).unwrap();
        let ids: Vec<i64> = rows.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn walk_table_descends_interior_pages_left_to_right() {
        let left_leaf = leaf_table_page_with_rows(&[(1, "a"), (2, "b")]);
        let right_leaf = leaf_table_page_with_rows(&[(3, "c"), (4, "d")]);

        let mut root = vec![0u8; PAGE_SIZE as usize];
        root[0] = 0x05;
        root[3..5].copy_from_slice(&1u16.to_be_bytes());
        root[8..12].copy_from_slice(&3u32.to_be_bytes()); // rightmost child: page 3

        let mut cell = vec![0, 0, 0, 2]; // left child: page 2
        cell.push(2); // row id key = 2 (interior cells cap the left subtree's row ids)
        let cell_offset = PAGE_SIZE as usize - cell.len();
        root[cell_offset..cell_offset + cell.len()].copy_from_slice(&cell);
        root[12..14].copy_from_slice(&(cell_offset as u16).to_be_bytes());

        let path = write_pages(&[root, left_leaf, right_leaf]);
        let mut pager = Pager::open(path.to_str().unwrap(), PAGE_SIZE).unwrap();

        let rows = walk_table(&mut pager, 1, PAGE_SIZE).unwrap();
        let ids: Vec<i64> = rows.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn walk_table_by_rowids_only_visits_matching_subtrees() {
        let left_leaf = leaf_table_page_with_rows(&[(1, "a"), (2, "b")]);
        let right_leaf = leaf_table_page_with_rows(&[(3, "c"), (4, "d")]);

        let mut root = vec![0u8; PAGE_SIZE as usize];
        root[0] = 0x05;
        root[3..5].copy_from_slice(&1u16.to_be_bytes());
        root[8..12].copy_from_slice(&3u32.to_be_bytes());

        let mut cell = vec![0, 0, 0, 2];
        cell.push(2);
        let cell_offset = PAGE_SIZE as usize - cell.len();
        root[cell_offset..cell_offset + cell.len()].copy_from_slice(&cell);
        root[12..14].copy_from_slice(&(cell_offset as u16).to_be_bytes());

        let path = write_pages(&[root, left_leaf, right_leaf]);
        let mut pager = Pager::open(path.to_str().unwrap(), PAGE_SIZE).unwrap();

        let rows = walk_table_by_rowids(&mut pager, 1, PAGE_SIZE, &[4]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, 4);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn compare_serial_data_orders_integers_and_reals_numerically() {
        assert_eq!(
            compare_serial_data(&SerialData::Integer(2), &SerialData::Real(2.0)),
            std::cmp::Ordering::Equal
        );
        assert_eq!(
            compare_serial_data(&SerialData::Integer(1), &SerialData::Integer(2)),
            std::cmp::Ordering::Less
        );
    }
}
