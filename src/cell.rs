/*
The amount of payload that spills onto overflow pages depends on the page
type. Let U be the usable size of a database page (page size less the
reserved space at the end of each page) and P be the payload size.

Table b-tree leaf cell: let X = U-35. If P <= X the entire payload lives on
the leaf page. Otherwise let M = ((U-12)*32/255)-23 and K = M+((P-M)%(U-4));
the number of bytes stored locally is K if K <= X, else M.

Index b-tree cell (leaf or interior): same M, but X = ((U-12)*64/255)-23.

In both cases the local bytes are immediately followed by a 4-byte
big-endian page number of the first overflow page whenever P exceeds what
fits locally.
*/
use thiserror::Error;

use crate::pager::Pager;
use crate::record::{assemble_payload, Record, RecordError};
use crate::varint::{read_uint_be, read_varint, VarIntError};

#[derive(Debug, Error)]
pub enum CellError {
    #[error(transparent)]
    Varint(#[from] VarIntError),
    #[error(transparent)]
    Record(#[from] RecordError),
}

fn local_table_leaf_size(usable_page_size: i64, payload_size: i64) -> i64 {
    let x = usable_page_size - 35;
    if payload_size <= x {
        return payload_size;
    }
    let m = ((usable_page_size - 12) * 32 / 255) - 23;
    let k = m + ((payload_size - m) % (usable_page_size - 4));
    if k <= x {
        k
    } else {
        m
    }
}

fn local_index_size(usable_page_size: i64, payload_size: i64) -> i64 {
    let x = ((usable_page_size - 12) * 64 / 255) - 23;
    if payload_size <= x {
        return payload_size;
    }
    let m = ((usable_page_size - 12) * 32 / 255) - 23;
    let k = m + ((payload_size - m) % (usable_page_size - 4));
    if k <= x {
        k
    } else {
        m
    }
}

/// Resolves a record whose declared size is `payload_size`, given the bytes
/// immediately following the size/key varints in the cell. `local_size` is
/// how many of those bytes live on this page before either the record ends
/// or an overflow page pointer begins. Returns the record and the number of
/// cell-content bytes consumed (local payload bytes plus, if present, the
/// 4-byte overflow pointer).
fn resolve_record(
    cell_content: &[u8],
    payload_size: i64,
    local_size: i64,
    pager: &mut Pager,
) -> Result<(Record, usize), CellError> {
    let local_size = local_size as usize;
    let payload_size = payload_size as usize;
    let local_bytes = &cell_content[..local_size];

    if local_size == payload_size {
        let (record, _) = Record::parse(local_bytes)?;
        return Ok((record, local_size));
    }

    let overflow_page = read_uint_be(cell_content, local_size, 4) as u32;
    let full_payload = assemble_payload(local_bytes, payload_size, overflow_page, pager)?;
    let (record, _) = Record::parse(&full_payload)?;
    Ok((record, local_size + 4))
}

#[derive(Debug, Clone)]
pub struct TableLeafCell {
    pub row_id: i64,
    pub record: Record,
}

impl TableLeafCell {
    /// Parses a table b-tree leaf cell, returning it and the number of
    /// bytes of `cell_content` it occupies.
    pub fn parse(
        cell_content: &[u8],
        usable_page_size: u32,
        pager: &mut Pager,
    ) -> Result<(Self, usize), CellError> {
        let (payload_size, payload_size_len) = read_varint(cell_content, 0)?;
        let mut offset = payload_size_len as usize;

        let (row_id, row_id_len) = read_varint(cell_content, offset)?;
        offset += row_id_len as usize;

        let local_size = local_table_leaf_size(usable_page_size as i64, payload_size);
        let (record, consumed) = resolve_record(&cell_content[offset..], payload_size, local_size, pager)?;
        offset += consumed;

        Ok((TableLeafCell { row_id, record }, offset))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TableInteriorCell {
    pub left_child_page: u32,
    pub row_id_key: i64,
}

impl TableInteriorCell {
    pub fn parse(cell_content: &[u8]) -> Result<(Self, usize), CellError> {
        let left_child_page = read_uint_be(cell_content, 0, 4) as u32;
        let (row_id_key, key_len) = read_varint(cell_content, 4)?;
        Ok((
            TableInteriorCell {
                left_child_page,
                row_id_key,
            },
            4 + key_len as usize,
        ))
    }
}

#[derive(Debug, Clone)]
pub struct IndexLeafCell {
    pub record: Record,
}

impl IndexLeafCell {
    pub fn parse(
        cell_content: &[u8],
        usable_page_size: u32,
        pager: &mut Pager,
    ) -> Result<(Self, usize), CellError> {
        let (payload_size, payload_size_len) = read_varint(cell_content, 0)?;
        let offset = payload_size_len as usize;

        let local_size = local_index_size(usable_page_size as i64, payload_size);
        let (record, consumed) = resolve_record(&cell_content[offset..], payload_size, local_size, pager)?;

        Ok((IndexLeafCell { record }, offset + consumed))
    }
}

#[derive(Debug, Clone)]
pub struct IndexInteriorCell {
    pub left_child_page: u32,
    pub record: Record,
}

impl IndexInteriorCell {
    pub fn parse(
        cell_content: &[u8],
        usable_page_size: u32,
        pager: &mut Pager,
    ) -> Result<(Self, usize), CellError> {
        let left_child_page = read_uint_be(cell_content, 0, 4) as u32;
        let (payload_size, payload_size_len) = read_varint(cell_content, 4)?;
        let offset = 4 + payload_size_len as usize;

        let local_size = local_index_size(usable_page_size as i64, payload_size);
        let (record, consumed) = resolve_record(&cell_content[offset..], payload_size, local_size, pager)?;

        Ok((
            IndexInteriorCell {
                left_child_page,
                record,
            },
            offset + consumed,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_record_bytes(text: &str) -> Vec<u8> {
        let mut bytes = vec![3, (13 + 2 * text.len()) as u8];
        bytes.extend(text.as_bytes());
        bytes
    }

    #[test]
    fn table_leaf_cell_with_no_overflow() {
        let record_bytes = tiny_record_bytes("hi");
        let mut cell_content = Vec::new();
        cell_content.push(record_bytes.len() as u8); // payload size varint
        cell_content.push(42); // row id varint
        cell_content.extend(&record_bytes);

        let mut path = std::env::temp_dir();
        path.push(format!("pagequery-cell-test-{}", std::process::id()));
        std::fs::write(&path, vec![0u8; 512]).unwrap();
        let mut pager = Pager::open(path.to_str().unwrap(), 512).unwrap();

        let (cell, consumed) = TableLeafCell::parse(&cell_content, 512, &mut pager).unwrap();
        assert_eq!(cell.row_id, 42);
        assert_eq!(consumed, cell_content.len());
        assert_eq!(cell.record.get(0).unwrap().as_text(), Some("hi"));

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn table_interior_cell_layout() {
        let mut cell_content = vec![0, 0, 0, 7];
        cell_content.push(99);
        let (cell, consumed) = TableInteriorCell::parse(&cell_content).unwrap();
        assert_eq!(cell.left_child_page, 7);
        assert_eq!(cell.row_id_key, 99);
        assert_eq!(consumed, 5);
    }

    #[test]
    fn local_table_leaf_size_stays_local_below_threshold() {
        assert_eq!(local_table_leaf_size(4096, 100), 100);
    }

    #[test]
    fn local_table_leaf_size_spills_above_threshold() {
        let usable = 512i64;
        let payload = 4096i64;
        let local = local_table_leaf_size(usable, payload);
        assert!(local < payload);
        assert!(local > 0);
    }
}
