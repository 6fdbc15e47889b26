/*
Payload, either table b-tree data or index b-tree keys, is always in the
record format. A record contains a header and a body, in that order. The
header begins with a single varint giving the total number of bytes in the
header, including the size varint itself. Following the size varint are one
or more additional varints, one per column, giving each column's serial
type (see serial.rs for the serial type table). The values for each column
follow the header immediately, back to back, in declaration order.

A record may have fewer values than the table has columns (e.g. after an
ALTER TABLE ... ADD COLUMN); missing trailing values are simply absent from
this decoder's output rather than being filled with a declared default,
since that default resolution belongs to the executor, not the decoder.
*/
use thiserror::Error;

use crate::pager::{Pager, PagerError};
use crate::serial::{SerialData, SerialDataError, SerialType};
use crate::varint::{read_uint_be, read_varint, VarIntError};

#[derive(Debug, Error)]
pub enum RecordError {
    #[error(transparent)]
    Varint(#[from] VarIntError),
    #[error(transparent)]
    Serial(#[from] SerialDataError),
    #[error(transparent)]
    Pager(#[from] PagerError),
    #[error("overflow chain ended before the record's declared payload size was satisfied")]
    UnsupportedOverflow,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub values: Vec<SerialData>,
}

impl Record {
    /// Parses a complete record out of `bytes`, which must already hold the
    /// entire payload (overflow chains are resolved by the caller via
    /// `assemble_payload` before this is called). Returns the record and the
    /// number of bytes consumed.
    pub fn parse(bytes: &[u8]) -> Result<(Self, usize), RecordError> {
        let (header_size, header_varint_len) = read_varint(bytes, 0)?;
        let header_size = header_size as usize;
        let mut offset = header_varint_len as usize;

        let mut serial_types = Vec::new();
        while offset < header_size {
            let (code, len) = read_varint(bytes, offset)?;
            offset += len as usize;
            serial_types.push(SerialType::from_code(code)?);
        }

        let mut body_offset = offset;
        let mut values = Vec::with_capacity(serial_types.len());
        for serial_type in &serial_types {
            let (value, consumed) = serial_type.decode(&bytes[body_offset..])?;
            body_offset += consumed;
            values.push(value);
        }

        Ok((Record { values }, body_offset))
    }

    pub fn get(&self, index: usize) -> Option<&SerialData> {
        self.values.get(index)
    }
}

/// Assembles a record's full payload when the locally-stored portion is
/// shorter than the record's declared total size, by following the
/// overflow page chain. Each overflow page starts with a 4-byte big-endian
/// pointer to the next overflow page (0 if it is the last one) followed by
/// up to `page_size - 4` bytes of payload continuation.
pub fn assemble_payload(
    local_bytes: &[u8],
    total_payload_size: usize,
    first_overflow_page: u32,
    pager: &mut Pager,
) -> Result<Vec<u8>, RecordError> {
    let mut payload = local_bytes.to_vec();
    let mut next_page = first_overflow_page;

    while payload.len() < total_payload_size {
        if next_page == 0 {
            return Err(RecordError::UnsupportedOverflow);
        }
        let page = pager.read_page(next_page)?;
        let pointer = read_uint_be(&page, 0, 4) as u32;
        let remaining_needed = total_payload_size - payload.len();
        let available = page.len() - 4;
        let take = remaining_needed.min(available);
        payload.extend_from_slice(&page[4..4 + take]);
        next_page = pointer;
    }

    Ok(payload)
}
