//! Record encoding shared by the write-ahead log and table files.
//!
//! Each record is `tag:u8 | key_len:u32le | value_len:u32le | key | value`,
//! where tag 1 is a value and tag 0 a deletion (with an empty value).

#![allow(clippy::cast_possible_truncation)]

const TAG_DELETION: u8 = 0;
const TAG_VALUE: u8 = 1;
const RECORD_HEADER: usize = 9;

/// A key and either its value or a deletion marker (`None`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Entry {
    pub key: Vec<u8>,
    pub value: Option<Vec<u8>>,
}

impl Entry {
    pub(crate) fn encoded_len(&self) -> usize {
        RECORD_HEADER + self.key.len() + self.value.as_ref().map_or(0, Vec::len)
    }
}

pub(crate) fn encode_record(buf: &mut Vec<u8>, key: &[u8], value: Option<&[u8]>) {
    buf.push(if value.is_some() { TAG_VALUE } else { TAG_DELETION });
    let value = value.unwrap_or_default();
    buf.extend_from_slice(&(key.len() as u32).to_le_bytes());
    buf.extend_from_slice(&(value.len() as u32).to_le_bytes());
    buf.extend_from_slice(key);
    buf.extend_from_slice(value);
}

fn read_u32(bytes: &[u8]) -> usize {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize
}

/// Decode consecutive records from `data`.
///
/// Returns the records and the number of bytes consumed. A trailing partial
/// record is not consumed; callers decide whether that is corruption.
pub(crate) fn decode_records(data: &[u8]) -> Result<(Vec<Entry>, usize), String> {
    let mut entries = Vec::new();
    let mut offset = 0;

    while data.len() - offset >= RECORD_HEADER {
        let header = &data[offset..offset + RECORD_HEADER];
        let tag = header[0];
        let key_len = read_u32(&header[1..5]);
        let value_len = read_u32(&header[5..9]);

        let body_start = offset + RECORD_HEADER;
        let body_end = body_start + key_len + value_len;
        if body_end > data.len() {
            break;
        }

        let key = data[body_start..body_start + key_len].to_vec();
        let value = match tag {
            TAG_VALUE => Some(data[body_start + key_len..body_end].to_vec()),
            TAG_DELETION if value_len == 0 => None,
            _ => return Err(format!("bad record tag {tag} at offset {offset}")),
        };
        entries.push(Entry { key, value });
        offset = body_end;
    }

    Ok((entries, offset))
}
