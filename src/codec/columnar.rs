//! 列存容器（columnar-on-commit）
//!
//! 只在提交时把整块 JSON Lines 缓冲转换一次，写入时从不逐行转换。
//!
//! 文件格式：
//! ```text
//! ┌────────────────────────────────────┐
//! │  MAGIC  (8 bytes) "BLOBCOL\0"      │
//! │  Version(4 bytes) = 1              │
//! ├────────────────────────────────────┤
//! │  DATA REGION                       │
//! │    [chunk col 0]                   │ ← JSON 数组 + LZ4
//! │    [chunk col 1]                   │
//! │    ...                             │
//! ├────────────────────────────────────┤
//! │  FOOTER                            │
//! │    num_rows / num_columns          │
//! │    每列: name, offset, size,        │
//! │          uncomp_size, chunk CRC32  │
//! │    Footer CRC32  (4 bytes)         │
//! │    Footer length (4 bytes)         │
//! │    MAGIC         (8 bytes)         │
//! └────────────────────────────────────┘
//! ```
//!
//! 缺失的属性在列中以 `null` 占位，解码时丢弃。
//! 列顺序为首次出现顺序，重建后的记录按列顺序排列属性。

use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use indexmap::IndexMap;
use serde_json::{Map, Value as Json};

use crate::codec::{lz4_compress, lz4_decompress};
use crate::common::{BlobError, Result};

const MAGIC: &[u8; 8] = b"BLOBCOL\0";
const VERSION: u32     = 1;
/// MAGIC + VERSION
const HEADER_LEN: usize = 12;
/// Footer CRC + Footer length + MAGIC
const TRAILER_LEN: usize = 16;

// ── Footer 结构 ───────────────────────────────────────────────────────────────

#[derive(Debug)]
struct ColumnChunkMeta {
    name:        String,
    offset:      u64,
    size:        u64,
    uncomp_size: u32,
    crc32:       u32,
}

#[derive(Debug)]
struct ColumnarFooter {
    num_rows: u32,
    columns:  Vec<ColumnChunkMeta>,
}

impl ColumnarFooter {
    fn serialize(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        out.write_u32::<LittleEndian>(self.num_rows)?;
        out.write_u32::<LittleEndian>(self.columns.len() as u32)?;
        for c in &self.columns {
            out.write_u32::<LittleEndian>(c.name.len() as u32)?;
            out.extend_from_slice(c.name.as_bytes());
            out.write_u64::<LittleEndian>(c.offset)?;
            out.write_u64::<LittleEndian>(c.size)?;
            out.write_u32::<LittleEndian>(c.uncomp_size)?;
            out.write_u32::<LittleEndian>(c.crc32)?;
        }
        Ok(out)
    }

    fn deserialize(data: &[u8]) -> Result<Self> {
        let mut cur = Cursor::new(data);
        let num_rows    = cur.read_u32::<LittleEndian>().map_err(truncated)?;
        let num_columns = cur.read_u32::<LittleEndian>().map_err(truncated)?;
        let mut columns = Vec::with_capacity(num_columns as usize);
        for _ in 0..num_columns {
            let name_len = cur.read_u32::<LittleEndian>().map_err(truncated)? as usize;
            let mut name = vec![0u8; name_len];
            cur.read_exact(&mut name).map_err(truncated)?;
            let name = String::from_utf8(name)
                .map_err(|e| BlobError::Decode(format!("column name is not UTF-8: {e}")))?;
            columns.push(ColumnChunkMeta {
                name,
                offset:      cur.read_u64::<LittleEndian>().map_err(truncated)?,
                size:        cur.read_u64::<LittleEndian>().map_err(truncated)?,
                uncomp_size: cur.read_u32::<LittleEndian>().map_err(truncated)?,
                crc32:       cur.read_u32::<LittleEndian>().map_err(truncated)?,
            });
        }
        Ok(Self { num_rows, columns })
    }
}

fn truncated(_: std::io::Error) -> BlobError {
    BlobError::Decode("columnar footer truncated".into())
}

// ── 编码：JSON Lines → 列存 ────────────────────────────────────────────────────

pub fn encode(lines: &[u8]) -> Result<Vec<u8>> {
    let mut columns: IndexMap<String, Vec<Json>> = IndexMap::new();
    let mut num_rows = 0usize;

    for line in lines.split(|b| *b == b'\n').filter(|l| !l.is_empty()) {
        let row: Map<String, Json> = serde_json::from_slice(line)
            .map_err(|e| BlobError::Decode(e.to_string()))?;
        for (name, cell) in row {
            columns
                .entry(name)
                .or_insert_with(|| vec![Json::Null; num_rows])
                .push(cell);
        }
        num_rows += 1;
        for cells in columns.values_mut() {
            if cells.len() < num_rows {
                cells.push(Json::Null);
            }
        }
    }

    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    out.write_u32::<LittleEndian>(VERSION)?;

    // ── DATA REGION ───────────────────────────────────────────────────────────
    let mut metas = Vec::with_capacity(columns.len());
    for (name, cells) in columns {
        let raw        = serde_json::to_vec(&cells)
            .map_err(|e| BlobError::Serialization(e.to_string()))?;
        let compressed = lz4_compress(&raw)?;
        metas.push(ColumnChunkMeta {
            name,
            offset:      out.len() as u64,
            size:        compressed.len() as u64,
            uncomp_size: raw.len() as u32,
            crc32:       crc32fast::hash(&compressed),
        });
        out.extend_from_slice(&compressed);
    }

    // ── FOOTER ────────────────────────────────────────────────────────────────
    let footer = ColumnarFooter { num_rows: num_rows as u32, columns: metas };
    let footer_bytes = footer.serialize()?;
    out.extend_from_slice(&footer_bytes);
    out.write_u32::<LittleEndian>(crc32fast::hash(&footer_bytes))?;
    out.write_u32::<LittleEndian>(footer_bytes.len() as u32)?;
    out.extend_from_slice(MAGIC);
    Ok(out)
}

// ── 解码：列存 → JSON Lines ────────────────────────────────────────────────────

pub fn decode(data: &[u8]) -> Result<Vec<u8>> {
    let n = data.len();
    if n < HEADER_LEN + TRAILER_LEN || &data[..8] != MAGIC || &data[n - 8..] != MAGIC {
        return Err(BlobError::Decode("invalid columnar magic".into()));
    }
    let mut trailer = Cursor::new(&data[n - TRAILER_LEN..n - 8]);
    let footer_crc  = trailer.read_u32::<LittleEndian>().map_err(truncated)?;
    let footer_len  = trailer.read_u32::<LittleEndian>().map_err(truncated)? as usize;
    let footer_start = (n - TRAILER_LEN)
        .checked_sub(footer_len)
        .filter(|start| *start >= HEADER_LEN)
        .ok_or_else(|| BlobError::Decode("columnar footer length out of range".into()))?;
    let footer_bytes = &data[footer_start..n - TRAILER_LEN];
    if crc32fast::hash(footer_bytes) != footer_crc {
        return Err(BlobError::ChecksumMismatch);
    }
    let footer = ColumnarFooter::deserialize(footer_bytes)?;

    let mut columns = Vec::with_capacity(footer.columns.len());
    for meta in footer.columns {
        let start = meta.offset as usize;
        let end   = start.checked_add(meta.size as usize)
            .filter(|end| *end <= footer_start)
            .ok_or_else(|| BlobError::Decode(format!("chunk `{}` out of range", meta.name)))?;
        let chunk = &data[start..end];
        if crc32fast::hash(chunk) != meta.crc32 {
            return Err(BlobError::ChecksumMismatch);
        }
        let raw = lz4_decompress(chunk, meta.uncomp_size as usize)?;
        let cells: Vec<Json> = serde_json::from_slice(&raw)
            .map_err(|e| BlobError::Decode(e.to_string()))?;
        if cells.len() != footer.num_rows as usize {
            return Err(BlobError::Decode(format!(
                "column `{}` has {} cells, expected {}", meta.name, cells.len(), footer.num_rows,
            )));
        }
        columns.push((meta.name, cells.into_iter()));
    }

    let mut out = Vec::new();
    for _ in 0..footer.num_rows {
        let mut row = Map::with_capacity(columns.len());
        for (name, cells) in columns.iter_mut() {
            match cells.next() {
                Some(Json::Null) | None => {}
                Some(cell)              => { row.insert(name.clone(), cell); }
            }
        }
        serde_json::to_writer(&mut out, &Json::Object(row))
            .map_err(|e| BlobError::Serialization(e.to_string()))?;
        out.push(b'\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparse_columns_are_padded_and_dropped_again() {
        let lines = b"{\"name\":\"water\"}\n{\"name\":\"salt\",\"elements\":[\"sodium\",\"chlorine\"]}\n{\"weight\":18.0}\n";
        let encoded = encode(lines).unwrap();
        assert_eq!(&encoded[..8], MAGIC);
        assert_eq!(decode(&encoded).unwrap(), lines.to_vec());
    }

    #[test]
    fn attributes_come_back_in_column_order() {
        let lines = b"{\"a\":1}\n{\"b\":2,\"a\":3}\n";
        let decoded = decode(&encode(lines).unwrap()).unwrap();
        assert_eq!(decoded, b"{\"a\":1}\n{\"a\":3,\"b\":2}\n".to_vec());

        let second = crate::value::Record::from_line(decoded.split(|b| *b == b'\n').nth(1).unwrap()).unwrap();
        let names: Vec<_> = second.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["a", "b"]);
        // 记录相等与属性顺序无关
        assert_eq!(second, crate::value::Record::from_line(b"{\"b\":2,\"a\":3}").unwrap());
    }

    #[test]
    fn empty_buffer_gives_empty_container() {
        let encoded = encode(b"").unwrap();
        assert!(decode(&encoded).unwrap().is_empty());
    }

    #[test]
    fn corrupted_footer_is_detected() {
        let mut encoded = encode(b"{\"a\":1}\n").unwrap();
        let n = encoded.len();
        // 篡改 footer 中的 num_rows
        let footer_len = u32::from_le_bytes(encoded[n - 12..n - 8].try_into().unwrap()) as usize;
        encoded[n - 16 - footer_len] ^= 0xFF;
        assert!(matches!(decode(&encoded), Err(BlobError::ChecksumMismatch)));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(decode(b"not a container"), Err(BlobError::Decode(_))));
    }
}
