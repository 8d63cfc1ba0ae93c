//! Blob 编解码（jsonl / lzma / zstd / columnar）
//!
//! 编解码作用于一个完整 blob 的字节流，而不是逐条记录：
//! - **jsonl**   ：原样写出 JSON Lines
//! - **lzma**    ：xz/LZMA2 流
//! - **zstd**    ：zstandard 帧
//! - **columnar**：提交时把行缓冲转成列存容器（见 [`columnar`]），属性顺序变为列顺序

pub mod columnar;

use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::common::{BlobError, Result};

/// 可配置的编解码名称
pub const SUPPORTED_CODECS: [&str; 4] = ["jsonl", "lzma", "zstd", "columnar"];

const ZSTD_LEVEL: i32 = 3;
const LZMA_PRESET: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Codec {
    Jsonl,
    Lzma,
    #[default]
    Zstd,
    /// 解码后每条记录的属性按列的首次出现顺序排列，不保留原始写入顺序
    Columnar,
}

impl Codec {
    pub fn name(self) -> &'static str {
        match self {
            Self::Jsonl    => "jsonl",
            Self::Lzma     => "lzma",
            Self::Zstd     => "zstd",
            Self::Columnar => "columnar",
        }
    }

    /// 写入存储时附加的文件扩展名
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jsonl    => ".jsonl",
            Self::Lzma     => ".jsonl.lzma",
            Self::Zstd     => ".jsonl.zst",
            Self::Columnar => ".col",
        }
    }

    /// 根据 blob 名称的扩展名推断编解码；无法识别时返回 None
    pub fn for_blob_name(name: &str) -> Option<Self> {
        if name.ends_with(".zst") {
            Some(Self::Zstd)
        } else if name.ends_with(".lzma") || name.ends_with(".xz") {
            Some(Self::Lzma)
        } else if name.ends_with(".col") {
            Some(Self::Columnar)
        } else if name.ends_with(".jsonl") {
            Some(Self::Jsonl)
        } else {
            None
        }
    }

    pub fn encode(self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Jsonl    => Ok(data.to_vec()),
            Self::Lzma     => {
                let mut encoder = xz2::write::XzEncoder::new(Vec::new(), LZMA_PRESET);
                encoder.write_all(data).map_err(codec_err)?;
                encoder.finish().map_err(codec_err)
            }
            Self::Zstd     => zstd::encode_all(data, ZSTD_LEVEL).map_err(codec_err),
            Self::Columnar => columnar::encode(data),
        }
    }

    pub fn decode(self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Jsonl    => Ok(data.to_vec()),
            Self::Lzma     => {
                let mut out = Vec::new();
                xz2::read::XzDecoder::new(data).read_to_end(&mut out).map_err(codec_err)?;
                Ok(out)
            }
            Self::Zstd     => zstd::decode_all(data).map_err(codec_err),
            Self::Columnar => columnar::decode(data),
        }
    }
}

impl FromStr for Codec {
    type Err = BlobError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "jsonl"               => Ok(Self::Jsonl),
            "lzma"                => Ok(Self::Lzma),
            "zstd"                => Ok(Self::Zstd),
            "columnar" | "parquet" => Ok(Self::Columnar),
            _                     => Err(BlobError::UnknownCodec(s.into())),
        }
    }
}

impl TryFrom<String> for Codec {
    type Error = BlobError;
    fn try_from(s: String) -> Result<Self> { s.parse() }
}

impl From<Codec> for String {
    fn from(c: Codec) -> Self { c.name().into() }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn codec_err(e: std::io::Error) -> BlobError {
    BlobError::Codec(e.to_string())
}

// ── LZ4 块压缩（列存 chunk 使用）────────────────────────────────────────────

pub(crate) fn lz4_compress(data: &[u8]) -> Result<Vec<u8>> {
    lz4::block::compress(data, None, false)
        .map_err(|e| BlobError::Codec(e.to_string()))
}

pub(crate) fn lz4_decompress(data: &[u8], uncompressed_len: usize) -> Result<Vec<u8>> {
    let len = i32::try_from(uncompressed_len)
        .map_err(|_| BlobError::Codec(format!("chunk too large: {uncompressed_len} bytes")))?;
    lz4::block::decompress(data, Some(len))
        .map_err(|e| BlobError::Codec(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINES: &[u8] = b"{\"a\":1}\n{\"a\":2,\"b\":\"x\"}\n";

    #[test]
    fn every_codec_restores_the_line_stream() {
        for name in SUPPORTED_CODECS {
            let codec: Codec = name.parse().unwrap();
            let encoded = codec.encode(LINES).unwrap();
            assert_eq!(codec.decode(&encoded).unwrap(), LINES, "codec {name}");
        }
    }

    #[test]
    fn unknown_codec_is_rejected_up_front() {
        let err = "snappy".parse::<Codec>().unwrap_err();
        assert!(matches!(err, BlobError::UnknownCodec(ref n) if n == "snappy"));
        assert!(err.to_string().contains("zstd"));
        assert!(serde_json::from_str::<Codec>("\"snappy\"").is_err());
    }

    #[test]
    fn codec_is_inferred_from_blob_extension() {
        for codec in [Codec::Jsonl, Codec::Lzma, Codec::Zstd, Codec::Columnar] {
            let name = format!("data/2021/01/01/01F8MECHZX3TBDSZ7XRADM79XV{}", codec.extension());
            assert_eq!(Codec::for_blob_name(&name), Some(codec));
        }
        assert_eq!(Codec::for_blob_name("data/_SYS.manifest"), None);
    }
}
