// Copyright 2026 the Stroma Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! NumPy `.npy` parsing for segmentation embedding tensors.
//!
//! The interactive decoder consumes one precomputed embedding per image:
//! little-endian `f32`, shape exactly `[1, 256, 64, 64]`. Anything else is
//! an error — wrong shapes would silently produce garbage masks.

use crate::FormatError;

/// Required embedding tensor shape.
pub const EMBEDDING_SHAPE: [usize; 4] = [1, 256, 64, 64];

const MAGIC: &[u8; 6] = b"\x93NUMPY";

/// A validated embedding tensor.
#[derive(Clone, Debug, PartialEq)]
pub struct Embedding {
    /// Row-major tensor data.
    pub data: Vec<f32>,
    /// Always [`EMBEDDING_SHAPE`].
    pub shape: [usize; 4],
}

/// Parses a `.npy` file into an [`Embedding`].
///
/// Supports format versions 1.0 and 2.0, requires C order, `<f4` dtype,
/// and the exact [`EMBEDDING_SHAPE`].
pub fn parse_embedding(bytes: &[u8]) -> Result<Embedding, FormatError> {
    let (header, data) = split_header(bytes)?;

    let descr = header_field(&header, "descr")
        .ok_or_else(|| FormatError::BadHeader("missing descr".to_owned()))?;
    if descr != "<f4" {
        return Err(FormatError::BadTensor {
            expected: EMBEDDING_SHAPE,
            got: format!("dtype {descr}"),
        });
    }
    if header.contains("'fortran_order': True") {
        return Err(FormatError::BadHeader("fortran order unsupported".to_owned()));
    }

    let shape = parse_shape(&header)?;
    if shape != EMBEDDING_SHAPE {
        return Err(FormatError::BadTensor {
            expected: EMBEDDING_SHAPE,
            got: format!("shape {shape:?}"),
        });
    }

    let count: usize = shape.iter().product();
    if data.len() != count * 4 {
        return Err(FormatError::BadTensor {
            expected: EMBEDDING_SHAPE,
            got: format!("{} data bytes", data.len()),
        });
    }
    let data = data
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    Ok(Embedding { data, shape })
}

/// Splits the file into its ASCII header dict and the raw data bytes.
fn split_header(bytes: &[u8]) -> Result<(String, &[u8]), FormatError> {
    if bytes.len() < 10 || &bytes[..6] != MAGIC {
        return Err(FormatError::BadHeader("not an npy file".to_owned()));
    }
    let major = bytes[6];
    let (header_len, header_start) = match major {
        1 => {
            let len = u16::from_le_bytes([bytes[8], bytes[9]]);
            (usize::from(len), 10)
        }
        2 => {
            if bytes.len() < 12 {
                return Err(FormatError::BadHeader("truncated v2 header".to_owned()));
            }
            let len = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
            (
                usize::try_from(len)
                    .map_err(|_| FormatError::BadHeader("oversized header".to_owned()))?,
                12,
            )
        }
        other => {
            return Err(FormatError::BadHeader(format!(
                "unsupported npy version {other}"
            )));
        }
    };
    let header_end = header_start + header_len;
    if bytes.len() < header_end {
        return Err(FormatError::BadHeader("truncated header".to_owned()));
    }
    let header = core::str::from_utf8(&bytes[header_start..header_end])
        .map_err(|_| FormatError::BadHeader("non-ascii header".to_owned()))?
        .to_owned();
    Ok((header, &bytes[header_end..]))
}

/// Extracts a quoted header dict value, e.g. `'descr': '<f4'`.
fn header_field(header: &str, key: &str) -> Option<String> {
    let pattern = format!("'{key}':");
    let rest = &header[header.find(&pattern)? + pattern.len()..];
    let open = rest.find('\'')?;
    let rest = &rest[open + 1..];
    let close = rest.find('\'')?;
    Some(rest[..close].to_owned())
}

/// Extracts the shape tuple from the header dict.
fn parse_shape(header: &str) -> Result<[usize; 4], FormatError> {
    let start = header
        .find("'shape':")
        .ok_or_else(|| FormatError::BadHeader("missing shape".to_owned()))?;
    let rest = &header[start..];
    let open = rest
        .find('(')
        .ok_or_else(|| FormatError::BadHeader("missing shape tuple".to_owned()))?;
    let close = rest[open..]
        .find(')')
        .ok_or_else(|| FormatError::BadHeader("unterminated shape tuple".to_owned()))?
        + open;
    let dims: Vec<usize> = rest[open + 1..close]
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .map_err(|_| FormatError::BadHeader(format!("bad dimension {s:?}")))
        })
        .collect::<Result<_, _>>()?;
    match dims.as_slice() {
        &[a, b, c, d] => Ok([a, b, c, d]),
        other => Err(FormatError::BadTensor {
            expected: EMBEDDING_SHAPE,
            got: format!("{} dimensions", other.len()),
        }),
    }
}
