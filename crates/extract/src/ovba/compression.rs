//! MS-OVBA CompressedContainer 编解码 (MS-OVBA 2.4.1)

use super::{OvbaError, Result};

const CONTAINER_SIGNATURE: u8 = 0x01;
const CHUNK_SIGNATURE_BITS: u16 = 0b011;
const COMPRESSED_FLAG: u16 = 0x8000;

/// 纯字面量编码时每块的原始字节数
///
/// 每 8 个字面量多 1 个标志字节，3584 字节编码后为 4032 字节，不超过块上限 4096。
const LITERAL_CHUNK_LEN: usize = 3584;

/// 解压 CompressedContainer
///
/// 用于 `VBA/dir` 流和模块流中 `TextOffset` 之后的源码部分。
pub fn decompress_container(input: &[u8]) -> Result<Vec<u8>> {
    let (&signature, mut rest) = input.split_first().ok_or(OvbaError::EmptyContainer)?;
    if signature != CONTAINER_SIGNATURE {
        return Err(OvbaError::BadContainerSignature(signature));
    }

    let mut out = Vec::with_capacity(input.len() * 2);
    while !rest.is_empty() {
        let header = match rest {
            [lo, hi, ..] => u16::from_le_bytes([*lo, *hi]),
            _ => return Err(OvbaError::Truncated("chunk header")),
        };
        if (header >> 12) & 0b111 != CHUNK_SIGNATURE_BITS {
            return Err(OvbaError::BadChunkHeader(header));
        }

        let data_len = usize::from(header & 0x0FFF) + 1;
        let data = rest
            .get(2..2 + data_len)
            .ok_or(OvbaError::Truncated("chunk data"))?;
        rest = &rest[2 + data_len..];

        if header & COMPRESSED_FLAG == 0 {
            out.extend_from_slice(data);
        } else {
            decompress_chunk(data, &mut out)?;
        }
    }

    Ok(out)
}

fn decompress_chunk(chunk: &[u8], out: &mut Vec<u8>) -> Result<()> {
    let chunk_start = out.len();
    let mut pos = 0usize;

    while pos < chunk.len() {
        let flags = chunk[pos];
        pos += 1;

        for bit in 0..8 {
            if pos >= chunk.len() {
                break;
            }

            if flags & (1 << bit) == 0 {
                out.push(chunk[pos]);
                pos += 1;
                continue;
            }

            let token = match chunk.get(pos..pos + 2) {
                Some([lo, hi]) => u16::from_le_bytes([*lo, *hi]),
                _ => return Err(OvbaError::Truncated("copy token")),
            };
            pos += 2;

            let produced = out.len() - chunk_start;
            let offset_bits = copy_token_offset_bits(produced);
            let length_bits = 16 - offset_bits;
            let length = usize::from(token & ((1u16 << length_bits) - 1)) + 3;
            let offset = usize::from(token >> length_bits) + 1;

            if offset > produced {
                return Err(OvbaError::BadCopyToken { offset, produced });
            }

            // 源区间可能与写入区间重叠，逐字节复制
            for _ in 0..length {
                let byte = out[out.len() - offset];
                out.push(byte);
            }
        }
    }

    Ok(())
}

/// 复制令牌中 offset 占用的位数: max(ceil(log2(produced)), 4)，上限 12
fn copy_token_offset_bits(produced: usize) -> u32 {
    let mut bits = 4;
    while bits < 12 && (1usize << bits) < produced {
        bits += 1;
    }
    bits
}

/// 生成 CompressedContainer
///
/// 只输出字面量令牌，结果合法但不做压缩；用于构造测试夹具和导出。
pub fn compress_container(data: &[u8]) -> Vec<u8> {
    let mut out = vec![CONTAINER_SIGNATURE];

    for piece in data.chunks(LITERAL_CHUNK_LEN) {
        let mut body = Vec::with_capacity(piece.len() + piece.len() / 8 + 1);
        for group in piece.chunks(8) {
            body.push(0x00);
            body.extend_from_slice(group);
        }

        let size_field = (body.len() - 1) as u16;
        let header = COMPRESSED_FLAG | (CHUNK_SIGNATURE_BITS << 12) | size_field;
        out.extend_from_slice(&header.to_le_bytes());
        out.extend_from_slice(&body);
    }

    out
}
