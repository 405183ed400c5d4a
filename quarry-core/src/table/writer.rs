//! Builds the on-disk table format consumed by [`TableCursor`].

use byteorder::{BigEndian, WriteBytesExt};

use crate::error::{Error, Result};

use super::{
    BINARY_CHOP_KEY_SIZE, COMPRESS_MIN, MAX_KEY_LEN, SKIP_INTERVAL, common_prefix_len, write_vint,
};

/// Which root index layout a table is written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableIndexKind {
    /// `0x00`: jump table over the first key byte.
    DenseFirstByte,
    /// `0x01`: binary chop over fixed-size key prefixes.
    BinaryChop,
    /// `0x02`: prefix-compressed skiplist of every Nth key.
    Skiplist,
}

impl TableIndexKind {
    fn tag(self) -> u8 {
        match self {
            TableIndexKind::DenseFirstByte => 0x00,
            TableIndexKind::BinaryChop => 0x01,
            TableIndexKind::Skiplist => 0x02,
        }
    }
}

/// Streaming writer for sorted (key, tag) pairs.
///
/// Keys must be non-empty, at most [`MAX_KEY_LEN`] bytes and strictly
/// increasing. Tags beyond a size threshold are zstd-compressed when that
/// actually shrinks them; the compressed bit travels in the value-size
/// varint.
pub struct TableWriter {
    kind: TableIndexKind,
    data: Vec<u8>,
    prev_key: Vec<u8>,
    num_entries: u64,
    // 0x00: (first byte, jump) at each first-byte boundary.
    first_byte_jumps: Vec<(u8, u32)>,
    // 0x01: (padded prefix, jump) at each prefix boundary.
    chop_points: Vec<([u8; BINARY_CHOP_KEY_SIZE], u32)>,
    // 0x02: (full key, offset just past the key bytes) for every Nth entry.
    skip_points: Vec<(Vec<u8>, u64)>,
    compress_min: usize,
}

impl TableWriter {
    pub fn new(kind: TableIndexKind) -> Self {
        Self {
            kind,
            data: Vec::new(),
            prev_key: Vec::new(),
            num_entries: 0,
            first_byte_jumps: Vec::new(),
            chop_points: Vec::new(),
            skip_points: Vec::new(),
            compress_min: COMPRESS_MIN,
        }
    }

    pub fn num_entries(&self) -> u64 {
        self.num_entries
    }

    pub fn insert(&mut self, key: &[u8], tag: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(Error::InvalidArgument("empty table key".into()));
        }
        if key.len() > MAX_KEY_LEN {
            return Err(Error::InvalidArgument(format!(
                "table key longer than {} bytes",
                MAX_KEY_LEN
            )));
        }
        if self.num_entries > 0 && key <= self.prev_key.as_slice() {
            return Err(Error::InvalidArgument(
                "table keys must be strictly increasing".into(),
            ));
        }
        if self.kind == TableIndexKind::BinaryChop && key.contains(&0) {
            // The chop index pads its fixed prefixes with NUL, so NUL bytes
            // inside keys would be ambiguous.
            return Err(Error::InvalidArgument(
                "binary-chop tables do not support NUL bytes in keys".into(),
            ));
        }

        let entry_offset = self.data.len();
        let first = self.num_entries == 0;
        let reuse = if first {
            0
        } else {
            common_prefix_len(&self.prev_key, key)
        };
        if !first {
            self.data.push(reuse as u8);
        }
        let suffix = &key[reuse..];
        self.data.push(suffix.len() as u8);
        self.data.extend_from_slice(suffix);
        let past_key = self.data.len() as u64;

        match self.kind {
            TableIndexKind::DenseFirstByte => {
                if first || key[0] != self.prev_key[0] {
                    // A first-byte boundary implies reuse == 0, so jumping to
                    // just past the reuse byte lands on the length byte and
                    // decodes the full key against an empty last_key.
                    let jump = if first { 0 } else { entry_offset as u32 + 1 };
                    self.first_byte_jumps.push((key[0], jump));
                }
            }
            TableIndexKind::BinaryChop => {
                let prefix = padded_prefix(key);
                if first || self.chop_points.last().map(|(p, _)| *p) != Some(prefix) {
                    self.chop_points.push((prefix, entry_offset as u32));
                }
            }
            TableIndexKind::Skiplist => {
                if self.num_entries > 0 && self.num_entries % SKIP_INTERVAL == 0 {
                    self.skip_points.push((key.to_vec(), past_key));
                }
            }
        }

        let mut compressed = false;
        let stored: Vec<u8>;
        if tag.len() >= self.compress_min {
            let packed = zstd::encode_all(tag, 3)?;
            if packed.len() < tag.len() {
                stored = packed;
                compressed = true;
            } else {
                stored = tag.to_vec();
            }
        } else {
            stored = tag.to_vec();
        }
        write_vint(&mut self.data, ((stored.len() as u64) << 1) | compressed as u64);
        self.data.extend_from_slice(&stored);

        self.prev_key.clear();
        self.prev_key.extend_from_slice(key);
        self.num_entries += 1;
        Ok(())
    }

    /// Append the root index and the stored root offset, returning the
    /// complete table bytes.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        let root = self.data.len() as u32;
        self.data.push(self.kind.tag());
        match self.kind {
            TableIndexKind::DenseFirstByte => {
                let (base, range) = match (self.first_byte_jumps.first(), self.first_byte_jumps.last())
                {
                    (Some(&(lo, _)), Some(&(hi, _))) => (lo, hi - lo),
                    _ => (0, 0),
                };
                self.data.push(base);
                self.data.push(range);
                for c in 0..=range {
                    // For byte values with no keys, point at the next
                    // populated boundary; stepping forward then finds the
                    // first key >= the target.
                    let jump = self
                        .first_byte_jumps
                        .iter()
                        .find(|&&(fb, _)| fb >= base + c)
                        .map(|&(_, j)| j)
                        .unwrap_or(root);
                    self.data.write_u32::<BigEndian>(jump)?;
                }
            }
            TableIndexKind::BinaryChop => {
                self.data
                    .write_u32::<BigEndian>(self.chop_points.len() as u32)?;
                for (prefix, jump) in &self.chop_points {
                    self.data.extend_from_slice(prefix);
                    self.data.write_u32::<BigEndian>(*jump)?;
                }
            }
            TableIndexKind::Skiplist => {
                let mut prev: Vec<u8> = Vec::new();
                for (key, ptr) in &self.skip_points {
                    let reuse = common_prefix_len(&prev, key);
                    self.data.push(reuse as u8);
                    self.data.push((key.len() - reuse) as u8);
                    self.data.extend_from_slice(&key[reuse..]);
                    write_vint(&mut self.data, *ptr);
                    prev = key.clone();
                }
            }
        }
        self.data.write_u32::<BigEndian>(root)?;
        Ok(self.data)
    }
}

fn padded_prefix(key: &[u8]) -> [u8; BINARY_CHOP_KEY_SIZE] {
    let mut prefix = [0u8; BINARY_CHOP_KEY_SIZE];
    let n = key.len().min(BINARY_CHOP_KEY_SIZE);
    prefix[..n].copy_from_slice(&key[..n]);
    prefix
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_unsorted_and_empty_keys() {
        let mut w = TableWriter::new(TableIndexKind::Skiplist);
        w.insert(b"b", b"1").unwrap();
        assert!(w.insert(b"a", b"2").is_err());
        assert!(w.insert(b"b", b"2").is_err());
        assert!(w.insert(b"", b"2").is_err());
    }

    #[test]
    fn test_rejects_nul_keys_for_binary_chop() {
        let mut w = TableWriter::new(TableIndexKind::BinaryChop);
        assert!(w.insert(b"a\0b", b"x").is_err());
        let mut w = TableWriter::new(TableIndexKind::Skiplist);
        assert!(w.insert(b"a\0b", b"x").is_ok());
    }

    #[test]
    fn test_empty_table_has_index_and_root() {
        for kind in [
            TableIndexKind::DenseFirstByte,
            TableIndexKind::BinaryChop,
            TableIndexKind::Skiplist,
        ] {
            let bytes = TableWriter::new(kind).finish().unwrap();
            assert!(bytes.len() >= 5);
            let root = u32::from_be_bytes(bytes[bytes.len() - 4..].try_into().unwrap());
            assert_eq!(root, 0);
            assert_eq!(bytes[0], kind.tag());
        }
    }
}
