//! Forward cursor over a table built by [`super::TableWriter`].

use std::sync::Arc;

use crate::error::{Error, Result};

use super::{BINARY_CHOP_KEY_SIZE, MAX_KEY_LEN, read_vint};

/// Cursor over a sorted, prefix-compressed key/value table.
///
/// After `rewind` the cursor sits before the first entry; `next` positions
/// it on each entry in turn. `find` seeks via the root index, then steps
/// forward to the requested key or the first greater one. Value bytes stay
/// unread until `read_tag` consumes them.
pub struct TableCursor {
    data: Arc<Vec<u8>>,
    /// Start of the index region (the stored pivot).
    root: usize,
    /// End of the index region (exclusive).
    index_end: usize,
    pos: usize,
    current_key: Vec<u8>,
    last_key: Vec<u8>,
    /// Bytes of value data at `pos` not yet consumed.
    val_size: usize,
    compressed: bool,
    at_end: bool,
    current_tag: Vec<u8>,
}

impl TableCursor {
    /// Open a cursor over complete table bytes.
    pub fn open(data: impl Into<Arc<Vec<u8>>>) -> Result<Self> {
        let data = data.into();
        if data.len() < 5 {
            return Err(Error::Corruption("table too small".into()));
        }
        let index_end = data.len() - 4;
        let root = u32::from_be_bytes(data[index_end..].try_into().unwrap()) as usize;
        if root >= index_end {
            return Err(Error::Corruption("impossible root offset".into()));
        }
        Ok(Self {
            data,
            root,
            index_end,
            pos: 0,
            current_key: Vec::new(),
            last_key: Vec::new(),
            val_size: 0,
            compressed: false,
            at_end: false,
            current_tag: Vec::new(),
        })
    }

    /// Key of the entry the cursor is positioned on.
    pub fn current_key(&self) -> &[u8] {
        &self.current_key
    }

    /// Tag bytes most recently consumed by `read_tag`.
    pub fn current_tag(&self) -> &[u8] {
        &self.current_tag
    }

    pub fn at_end(&self) -> bool {
        self.at_end
    }

    /// Reposition before the first entry.
    pub fn rewind(&mut self) {
        self.pos = 0;
        self.current_key.clear();
        self.last_key.clear();
        self.val_size = 0;
        self.compressed = false;
        self.at_end = false;
    }

    fn read_byte(&mut self) -> Result<u8> {
        if self.pos >= self.root {
            return Err(Error::Corruption("unexpected EOF reading key".into()));
        }
        let b = self.data[self.pos];
        self.pos += 1;
        Ok(b)
    }

    fn read_index_byte(&mut self) -> Result<u8> {
        if self.pos >= self.index_end {
            return Err(Error::Corruption("unexpected EOF in index".into()));
        }
        let b = self.data[self.pos];
        self.pos += 1;
        Ok(b)
    }

    /// Parse the value-size varint of the entry whose key bytes end at
    /// `pos`, leaving `pos` on the value data.
    fn read_val_info(&mut self) -> Result<()> {
        let v = read_vint(&self.data, &mut self.pos, self.root)?;
        self.compressed = v & 1 != 0;
        self.val_size = (v >> 1) as usize;
        if self.pos + self.val_size > self.root {
            return Err(Error::Corruption("value data overruns table".into()));
        }
        self.at_end = false;
        Ok(())
    }

    /// Step to the next entry. Returns false when the data region is
    /// exhausted.
    pub fn next(&mut self) -> Result<bool> {
        if self.at_end {
            return Ok(false);
        }

        // Skip value data we've not looked at.
        self.pos += self.val_size;
        self.val_size = 0;

        if self.pos >= self.root {
            self.at_end = true;
            return Ok(false);
        }

        let mut ch = self.read_byte()?;
        let mut reuse = 0usize;
        if !self.last_key.is_empty() {
            reuse = ch as usize;
            ch = self.read_byte()?;
        }
        if reuse > self.last_key.len() {
            return Err(Error::Corruption("impossible key reuse length".into()));
        }
        let key_size = ch as usize;
        if self.pos + key_size > self.root {
            return Err(Error::Corruption("key data overruns table".into()));
        }
        let mut key = Vec::with_capacity(reuse + key_size);
        key.extend_from_slice(&self.last_key[..reuse]);
        key.extend_from_slice(&self.data[self.pos..self.pos + key_size]);
        self.current_key = key;
        self.pos += key_size;
        self.last_key.clear();
        self.last_key.extend_from_slice(&self.current_key);

        self.read_val_info()?;
        Ok(true)
    }

    /// Read the current entry's tag, decompressing unless asked to keep it
    /// raw. Returns whether the held tag is still compressed.
    pub fn read_tag(&mut self, keep_compressed: bool) -> Result<bool> {
        if self.val_size > 0 {
            self.current_tag.clear();
            self.current_tag
                .extend_from_slice(&self.data[self.pos..self.pos + self.val_size]);
            self.pos += self.val_size;
            self.val_size = 0;
        }
        if !keep_compressed && self.compressed {
            self.current_tag = zstd::decode_all(self.current_tag.as_slice())
                .map_err(|e| Error::Corruption(format!("tag decompression failed: {}", e)))?;
            self.compressed = false;
        }
        Ok(self.compressed)
    }

    /// Position on `key` if present, else on the smallest greater key.
    ///
    /// With `greater_than` set, an exact match is stepped over so the cursor
    /// lands on the smallest key strictly greater than `key`. Returns true
    /// only when positioned on an exact match.
    pub fn find(&mut self, key: &[u8], greater_than: bool) -> Result<bool> {
        if key.is_empty() {
            return Err(Error::InvalidArgument("empty search key".into()));
        }
        let exact = self.do_find(key)?;
        if greater_than && exact {
            self.next()?;
            return Ok(false);
        }
        Ok(exact)
    }

    fn do_find(&mut self, key: &[u8]) -> Result<bool> {
        let mut use_index = true;
        if !self.at_end && !self.last_key.is_empty() && self.last_key[0] == key[0] {
            match self.last_key.as_slice().cmp(key) {
                std::cmp::Ordering::Equal => {
                    self.current_key.clear();
                    self.current_key.extend_from_slice(&self.last_key);
                    return Ok(true);
                }
                std::cmp::Ordering::Less => {
                    // Going forwards to a key with the same first byte; the
                    // index can't beat stepping from here.
                    use_index = false;
                }
                std::cmp::Ordering::Greater => {}
            }
        }

        if use_index {
            self.pos = self.root;
            let index_type = self.read_index_byte()?;
            match index_type {
                0x00 => {
                    let base = self.read_index_byte()?;
                    let range = self.read_index_byte()?;
                    if key[0] < base {
                        self.pos = 0;
                        self.last_key.clear();
                    } else {
                        let first = key[0] - base;
                        if first > range {
                            self.at_end = true;
                            return Ok(false);
                        }
                        self.pos += first as usize * 4;
                        let jump = self.read_index_u32()? as usize;
                        if jump > self.root {
                            return Err(Error::Corruption("impossible jump offset".into()));
                        }
                        self.pos = jump;
                        // The jump point starts a fresh key, so decode it
                        // against an empty last_key.
                        self.last_key.clear();
                    }
                }
                0x01 => {
                    let count = self.read_index_u32()? as usize;
                    if count == 0 {
                        self.at_end = true;
                        return Ok(false);
                    }
                    let base = self.pos;
                    let record = BINARY_CHOP_KEY_SIZE + 4;
                    if base + count * record > self.index_end {
                        return Err(Error::Corruption("binary-chop index truncated".into()));
                    }
                    let key_prefix = &key[..key.len().min(BINARY_CHOP_KEY_SIZE)];
                    let mut i = 0usize;
                    let mut j = count;
                    while j - i > 1 {
                        let k = i + (j - i) / 2;
                        let at = base + k * record;
                        let kkey = trim_nuls(&self.data[at..at + BINARY_CHOP_KEY_SIZE]);
                        match key_prefix.cmp(kkey) {
                            std::cmp::Ordering::Less => j = k,
                            std::cmp::Ordering::Equal => {
                                i = k;
                                break;
                            }
                            std::cmp::Ordering::Greater => i = k,
                        }
                    }
                    let at = base + i * record;
                    let kkey = trim_nuls(&self.data[at..at + BINARY_CHOP_KEY_SIZE]).to_vec();
                    self.pos = at + BINARY_CHOP_KEY_SIZE;
                    let jump = self.read_index_u32()? as usize;
                    if jump > self.root {
                        return Err(Error::Corruption("impossible jump offset".into()));
                    }
                    self.pos = jump;
                    // The jump point is the first key with prefix kkey, so
                    // suffix decoding works seeded with it; jumping to the
                    // table start needs an empty last_key instead.
                    self.last_key.clear();
                    if jump != 0 {
                        self.last_key.extend_from_slice(&kkey);
                    }
                }
                0x02 => {
                    let mut index_key: Vec<u8> = Vec::new();
                    let mut prev_index_key: Vec<u8> = Vec::new();
                    let mut ptr = 0usize;
                    let mut exact_at_ptr = false;
                    while self.pos < self.index_end {
                        let reuse = self.read_index_byte()? as usize;
                        let len = self.read_index_byte()? as usize;
                        if reuse > index_key.len() || self.pos + len > self.index_end {
                            return Err(Error::Corruption("skiplist index corrupt".into()));
                        }
                        index_key.truncate(reuse);
                        index_key.extend_from_slice(&self.data[self.pos..self.pos + len]);
                        self.pos += len;
                        let cmp0 = index_key.as_slice().cmp(key);
                        if cmp0 == std::cmp::Ordering::Greater {
                            index_key = prev_index_key;
                            break;
                        }
                        ptr = read_vint(&self.data, &mut self.pos, self.index_end)? as usize;
                        if cmp0 == std::cmp::Ordering::Equal {
                            exact_at_ptr = true;
                            break;
                        }
                        prev_index_key = index_key.clone();
                    }
                    if ptr > self.root {
                        return Err(Error::Corruption("impossible skiplist pointer".into()));
                    }
                    self.pos = ptr;
                    if ptr != 0 {
                        // ptr lands just past the entry's key bytes with the
                        // index key as the full decoded key.
                        self.last_key = index_key.clone();
                        self.current_key = index_key;
                        self.read_val_info()?;
                        if exact_at_ptr {
                            return Ok(true);
                        }
                        self.pos += self.val_size;
                        self.val_size = 0;
                    } else {
                        self.last_key.clear();
                        self.current_key.clear();
                    }
                }
                _ => {
                    return Err(Error::Corruption(format!(
                        "unknown index type {:#04x}",
                        index_type
                    )));
                }
            }
            self.at_end = false;
            self.val_size = 0;
        }

        while self.next()? {
            match self.current_key.as_slice().cmp(key) {
                std::cmp::Ordering::Equal => return Ok(true),
                std::cmp::Ordering::Greater => break,
                std::cmp::Ordering::Less => continue,
            }
        }
        Ok(false)
    }

    /// Step to the previous entry.
    ///
    /// There are no backward links, so this rescans forward from the start
    /// capturing the last position before the current key.
    /// TODO: drive this from the root index instead of rescanning.
    pub fn prev(&mut self) -> Result<bool> {
        let target: Vec<u8>;
        if self.at_end {
            // A key greater than any possible key: longer than the longest
            // permitted and all high bytes.
            target = vec![0xff; MAX_KEY_LEN + 1];
        } else {
            if self.current_key.is_empty() {
                return Ok(false);
            }
            target = self.current_key.clone();
        }

        self.rewind();

        let mut snap_pos;
        let mut snap_key: Vec<u8>;
        let mut snap_val;
        let mut snap_compressed;
        loop {
            snap_pos = self.pos;
            snap_key = self.current_key.clone();
            snap_val = self.val_size;
            snap_compressed = self.compressed;
            if !self.next()? || self.current_key >= target {
                break;
            }
        }

        self.at_end = false;
        self.current_key = snap_key.clone();
        self.last_key = snap_key;
        self.val_size = snap_val;
        self.compressed = snap_compressed;
        self.pos = snap_pos;
        Ok(true)
    }

    fn read_index_u32(&mut self) -> Result<u32> {
        if self.pos + 4 > self.index_end {
            return Err(Error::Corruption("unexpected EOF in index".into()));
        }
        let v = u32::from_be_bytes(self.data[self.pos..self.pos + 4].try_into().unwrap());
        self.pos += 4;
        Ok(v)
    }
}

fn trim_nuls(key: &[u8]) -> &[u8] {
    let mut len = key.len();
    while len > 0 && key[len - 1] == 0 {
        len -= 1;
    }
    &key[..len]
}
