use std::collections::HashMap;

use crate::pbf::osmformat;

/// Counts string occurrences for one block. Indices only exist once
/// [`StringTableBuilder::finalize`] has produced a [`StringTable`].
#[derive(Debug, Default)]
pub struct StringTableBuilder {
    counts: HashMap<String, u32>,
}

impl StringTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, s: &str) {
        match self.counts.get_mut(s) {
            Some(count) => *count += 1,
            None => {
                self.counts.insert(s.to_owned(), 1);
            },
        }
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Assigns indices by descending frequency, ties broken by byte order.
    /// Index 0 is never handed out.
    pub fn finalize(self) -> StringTable {
        let mut entries: Vec<(String, u32)> = self.counts.into_iter().collect();
        entries.sort_unstable_by(|(a, a_count), (b, b_count)| b_count.cmp(a_count).then_with(|| a.cmp(b)));

        let mut indices = HashMap::with_capacity(entries.len());
        let mut strings = Vec::with_capacity(entries.len());
        for (position, (s, _)) in entries.into_iter().enumerate() {
            indices.insert(s.clone(), position as u32 + 1);
            strings.push(s);
        }
        StringTable { strings, indices }
    }
}

/// Frozen, read-only string table of one block.
#[derive(Debug)]
pub struct StringTable {
    strings: Vec<String>,
    indices: HashMap<String, u32>,
}

impl StringTable {
    /// Panics if `s` was not interned for this block.
    pub fn index(&self, s: &str) -> u32 {
        match self.indices.get(s) {
            Some(index) => *index,
            None => panic!("string {:?} was never interned for this block", s),
        }
    }

    /// Same as [`StringTable::index`], for the signed columns of the format.
    pub fn signed_index(&self, s: &str) -> i32 {
        self.index(s) as i32
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn to_message(&self) -> osmformat::StringTable {
        let mut s = Vec::with_capacity(self.strings.len() + 1);
        s.push(Vec::new());
        s.extend(self.strings.iter().map(|string| string.as_bytes().to_vec()));
        osmformat::StringTable { s }
    }
}
