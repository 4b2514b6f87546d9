// core/string_vec.rs
// Compact string vectors for exec argv/env capture
// All entries share one contiguous buffer; an end-offset table delimits them

use crate::error::StringVecError;
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};

/// Counted list of strings packed into a single buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompactStrings {
    data: String,
    ends: Vec<usize>,
}

impl CompactStrings {
    /// Pack every entry.
    pub fn from_entries<S: AsRef<str>>(entries: &[S]) -> Result<Self, StringVecError> {
        Self::pack(entries.iter().map(|entry| entry.as_ref()))
    }

    /// Pack only the entries starting with `prefix`.
    ///
    /// Returns `Ok(None)` when no entry matches, so an environment without
    /// e.g. any `DYLD_` variable yields no vector at all.
    pub fn from_entries_with_prefix<S: AsRef<str>>(
        entries: &[S],
        prefix: &str,
    ) -> Result<Option<Self>, StringVecError> {
        let matching = entries
            .iter()
            .map(|entry| entry.as_ref())
            .filter(|entry: &&str| entry.starts_with(prefix));
        let packed = Self::pack(matching)?;
        Ok(if packed.is_empty() { None } else { Some(packed) })
    }

    fn pack<'a, I>(entries: I) -> Result<Self, StringVecError>
    where
        I: Iterator<Item = &'a str> + Clone,
    {
        let (count, bytes) = entries
            .clone()
            .fold((0usize, 0usize), |(n, b), s| (n + 1, b + s.len()));

        let oom = || StringVecError::OutOfMemory {
            entries: count,
            bytes,
        };
        let mut data = String::new();
        data.try_reserve_exact(bytes).map_err(|_| oom())?;
        let mut ends = Vec::new();
        ends.try_reserve_exact(count).map_err(|_| oom())?;

        for entry in entries {
            data.push_str(entry);
            ends.push(data.len());
        }
        Ok(Self { data, ends })
    }

    pub fn len(&self) -> usize {
        self.ends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ends.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        let end = *self.ends.get(index)?;
        let start = match index {
            0 => 0,
            i => self.ends[i - 1],
        };
        Some(&self.data[start..end])
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i))
    }
}

impl Serialize for CompactStrings {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for entry in self.iter() {
            seq.serialize_element(entry)?;
        }
        seq.end()
    }
}
