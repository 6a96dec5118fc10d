//! In-memory view of committed store contents
//!
//! A `State` is rebuilt from the commit log on open and replaced wholesale
//! on every commit, so a `State` behind an `Arc` is an immutable snapshot.

use std::collections::btree_map;
use std::collections::BTreeMap;

use super::format::Op;

type Entries = BTreeMap<Vec<u8>, Vec<u8>>;

/// Buckets and their entries, ordered by name and key bytes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct State {
    buckets: BTreeMap<Vec<u8>, Entries>,
}

impl State {
    /// Apply one logged operation
    ///
    /// Fails only when the operation targets a bucket that does not exist,
    /// which a well-formed log never contains.
    pub fn apply(&mut self, op: &Op) -> Result<(), String> {
        match op {
            Op::CreateBucket { bucket } => {
                self.buckets.entry(bucket.clone()).or_default();
            }
            Op::Put { bucket, key, value } => {
                self.entries_mut(bucket)?.insert(key.clone(), value.clone());
            }
            Op::Delete { bucket, key } => {
                self.entries_mut(bucket)?.remove(key);
            }
        }
        Ok(())
    }

    pub fn has_bucket(&self, bucket: &[u8]) -> bool {
        self.buckets.contains_key(bucket)
    }

    pub fn bucket_names(&self) -> impl Iterator<Item = &[u8]> {
        self.buckets.keys().map(Vec::as_slice)
    }

    pub fn get(&self, bucket: &[u8], key: &[u8]) -> Option<Option<&[u8]>> {
        self.buckets
            .get(bucket)
            .map(|entries| entries.get(key).map(Vec::as_slice))
    }

    pub fn iter(&self, bucket: &[u8]) -> Option<Iter<'_>> {
        self.buckets.get(bucket).map(|entries| Iter {
            inner: entries.iter(),
        })
    }

    fn entries_mut(&mut self, bucket: &[u8]) -> Result<&mut Entries, String> {
        self.buckets.get_mut(bucket).ok_or_else(|| {
            format!(
                "operation on missing bucket '{}'",
                String::from_utf8_lossy(bucket)
            )
        })
    }
}

/// Ordered iterator over the entries of one bucket
#[derive(Debug, Clone)]
pub struct Iter<'a> {
    inner: btree_map::Iter<'a, Vec<u8>, Vec<u8>>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a [u8], &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|(key, value)| (key.as_slice(), value.as_slice()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
