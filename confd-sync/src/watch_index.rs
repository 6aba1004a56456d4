//! Address → watch group fan-out, built once at startup.

use std::collections::BTreeMap;

use confd_core::{address, config::ConfdConfig, WatchGroup};

/// Registry of watch groups and the addresses each one renders.
///
/// Group indices are positions in [`WatchIndex::groups`] and stay stable for
/// the process lifetime. The index is never mutated after [`WatchIndex::build`].
#[derive(Debug, Clone, Default)]
pub struct WatchIndex {
    groups: Vec<WatchGroup>,
    by_address: BTreeMap<String, Vec<usize>>,
}

impl WatchIndex {
    /// Build from `(group, keys)` pairs; each pair gets the next index.
    ///
    /// Keys are canonicalized (`testkey` → `default:testkey`). A group that
    /// lists the same key twice is indexed once under it.
    pub fn build<I, K>(specs: I) -> Self
    where
        I: IntoIterator<Item = (WatchGroup, K)>,
        K: IntoIterator,
        K::Item: AsRef<str>,
    {
        let mut index = WatchIndex::default();
        for (group, keys) in specs {
            let group_index = index.groups.len();
            index.groups.push(group);
            for key in keys {
                let indices = index
                    .by_address
                    .entry(address::canonical(key.as_ref()))
                    .or_default();
                if !indices.contains(&group_index) {
                    indices.push(group_index);
                }
            }
        }
        index
    }

    pub fn from_config(config: &ConfdConfig) -> Self {
        Self::build(config.watch_groups())
    }

    /// Group indices registered under `address`, in registration order.
    pub fn lookup(&self, address: &str) -> &[usize] {
        self.by_address
            .get(address)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn group(&self, index: usize) -> Option<&WatchGroup> {
        self.groups.get(index)
    }

    pub fn groups(&self) -> &[WatchGroup] {
        &self.groups
    }

    /// Every `(address, indices)` pair, sorted by address.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &[usize])> {
        self.by_address
            .iter()
            .map(|(addr, indices)| (addr.as_str(), indices.as_slice()))
    }

    pub fn all_indices(&self) -> std::ops::Range<usize> {
        0..self.groups.len()
    }

    pub fn address_count(&self) -> usize {
        self.by_address.len()
    }
}
