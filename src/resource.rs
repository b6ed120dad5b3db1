//! Generic resource table
//!
//! Maps a resource id to one or more typed entries. An id may carry several
//! entries of different types; freeing the id removes all of them and hands
//! them back to the caller, which notifies the owner of each type. The order
//! of the returned entries is unspecified and owners must not rely on it.

use std::collections::HashMap;

use crate::wire::Xid;

/// A registered resource type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceType(u16);

/// One typed entry attached to a resource id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resource {
    pub rtype: ResourceType,
    /// Owner data; for double-buffer entries, the window the buffer belongs to
    pub value: Xid,
}

/// An entry removed from the table, to be delivered to its type's owner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreedResource {
    pub id: Xid,
    pub rtype: ResourceType,
    pub value: Xid,
}

pub struct ResourceTable {
    type_names: Vec<&'static str>,
    entries: HashMap<Xid, Vec<Resource>>,
    count: usize,
    /// Maximum number of live entries, if bounded
    limit: Option<usize>,
}

impl ResourceTable {
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            type_names: Vec::new(),
            entries: HashMap::new(),
            count: 0,
            limit,
        }
    }

    pub fn create_type(&mut self, name: &'static str) -> ResourceType {
        self.type_names.push(name);
        ResourceType(self.type_names.len() as u16)
    }

    pub fn type_name(&self, rtype: ResourceType) -> &'static str {
        self.type_names
            .get(rtype.0 as usize - 1)
            .copied()
            .unwrap_or("unknown")
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Attach a typed entry to `id`.
    ///
    /// Fails when the table is full or `id` already carries this type.
    pub fn add(&mut self, id: Xid, rtype: ResourceType, value: Xid) -> bool {
        if self.limit.is_some_and(|limit| self.count >= limit) {
            log::warn!("resource table full, cannot add {:#x} ({})", id, self.type_name(rtype));
            return false;
        }
        let entries = self.entries.entry(id).or_default();
        if entries.iter().any(|r| r.rtype == rtype) {
            return false;
        }
        entries.push(Resource { rtype, value });
        self.count += 1;
        true
    }

    pub fn contains(&self, id: Xid) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn lookup(&self, id: Xid, rtype: ResourceType) -> Option<Xid> {
        self.entries
            .get(&id)?
            .iter()
            .find(|r| r.rtype == rtype)
            .map(|r| r.value)
    }

    /// Remove every entry attached to `id`
    pub fn free(&mut self, id: Xid) -> Vec<FreedResource> {
        let Some(entries) = self.entries.remove(&id) else {
            return Vec::new();
        };
        self.count -= entries.len();
        // newest first, so owners see the most recent registration first
        entries
            .into_iter()
            .rev()
            .map(|r| FreedResource {
                id,
                rtype: r.rtype,
                value: r.value,
            })
            .collect()
    }

    /// Remove only the entry of `rtype` attached to `id`
    pub fn free_type(&mut self, id: Xid, rtype: ResourceType) -> Option<FreedResource> {
        let entries = self.entries.get_mut(&id)?;
        let pos = entries.iter().position(|r| r.rtype == rtype)?;
        let r = entries.remove(pos);
        if entries.is_empty() {
            self.entries.remove(&id);
        }
        self.count -= 1;
        Some(FreedResource {
            id,
            rtype: r.rtype,
            value: r.value,
        })
    }

    /// Remove every entry whose id satisfies `pred`, e.g. all ids of a client
    pub fn free_matching(&mut self, pred: impl Fn(Xid) -> bool) -> Vec<FreedResource> {
        let ids: Vec<Xid> = self.entries.keys().copied().filter(|&id| pred(id)).collect();
        ids.into_iter().flat_map(|id| self.free(id)).collect()
    }
}
