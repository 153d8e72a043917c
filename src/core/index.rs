//! Keyed index shared by the CVar and command registries.
//!
//! Entries live in a slab so handles stay stable across unrelated removals.
//! Exact lookup goes through a case-folded map; a singly linked insertion
//! chain preserves a deterministic traversal order (most recently inserted
//! first), which is what enumeration and the prefix/flag scans walk.

use std::borrow::Cow;
use std::collections::HashMap;

/// Name comparison policy, fixed per index at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasePolicy {
    /// Compare names byte-for-byte.
    Sensitive,
    /// Fold ASCII case before comparing.
    Insensitive,
}

impl CasePolicy {
    /// Normalize a key under this policy.
    pub fn fold<'a>(self, s: &'a str) -> Cow<'a, str> {
        match self {
            CasePolicy::Sensitive => Cow::Borrowed(s),
            CasePolicy::Insensitive => Cow::Owned(s.to_ascii_lowercase()),
        }
    }

    /// Equality under this policy.
    pub fn eq(self, a: &str, b: &str) -> bool {
        match self {
            CasePolicy::Sensitive => a == b,
            CasePolicy::Insensitive => a.eq_ignore_ascii_case(b),
        }
    }

    /// Ordering under this policy, for alphabetical match output.
    pub fn cmp(self, a: &str, b: &str) -> std::cmp::Ordering {
        match self {
            CasePolicy::Sensitive => a.cmp(b),
            CasePolicy::Insensitive => a
                .bytes()
                .map(|b| b.to_ascii_lowercase())
                .cmp(b.bytes().map(|b| b.to_ascii_lowercase())),
        }
    }

    /// Prefix test under this policy.
    pub fn starts_with(self, name: &str, prefix: &str) -> bool {
        if prefix.is_empty() || name.len() < prefix.len() {
            return false;
        }
        self.eq(&name[..prefix.len()], prefix)
    }
}

/// Jenkins one-at-a-time hash, optionally case-folded.
///
/// Every linked entry carries its precomputed hash; a linked entry's hash
/// is never zero in practice (names are non-empty).
pub fn jenkins_hash(key: &str, policy: CasePolicy) -> u32 {
    let mut h: u32 = 0;
    for byte in key.bytes() {
        let byte = match policy {
            CasePolicy::Sensitive => byte,
            CasePolicy::Insensitive => byte.to_ascii_lowercase(),
        };
        h = h.wrapping_add(byte as u32);
        h = h.wrapping_add(h << 10);
        h ^= h >> 6;
    }
    h = h.wrapping_add(h << 3);
    h ^= h >> 11;
    h.wrapping_add(h << 15)
}

#[derive(Debug)]
struct Slot<T> {
    name: Box<str>,
    hash: u32,
    next: Option<usize>,
    value: T,
}

/// Slab-backed keyed store with insertion-order traversal.
#[derive(Debug)]
pub struct NameIndex<T> {
    slots: Vec<Option<Slot<T>>>,
    free: Vec<usize>,
    by_key: HashMap<Box<str>, usize>,
    head: Option<usize>,
    policy: CasePolicy,
    len: usize,
}

impl<T> NameIndex<T> {
    /// Create an empty index with the given name policy.
    pub fn new(policy: CasePolicy) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            by_key: HashMap::new(),
            head: None,
            policy,
            len: 0,
        }
    }

    /// The configured name policy.
    pub fn policy(&self) -> CasePolicy {
        self.policy
    }

    /// Number of linked entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when nothing is linked.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Link a new entry. The caller must have rejected duplicates already;
    /// linking an existing key is a logic error.
    pub fn link(&mut self, name: &str, value: T) -> usize {
        debug_assert!(!name.is_empty());
        debug_assert!(!self.contains(name), "'{name}' linked twice");

        let slot = Slot {
            name: name.into(),
            hash: jenkins_hash(name, self.policy),
            next: self.head,
            value,
        };

        let id = match self.free.pop() {
            Some(id) => {
                self.slots[id] = Some(slot);
                id
            }
            None => {
                self.slots.push(Some(slot));
                self.slots.len() - 1
            }
        };

        self.head = Some(id);
        self.by_key.insert(self.policy.fold(name).into(), id);
        self.len += 1;
        id
    }

    /// True when `name` is linked.
    pub fn contains(&self, name: &str) -> bool {
        self.id_of(name).is_some()
    }

    /// Stable handle of a linked name.
    pub fn id_of(&self, name: &str) -> Option<usize> {
        if name.is_empty() {
            return None;
        }
        self.by_key.get(self.policy.fold(name).as_ref()).copied()
    }

    /// Exact lookup.
    pub fn get(&self, name: &str) -> Option<&T> {
        self.id_of(name).map(|id| self.value(id))
    }

    /// Exact lookup, mutable.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut T> {
        let id = self.id_of(name)?;
        Some(self.value_mut(id))
    }

    /// Access by handle. Panics on a stale handle; handles are only
    /// invalidated by removing that same entry.
    pub fn value(&self, id: usize) -> &T {
        &self.slots[id].as_ref().expect("stale index handle").value
    }

    /// Access by handle, mutable.
    pub fn value_mut(&mut self, id: usize) -> &mut T {
        &mut self.slots[id].as_mut().expect("stale index handle").value
    }

    /// Access by handle, `None` when the entry has been unlinked.
    pub fn try_value(&self, id: usize) -> Option<&T> {
        self.slots.get(id)?.as_ref().map(|s| &s.value)
    }

    /// Mutable access by handle, `None` when the entry has been unlinked.
    pub fn try_value_mut(&mut self, id: usize) -> Option<&mut T> {
        self.slots.get_mut(id)?.as_mut().map(|s| &mut s.value)
    }

    /// Name stored for a handle.
    pub fn name(&self, id: usize) -> &str {
        &self.slots[id].as_ref().expect("stale index handle").name
    }

    /// Unlink by name. Chain removal is O(N); the freed slot's hash dies
    /// with it so the slot can be relinked later.
    pub fn unlink(&mut self, name: &str) -> Option<T> {
        let id = self.id_of(name)?;
        self.by_key.remove(self.policy.fold(name).as_ref());

        // Unlink from the insertion chain.
        let next = self.slots[id].as_ref().unwrap().next;
        if self.head == Some(id) {
            self.head = next;
        } else {
            let mut cur = self.head;
            while let Some(c) = cur {
                let c_next = self.slots[c].as_ref().unwrap().next;
                if c_next == Some(id) {
                    self.slots[c].as_mut().unwrap().next = next;
                    break;
                }
                cur = c_next;
            }
        }

        let slot = self.slots[id].take().unwrap();
        self.free.push(id);
        self.len -= 1;
        Some(slot.value)
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.by_key.clear();
        self.head = None;
        self.len = 0;
    }

    /// Walk entries most-recently-inserted first.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            index: self,
            cur: self.head,
        }
    }

    /// Handles in traversal order. Useful when the caller needs to mutate
    /// entries while walking.
    pub fn ids(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.len);
        let mut cur = self.head;
        while let Some(id) = cur {
            out.push(id);
            cur = self.slots[id].as_ref().unwrap().next;
        }
        out
    }

    /// Prefix scan. Returns up to `max` handles sorted alphabetically under
    /// the name policy, plus the total number of matches found (which can
    /// exceed `max`, so callers can report "+K more"). An empty prefix
    /// matches nothing.
    pub fn find_partial(&self, prefix: &str, max: usize) -> (Vec<usize>, usize) {
        if prefix.is_empty() || max == 0 {
            return (Vec::new(), 0);
        }

        let mut matches = Vec::new();
        let mut total = 0usize;
        let mut cur = self.head;
        while let Some(id) = cur {
            let slot = self.slots[id].as_ref().unwrap();
            if self.policy.starts_with(&slot.name, prefix) {
                if matches.len() < max {
                    matches.push(id);
                }
                total += 1;
            }
            cur = slot.next;
        }

        matches.sort_by(|&a, &b| self.policy.cmp(self.name(a), self.name(b)));
        (matches, total)
    }

    /// Flag-mask scan driven by a per-entry mask extractor. Same output
    /// contract as [`find_partial`](Self::find_partial).
    pub fn find_with_flags(
        &self,
        flags: u32,
        max: usize,
        mask_of: impl Fn(&T) -> u32,
    ) -> (Vec<usize>, usize) {
        if flags == 0 || max == 0 {
            return (Vec::new(), 0);
        }

        let mut matches = Vec::new();
        let mut total = 0usize;
        let mut cur = self.head;
        while let Some(id) = cur {
            let slot = self.slots[id].as_ref().unwrap();
            if mask_of(&slot.value) & flags != 0 {
                if matches.len() < max {
                    matches.push(id);
                }
                total += 1;
            }
            cur = slot.next;
        }

        matches.sort_by(|&a, &b| self.policy.cmp(self.name(a), self.name(b)));
        (matches, total)
    }

    /// Precomputed hash of a linked entry.
    #[cfg(test)]
    pub(crate) fn hash_of(&self, name: &str) -> Option<u32> {
        let id = self.id_of(name)?;
        Some(self.slots[id].as_ref().unwrap().hash)
    }
}

/// Insertion-order iterator over `(name, value)`.
pub struct Iter<'a, T> {
    index: &'a NameIndex<T>,
    cur: Option<usize>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (&'a str, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cur?;
        let slot = self.index.slots[id].as_ref().unwrap();
        self.cur = slot.next;
        Some((&slot.name, &slot.value))
    }
}
