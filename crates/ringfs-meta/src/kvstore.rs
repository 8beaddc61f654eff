//! Persistent ordered key-value map backing the namespace tree.
//!
//! A committed [`Snapshot`] is immutable. Writers open a [`Txn`] from a
//! snapshot, apply inserts, and commit to obtain a new snapshot. Unchanged
//! subtrees are shared between snapshots through `Arc` path copying, so an
//! older snapshot stays readable for as long as anyone holds it.
//!
//! The tree is an AVL tree; every insert copies only the nodes on the path
//! from the root to the affected leaf.

use std::cmp::Ordering;
use std::sync::Arc;

/// Key type for the KV store.
pub type Key = Vec<u8>;

type Link<V> = Option<Arc<Node<V>>>;

struct Node<V> {
    key: Key,
    value: Arc<V>,
    height: u32,
    left: Link<V>,
    right: Link<V>,
}

fn height<V>(link: &Link<V>) -> u32 {
    link.as_ref().map_or(0, |n| n.height)
}

fn make<V>(key: Key, value: Arc<V>, left: Link<V>, right: Link<V>) -> Arc<Node<V>> {
    let height = 1 + height(&left).max(height(&right));
    Arc::new(Node {
        key,
        value,
        height,
        left,
        right,
    })
}

/// Rebuilds a node from its parts, rotating when the subtrees differ in height by more than one.
fn balance<V>(key: Key, value: Arc<V>, left: Link<V>, right: Link<V>) -> Arc<Node<V>> {
    let (hl, hr) = (height(&left), height(&right));
    if hl > hr + 1 {
        if let Some(l) = &left {
            if height(&l.left) >= height(&l.right) {
                let new_right = make(key, value, l.right.clone(), right);
                return make(
                    l.key.clone(),
                    l.value.clone(),
                    l.left.clone(),
                    Some(new_right),
                );
            }
            if let Some(lr) = &l.right {
                let new_left = make(
                    l.key.clone(),
                    l.value.clone(),
                    l.left.clone(),
                    lr.left.clone(),
                );
                let new_right = make(key, value, lr.right.clone(), right);
                return make(
                    lr.key.clone(),
                    lr.value.clone(),
                    Some(new_left),
                    Some(new_right),
                );
            }
        }
    } else if hr > hl + 1 {
        if let Some(r) = &right {
            if height(&r.right) >= height(&r.left) {
                let new_left = make(key, value, left, r.left.clone());
                return make(
                    r.key.clone(),
                    r.value.clone(),
                    Some(new_left),
                    r.right.clone(),
                );
            }
            if let Some(rl) = &r.left {
                let new_left = make(key, value, left, rl.left.clone());
                let new_right = make(
                    r.key.clone(),
                    r.value.clone(),
                    rl.right.clone(),
                    r.right.clone(),
                );
                return make(
                    rl.key.clone(),
                    rl.value.clone(),
                    Some(new_left),
                    Some(new_right),
                );
            }
        }
    }
    make(key, value, left, right)
}

/// Path-copying insert. Returns the new subtree root and whether the key was new.
fn insert_at<V>(link: &Link<V>, key: Key, value: Arc<V>) -> (Arc<Node<V>>, bool) {
    let node = match link {
        None => return (make(key, value, None, None), true),
        Some(node) => node,
    };
    match key.cmp(&node.key) {
        Ordering::Less => {
            let (left, added) = insert_at(&node.left, key, value);
            let root = balance(
                node.key.clone(),
                node.value.clone(),
                Some(left),
                node.right.clone(),
            );
            (root, added)
        }
        Ordering::Greater => {
            let (right, added) = insert_at(&node.right, key, value);
            let root = balance(
                node.key.clone(),
                node.value.clone(),
                node.left.clone(),
                Some(right),
            );
            (root, added)
        }
        Ordering::Equal => {
            let root = Arc::new(Node {
                key,
                value,
                height: node.height,
                left: node.left.clone(),
                right: node.right.clone(),
            });
            (root, false)
        }
    }
}

fn get_at<'a, V>(mut link: &'a Link<V>, key: &[u8]) -> Option<&'a Arc<V>> {
    while let Some(node) = link {
        match key.cmp(node.key.as_slice()) {
            Ordering::Less => link = &node.left,
            Ordering::Greater => link = &node.right,
            Ordering::Equal => return Some(&node.value),
        }
    }
    None
}

fn scan_prefix_at<V>(link: &Link<V>, prefix: &[u8], out: &mut Vec<(Key, Arc<V>)>) {
    let Some(node) = link else {
        return;
    };
    let key = node.key.as_slice();
    let in_range = key.starts_with(prefix);
    if key > prefix {
        scan_prefix_at(&node.left, prefix, out);
    }
    if in_range {
        out.push((node.key.clone(), node.value.clone()));
    }
    if key < prefix || in_range {
        scan_prefix_at(&node.right, prefix, out);
    }
}

/// An immutable, committed version of the map.
pub struct Snapshot<V> {
    root: Link<V>,
    len: usize,
}

impl<V> Clone for Snapshot<V> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            len: self.len,
        }
    }
}

impl<V> Default for Snapshot<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Snapshot<V> {
    /// Creates an empty snapshot.
    pub fn new() -> Self {
        Self { root: None, len: 0 }
    }

    /// Opens a write transaction based on this snapshot.
    pub fn txn(&self) -> Txn<V> {
        Txn {
            root: self.root.clone(),
            len: self.len,
        }
    }

    /// Get a value by key. Returns None if the key doesn't exist.
    pub fn get(&self, key: &[u8]) -> Option<&V> {
        get_at(&self.root, key).map(|v| &**v)
    }

    /// Returns true if the key exists.
    pub fn contains_key(&self, key: &[u8]) -> bool {
        get_at(&self.root, key).is_some()
    }

    /// Scan all keys with the given prefix, returning (key, value) pairs in sorted order.
    pub fn scan_prefix(&self, prefix: &[u8]) -> Vec<(Key, Arc<V>)> {
        let mut out = Vec::new();
        scan_prefix_at(&self.root, prefix, &mut out);
        out
    }

    /// Iterates over every entry in key order.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter::new(&self.root)
    }

    /// Number of keys in the snapshot.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the snapshot holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns true if both snapshots share the same root.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.root, &other.root) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

/// A pending set of writes on top of a base snapshot.
///
/// Nothing written here is visible to other holders of the base snapshot.
/// Dropping a transaction discards its writes.
pub struct Txn<V> {
    root: Link<V>,
    len: usize,
}

impl<V> Txn<V> {
    /// Get a value by key, observing this transaction's own writes.
    pub fn get(&self, key: &[u8]) -> Option<&V> {
        get_at(&self.root, key).map(|v| &**v)
    }

    /// Returns true if the key exists in this transaction's view.
    pub fn contains_key(&self, key: &[u8]) -> bool {
        get_at(&self.root, key).is_some()
    }

    /// Put a key-value pair. Overwrites any existing value.
    /// Returns true if the key was not present before.
    pub fn insert(&mut self, key: Key, value: V) -> bool {
        let (root, added) = insert_at(&self.root, key, Arc::new(value));
        self.root = Some(root);
        if added {
            self.len += 1;
        }
        added
    }

    /// Seals the writes into a new immutable snapshot.
    pub fn commit(self) -> Snapshot<V> {
        Snapshot {
            root: self.root,
            len: self.len,
        }
    }
}

/// In-order iterator over a snapshot.
pub struct Iter<'a, V> {
    stack: Vec<&'a Node<V>>,
}

impl<'a, V> Iter<'a, V> {
    fn new(root: &'a Link<V>) -> Self {
        let mut iter = Self { stack: Vec::new() };
        iter.push_left(root);
        iter
    }

    fn push_left(&mut self, mut link: &'a Link<V>) {
        while let Some(node) = link {
            self.stack.push(node);
            link = &node.left;
        }
    }
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (&'a [u8], &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.push_left(&node.right);
        Some((node.key.as_slice(), &*node.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depth<V>(link: &Link<V>) -> u32 {
        match link {
            None => 0,
            Some(n) => {
                let (l, r) = (depth(&n.left), depth(&n.right));
                assert!(l.abs_diff(r) <= 1, "unbalanced at {:?}", n.key);
                1 + l.max(r)
            }
        }
    }

    #[test]
    fn test_insert_get() {
        let mut tx = Snapshot::new().txn();
        assert!(tx.insert(b"key1".to_vec(), 1));
        let snap = tx.commit();
        assert_eq!(snap.get(b"key1"), Some(&1));
        assert_eq!(snap.get(b"key2"), None);
        assert_eq!(snap.len(), 1);
    }

    #[test]
    fn test_overwrite() {
        let mut tx = Snapshot::new().txn();
        tx.insert(b"key".to_vec(), "v1");
        assert!(!tx.insert(b"key".to_vec(), "v2"));
        let snap = tx.commit();
        assert_eq!(snap.get(b"key"), Some(&"v2"));
        assert_eq!(snap.len(), 1);
    }

    #[test]
    fn test_old_snapshot_unchanged() {
        let mut tx = Snapshot::new().txn();
        tx.insert(b"a".to_vec(), 1);
        let first = tx.commit();

        let mut tx = first.txn();
        tx.insert(b"a".to_vec(), 2);
        tx.insert(b"b".to_vec(), 3);
        let second = tx.commit();

        assert_eq!(first.get(b"a"), Some(&1));
        assert!(!first.contains_key(b"b"));
        assert_eq!(second.get(b"a"), Some(&2));
        assert_eq!(second.get(b"b"), Some(&3));
        assert!(!first.ptr_eq(&second));
    }

    #[test]
    fn test_dropped_txn_discards_writes() {
        let base = Snapshot::<u32>::new();
        let mut tx = base.txn();
        tx.insert(b"x".to_vec(), 1);
        assert!(tx.contains_key(b"x"));
        drop(tx);
        assert!(base.is_empty());
    }

    #[test]
    fn test_scan_prefix() {
        let mut tx = Snapshot::new().txn();
        tx.insert(b"dir/a".to_vec(), 1);
        tx.insert(b"dir/b".to_vec(), 2);
        tx.insert(b"dir/c".to_vec(), 3);
        tx.insert(b"other/x".to_vec(), 4);
        tx.insert(b"dia".to_vec(), 5);
        let snap = tx.commit();

        let result = snap.scan_prefix(b"dir/");
        let keys: Vec<_> = result.iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys, vec![b"dir/a".to_vec(), b"dir/b".to_vec(), b"dir/c".to_vec()]);
    }

    #[test]
    fn test_iter_sorted_and_balanced() {
        let mut tx = Snapshot::new().txn();
        for i in 0..500u32 {
            tx.insert(format!("{:05}", (i * 7919) % 500).into_bytes(), i);
        }
        let snap = tx.commit();
        assert_eq!(snap.len(), 500);
        let keys: Vec<_> = snap.iter().map(|(k, _)| k.to_vec()).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert!(depth(&snap.root) <= 12);
    }

    #[test]
    fn test_ascending_inserts_stay_balanced() {
        let mut tx = Snapshot::new().txn();
        for i in 0..1024u32 {
            tx.insert(i.to_be_bytes().to_vec(), ());
        }
        let snap = tx.commit();
        assert!(depth(&snap.root) <= 11);
    }
}
