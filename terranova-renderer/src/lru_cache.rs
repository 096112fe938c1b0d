use std::hash::Hash;

use bevy::utils::HashMap;

struct Entry<K, V> {
    value: V,
    /// Toward the most recently used end.
    previous: Option<K>,
    next: Option<K>,
}

/// Capacity-bounded map that evicts the least recently used entry. Both
/// `get` and `put` count as a use.
pub struct LruCache<K, V> {
    entries: HashMap<K, Entry<K, V>>,
    head: Option<K>,
    tail: Option<K>,
    capacity: usize,
}

impl<K, V> LruCache<K, V>
where
    K: Clone + Eq + Hash,
{
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: HashMap::with_capacity_and_hasher(capacity + 1, Default::default()),
            head: None,
            tail: None,
            capacity,
        }
    }
    pub fn capacity(&self) -> usize {
        self.capacity
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Looks up without touching the recency order.
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|entry| &entry.value)
    }

    pub fn get(&mut self, key: &K) -> Option<&V> {
        if !self.promote(key) {
            return None;
        }
        self.peek(key)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        if !self.promote(key) {
            return None;
        }
        self.entries.get_mut(key).map(|entry| &mut entry.value)
    }

    /// Inserts or refreshes `key`. Returns the entry pushed out when the
    /// insertion went over capacity.
    pub fn put(&mut self, key: K, value: V) -> Option<(K, V)> {
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.value = value;
            self.promote(&key);
            return None;
        }
        self.entries.insert(
            key.clone(),
            Entry {
                value,
                previous: None,
                next: None,
            },
        );
        self.attach_front(&key);
        if self.entries.len() > self.capacity {
            return self.pop_least_recent();
        }
        None
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        if !self.entries.contains_key(key) {
            return None;
        }
        self.detach(key);
        self.entries.remove(key).map(|entry| entry.value)
    }

    pub fn pop_least_recent(&mut self) -> Option<(K, V)> {
        let key = self.tail.clone()?;
        let value = self.remove(&key)?;
        Some((key, value))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.head = None;
        self.tail = None;
    }

    /// Keys from most to least recently used.
    pub fn keys(&self) -> Vec<K> {
        let mut keys = Vec::with_capacity(self.entries.len());
        let mut cursor = self.head.clone();
        while let Some(key) = cursor {
            cursor = self.entries.get(&key).and_then(|entry| entry.next.clone());
            keys.push(key);
        }
        keys
    }

    fn promote(&mut self, key: &K) -> bool {
        if !self.entries.contains_key(key) {
            return false;
        }
        if self.head.as_ref() != Some(key) {
            self.detach(key);
            self.attach_front(key);
        }
        true
    }

    fn detach(&mut self, key: &K) {
        let (previous, next) = match self.entries.get_mut(key) {
            Some(entry) => (entry.previous.take(), entry.next.take()),
            None => return,
        };
        match &previous {
            Some(p) => {
                if let Some(entry) = self.entries.get_mut(p) {
                    entry.next = next.clone();
                }
            }
            None => self.head = next.clone(),
        }
        match &next {
            Some(n) => {
                if let Some(entry) = self.entries.get_mut(n) {
                    entry.previous = previous;
                }
            }
            None => self.tail = previous,
        }
    }

    fn attach_front(&mut self, key: &K) {
        let old_head = self.head.replace(key.clone());
        if let Some(h) = &old_head {
            if let Some(entry) = self.entries.get_mut(h) {
                entry.previous = Some(key.clone());
            }
        }
        if let Some(entry) = self.entries.get_mut(key) {
            entry.previous = None;
            entry.next = old_head;
        }
        if self.tail.is_none() {
            self.tail = Some(key.clone());
        }
    }
}

impl<K, V> Default for LruCache<K, V>
where
    K: Clone + Eq + Hash,
{
    fn default() -> Self {
        LruCache::new(50)
    }
}
