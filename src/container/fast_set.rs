/// An insertion-ordered set over a fixed key domain `[0, n)`.
///
/// Membership is a dense bitmap, the inserted keys live in a vector in
/// discovery order. BFS code uses one `FastSet` as frontier and visited
/// set at once: keys are scanned by index while new keys are appended
/// behind the scan position. Clearing costs O(size), not O(n).
#[derive(Debug, Clone, Default)]
pub struct FastSet {
    present: Vec<bool>,
    keys: Vec<u32>,
}

impl FastSet {
    pub fn new(domain: usize) -> Self {
        Self {
            present: vec![false; domain],
            keys: Vec::new(),
        }
    }

    /// Grows the key domain. Shrinking is not supported.
    pub fn resize(&mut self, domain: usize) {
        debug_assert!(domain >= self.present.len());
        self.present.resize(domain, false);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    #[inline]
    pub fn contains(&self, key: u32) -> bool {
        self.present[key as usize]
    }

    /// The `index`-th inserted key.
    #[inline]
    pub fn key_by_index(&self, index: usize) -> u32 {
        self.keys[index]
    }

    #[inline]
    pub fn insert(&mut self, key: u32) {
        if !self.present[key as usize] {
            self.present[key as usize] = true;
            self.keys.push(key);
        }
    }

    /// Removes and returns the key at `index` (swap-remove; order of the
    /// remaining keys past `index` changes).
    pub fn delete_by_index(&mut self, index: usize) -> u32 {
        let key = self.keys.swap_remove(index);
        self.present[key as usize] = false;
        key
    }

    /// Removes and returns the most recently inserted key.
    pub fn delete_back(&mut self) -> u32 {
        let key = self.keys.pop().expect("delete_back on empty FastSet");
        self.present[key as usize] = false;
        key
    }

    pub fn clear(&mut self) {
        for &key in &self.keys {
            self.present[key as usize] = false;
        }
        self.keys.clear();
    }

    pub fn keys(&self) -> &[u32] {
        &self.keys
    }
}
