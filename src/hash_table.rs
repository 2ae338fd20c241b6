use alloc::vec;
use alloc::vec::Vec;
use core::fmt;
use core::fmt::Debug;
use core::mem;

/// Width of a neighborhood bitmap in bits.
///
/// `Config::bucket_size` may not exceed this. Offsets within a neighborhood
/// are encoded MSB-first: offset `b` corresponds to the bit
/// `1 << (NEIGHBORHOOD_BITS - 1 - b)`, so `leading_zeros` on a bitmap yields
/// the offset of the nearest occupied neighbor directly.
pub const NEIGHBORHOOD_BITS: u32 = u32::BITS;

/// Bitmap value with every neighbor offset occupied.
const FULL_NEIGHBORHOOD: u32 = u32::MAX;

/// The hashing half of the key contract.
///
/// The table computes an entry's home slot as `hash_code() % capacity` and
/// relies on `PartialEq` for the equality half; it never inspects key
/// structure beyond these two capabilities.
///
/// Implementations must be consistent with equality: keys that compare equal
/// must return equal hash codes.
///
/// With the `foldhash` feature enabled, `HashCode` is implemented for the
/// primitive integers, `str`, and `String` by hashing through a fixed-seed
/// [`foldhash::fast::FixedState`] and truncating to 32 bits.
pub trait HashCode {
    /// Returns a 32-bit hash of the key.
    fn hash_code(&self) -> u32;
}

impl<T> HashCode for &T
where
    T: HashCode + ?Sized,
{
    #[inline]
    fn hash_code(&self) -> u32 {
        (**self).hash_code()
    }
}

#[cfg(feature = "foldhash")]
mod foldhash_impls {
    use core::hash::BuildHasher;
    use core::hash::Hash;

    use foldhash::fast::FixedState;

    use super::HashCode;

    #[inline]
    fn fold<T: Hash + ?Sized>(value: &T) -> u32 {
        FixedState::default().hash_one(value) as u32
    }

    macro_rules! impl_hash_code {
        ($($ty:ty),* $(,)?) => {
            $(
                impl HashCode for $ty {
                    #[inline]
                    fn hash_code(&self) -> u32 {
                        fold(self)
                    }
                }
            )*
        };
    }

    impl_hash_code!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize);

    impl HashCode for str {
        #[inline]
        fn hash_code(&self) -> u32 {
            fold(self)
        }
    }

    impl HashCode for alloc::string::String {
        #[inline]
        fn hash_code(&self) -> u32 {
            fold(self.as_str())
        }
    }
}

/// Construction parameters for a [`HopscotchTable`].
///
/// # Examples
///
/// ```rust
/// use hopmap::Config;
///
/// let config = Config::default();
/// assert_eq!(config.capacity, 1 << 16);
/// assert_eq!(config.bucket_size, 32);
/// assert!(!config.auto_resize);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Total slot count, fixed for the table's entire lifetime.
    pub capacity: usize,
    /// Maximum forward distance, in slots with wraparound, that an entry may
    /// live from its home. Must be in `1..=32` (the bitmap width).
    pub bucket_size: u32,
    /// Present for compatibility with configurations that request automatic
    /// growth. The flag is stored but never acted upon: the table never
    /// resizes, and [`HopscotchTable::insert`] reports failure when no valid
    /// relocation exists.
    pub auto_resize: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            capacity: 1 << 16,
            bucket_size: NEIGHBORHOOD_BITS,
            auto_resize: false,
        }
    }
}

/// Error returned by [`HopscotchTable::insert`] when a new entry cannot be
/// placed, handing the rejected key and value back to the caller.
///
/// The two underlying causes — no empty slot anywhere in the table, or an
/// empty slot that cannot be walked to within `bucket_size` of the key's home
/// — are deliberately not distinguished. The recovery is the same for both:
/// rebuild into a larger table and reinsert. The table remains fully valid
/// and usable after a failed insertion.
///
/// # Examples
///
/// ```rust
/// # #[cfg(feature = "foldhash")]
/// # {
/// use hopmap::HopscotchTable;
///
/// let mut table = HopscotchTable::with_capacity(2);
/// table.insert(1u32, "a").unwrap();
/// table.insert(2u32, "b").unwrap();
///
/// let err = table.insert(3u32, "c").unwrap_err();
/// assert_eq!(err.into_inner(), (3, "c"));
/// # }
/// ```
#[derive(Debug, PartialEq, Eq)]
pub struct InsertError<K, V> {
    key: K,
    value: V,
}

impl<K, V> InsertError<K, V> {
    /// Returns the key and value that could not be inserted.
    pub fn into_inner(self) -> (K, V) {
        (self.key, self.value)
    }

    /// Returns a reference to the rejected key.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Returns a reference to the rejected value.
    pub fn value(&self) -> &V {
        &self.value
    }
}

impl<K, V> fmt::Display for InsertError<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("no empty slot could be brought within the key's neighborhood")
    }
}

impl<K, V> core::error::Error for InsertError<K, V>
where
    K: Debug,
    V: Debug,
{
}

/// A fixed-capacity key-value table using hopscotch hashing.
///
/// `HopscotchTable<K, V>` owns a slot array and a parallel array of 32-bit
/// neighborhood bitmaps, one per slot acting as that slot's *home*. An entry
/// whose key hashes to home `h` is always stored within `bucket_size` forward
/// hops of `h` (with wraparound), and bit `b` of `h`'s bitmap records that
/// slot `(h + b) % capacity` holds one of `h`'s entries. Lookups therefore
/// cost at most 32 key comparisons regardless of load.
///
/// Keys supply hashing through [`HashCode`] and equality through `PartialEq`.
/// The table has no growth path: capacity is fixed at construction and
/// [`insert`] fails once no legal placement exists.
///
/// [`insert`]: HopscotchTable::insert
///
/// # Examples
///
/// ```rust
/// # #[cfg(feature = "foldhash")]
/// # {
/// use hopmap::HopscotchTable;
///
/// let mut table = HopscotchTable::with_capacity(16);
/// table.insert(7u32, "seven").unwrap();
///
/// assert_eq!(table.get(&7), Some(&"seven"));
/// assert_eq!(table.remove(&7), Some("seven"));
/// assert!(table.is_empty());
/// # }
/// ```
#[derive(Clone)]
pub struct HopscotchTable<K, V> {
    slots: Vec<Option<(K, V)>>,
    neighbors: Vec<u32>,
    bucket_size: u32,
    auto_resize: bool,
    len: usize,
}

impl<K, V> HopscotchTable<K, V> {
    /// Creates a table with the given configuration.
    ///
    /// All slots start empty and all neighborhood bitmaps start zeroed.
    ///
    /// # Panics
    ///
    /// Panics if `config.capacity` is zero or `config.bucket_size` lies
    /// outside `1..=32`. A neighborhood bitmap is 32 bits wide, so a larger
    /// bucket size has no representation and would silently corrupt the
    /// bitmaps.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hopmap::Config;
    /// use hopmap::HopscotchTable;
    ///
    /// let table: HopscotchTable<u32, u32> = HopscotchTable::new(Config {
    ///     capacity: 4096,
    ///     bucket_size: 32,
    ///     auto_resize: false,
    /// });
    /// assert_eq!(table.capacity(), 4096);
    /// assert_eq!(table.len(), 0);
    /// ```
    pub fn new(config: Config) -> Self {
        assert!(config.capacity > 0, "capacity must be positive");
        assert!(
            (1..=NEIGHBORHOOD_BITS).contains(&config.bucket_size),
            "bucket_size must be in 1..={NEIGHBORHOOD_BITS}, got {}",
            config.bucket_size
        );

        let mut slots = Vec::new();
        slots.resize_with(config.capacity, || None);

        HopscotchTable {
            slots,
            neighbors: vec![0; config.capacity],
            bucket_size: config.bucket_size,
            auto_resize: config.auto_resize,
            len: 0,
        }
    }

    /// Creates a table with the given capacity and the default bucket size
    /// of 32.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hopmap::HopscotchTable;
    ///
    /// let table: HopscotchTable<u32, String> = HopscotchTable::with_capacity(100);
    /// assert_eq!(table.capacity(), 100);
    /// ```
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(Config {
            capacity,
            ..Config::default()
        })
    }

    /// Returns the number of live entries in the table.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(feature = "foldhash")]
    /// # {
    /// use hopmap::HopscotchTable;
    ///
    /// let mut table = HopscotchTable::with_capacity(8);
    /// assert_eq!(table.len(), 0);
    /// table.insert(1u32, 10).unwrap();
    /// assert_eq!(table.len(), 1);
    /// # }
    /// ```
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the table contains no entries.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hopmap::HopscotchTable;
    ///
    /// let table: HopscotchTable<u32, u32> = HopscotchTable::with_capacity(8);
    /// assert!(table.is_empty());
    /// ```
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the total slot count, fixed at construction.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns the maximum neighborhood distance configured at construction.
    pub fn bucket_size(&self) -> u32 {
        self.bucket_size
    }

    /// Returns the stored `auto_resize` flag.
    ///
    /// The flag is inert: the table never grows. See [`Config::auto_resize`].
    pub fn auto_resize(&self) -> bool {
        self.auto_resize
    }

    /// Returns the load factor, `len / capacity`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(feature = "foldhash")]
    /// # {
    /// use hopmap::HopscotchTable;
    ///
    /// let mut table = HopscotchTable::with_capacity(4);
    /// table.insert(1u32, 1).unwrap();
    /// assert_eq!(table.load(), 0.25);
    /// # }
    /// ```
    pub fn load(&self) -> f64 {
        self.len as f64 / self.slots.len() as f64
    }

    /// Returns an iterator over the entries of the table in slot order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(feature = "foldhash")]
    /// # {
    /// use hopmap::HopscotchTable;
    ///
    /// let mut table = HopscotchTable::with_capacity(8);
    /// table.insert(1u32, "one").unwrap();
    /// table.insert(2u32, "two").unwrap();
    ///
    /// let mut values: Vec<_> = table.iter().map(|(_, v)| *v).collect();
    /// values.sort();
    /// assert_eq!(values, ["one", "two"]);
    /// # }
    /// ```
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            slots: self.slots.iter(),
            remaining: self.len,
        }
    }

    /// Forward distance from `from` to `to`, walking with wraparound.
    ///
    /// Capacity need not be a power of two, so this is true modular
    /// arithmetic rather than masking. Adding `capacity` before subtracting
    /// keeps the computation in unsigned space at the array boundary.
    #[inline]
    fn distance(&self, from: usize, to: usize) -> usize {
        (to + self.slots.len() - from) % self.slots.len()
    }

    /// Slot index at `offset` forward hops from `base`.
    #[inline]
    fn slot_at(&self, base: usize, offset: usize) -> usize {
        (base + offset) % self.slots.len()
    }

    /// Slot index one hop backward of `index`.
    #[inline]
    fn prev_slot(&self, index: usize) -> usize {
        (index + self.slots.len() - 1) % self.slots.len()
    }

    /// Marks the slot at `offset` hops from `home` as holding one of
    /// `home`'s entries.
    #[inline]
    fn set_neighbor(&mut self, home: usize, offset: u32) {
        self.neighbors[home] |= 1 << (NEIGHBORHOOD_BITS - 1 - offset);
    }

    /// Clears the neighbor mark at `offset` hops from `home`.
    #[inline]
    fn clear_neighbor(&mut self, home: usize, offset: u32) {
        self.neighbors[home] &= !(1 << (NEIGHBORHOOD_BITS - 1 - offset));
    }
}

impl<K, V> HopscotchTable<K, V>
where
    K: HashCode + PartialEq,
{
    #[inline]
    fn home_of(&self, key: &K) -> usize {
        key.hash_code() as usize % self.slots.len()
    }

    /// Locates the slot holding `key`, following the set bits of its home's
    /// neighborhood bitmap from the nearest offset outward.
    fn find_entry(&self, home: usize, key: &K) -> Option<usize> {
        let mut bits = self.neighbors[home];
        while bits != 0 {
            let offset = bits.leading_zeros();
            let index = self.slot_at(home, offset as usize);
            if let Some((candidate, _)) = &self.slots[index]
                && candidate == key
            {
                return Some(index);
            }
            bits &= !(1 << (NEIGHBORHOOD_BITS - 1 - offset));
        }
        None
    }

    /// Returns a reference to the value stored for `key`, or `None` if the
    /// key is absent.
    ///
    /// Costs at most 32 key comparisons regardless of how full the table is;
    /// only slots flagged in the key's home bitmap are probed.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(feature = "foldhash")]
    /// # {
    /// use hopmap::HopscotchTable;
    ///
    /// let mut table = HopscotchTable::with_capacity(8);
    /// table.insert(1u32, "one").unwrap();
    ///
    /// assert_eq!(table.get(&1), Some(&"one"));
    /// assert_eq!(table.get(&2), None);
    /// # }
    /// ```
    pub fn get(&self, key: &K) -> Option<&V> {
        let home = self.home_of(key);
        let index = self.find_entry(home, key)?;
        self.slots[index].as_ref().map(|(_, value)| value)
    }

    /// Returns a mutable reference to the value stored for `key`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(feature = "foldhash")]
    /// # {
    /// use hopmap::HopscotchTable;
    ///
    /// let mut table = HopscotchTable::with_capacity(8);
    /// table.insert(1u32, 10).unwrap();
    ///
    /// if let Some(value) = table.get_mut(&1) {
    ///     *value += 5;
    /// }
    /// assert_eq!(table.get(&1), Some(&15));
    /// # }
    /// ```
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let home = self.home_of(key);
        let index = self.find_entry(home, key)?;
        self.slots[index].as_mut().map(|(_, value)| value)
    }

    /// Returns `true` if the table holds an entry for `key`.
    pub fn contains_key(&self, key: &K) -> bool {
        let home = self.home_of(key);
        self.find_entry(home, key).is_some()
    }

    /// Inserts a key-value pair.
    ///
    /// If the key is already present its value is overwritten in place, no
    /// entry moves, and `Ok(Some(old_value))` is returned. Otherwise the
    /// table finds the nearest empty slot by linear probing and, when that
    /// slot is farther than `bucket_size` from the key's home, walks it
    /// closer by relocating entries within their own neighborhoods.
    ///
    /// # Errors
    ///
    /// Fails when no empty slot exists anywhere in the table, or when an
    /// empty slot exists but no chain of relocations can bring it within the
    /// key's neighborhood. Ownership of the pair is returned inside the
    /// error, and the table remains valid: a failed insertion never loses or
    /// corrupts existing entries.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(feature = "foldhash")]
    /// # {
    /// use hopmap::HopscotchTable;
    ///
    /// let mut table = HopscotchTable::with_capacity(8);
    ///
    /// assert_eq!(table.insert(1u32, "a"), Ok(None));
    /// assert_eq!(table.insert(1u32, "b"), Ok(Some("a")));
    /// assert_eq!(table.len(), 1);
    /// # }
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> Result<Option<V>, InsertError<K, V>> {
        let home = self.home_of(&key);

        if let Some(index) = self.find_entry(home, &key) {
            if let Some((_, existing)) = self.slots[index].as_mut() {
                return Ok(Some(mem::replace(existing, value)));
            }
        }

        let Some(mut empty) = self.find_empty_slot(home) else {
            return Err(InsertError { key, value });
        };

        // An empty slot whose own neighborhood is already saturated aborts
        // the insertion before any displacement is attempted.
        if self.neighbors[empty] == FULL_NEIGHBORHOOD {
            return Err(InsertError { key, value });
        }

        let offset = loop {
            let offset = self.distance(home, empty);
            if offset < self.bucket_size as usize {
                break offset;
            }
            match self.displace_into(empty) {
                Some(freed) => empty = freed,
                None => return Err(InsertError { key, value }),
            }
        };

        self.slots[empty] = Some((key, value));
        self.set_neighbor(home, offset as u32);
        self.len += 1;
        Ok(None)
    }

    /// Finds the nearest empty slot at or after `home`, wrapping around the
    /// table.
    ///
    /// This probe is unbounded; it returns `None` only when every slot is
    /// occupied.
    fn find_empty_slot(&self, home: usize) -> Option<usize> {
        if self.slots[home].is_none() {
            return Some(home);
        }

        let mut index = self.slot_at(home, 1);
        while index != home {
            if self.slots[index].is_none() {
                return Some(index);
            }
            index = self.slot_at(index, 1);
        }
        None
    }

    /// Walks the empty slot at `empty` one hop backward.
    ///
    /// Searches the preceding slots, nearest first, for the first entry that
    /// can legally move into `empty` without leaving its own neighborhood:
    /// an entry homed at `h` sitting at offset `o` may hop to `empty` when
    /// `o <= distance(h, empty) < bucket_size`. The entry is relocated, both
    /// bitmap bits of its home are updated, and its vacated slot is
    /// returned.
    ///
    /// Returns `None` when no entry in the window can move, which deadlocks
    /// the insertion.
    fn displace_into(&mut self, empty: usize) -> Option<usize> {
        let mut candidate_home = self.prev_slot(empty);
        let mut hop = self.distance(candidate_home, empty);
        while hop < self.bucket_size as usize {
            // The nearest entry homed at `candidate_home` sits at the offset
            // of the bitmap's leading set bit; 32 means no entries at all.
            let offset = self.neighbors[candidate_home].leading_zeros() as usize;
            if offset <= hop {
                let from = self.slot_at(candidate_home, offset);
                self.clear_neighbor(candidate_home, offset as u32);
                self.set_neighbor(candidate_home, hop as u32);
                self.slots[empty] = self.slots[from].take();
                return Some(from);
            }
            candidate_home = self.prev_slot(candidate_home);
            hop = self.distance(candidate_home, empty);
        }
        None
    }

    /// Removes the entry for `key` and returns its value, or `None` if the
    /// key is absent.
    ///
    /// Clears the corresponding neighborhood bit and resets the slot to
    /// empty; removal never relocates other entries.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(feature = "foldhash")]
    /// # {
    /// use hopmap::HopscotchTable;
    ///
    /// let mut table = HopscotchTable::with_capacity(8);
    /// table.insert(1u32, "one").unwrap();
    ///
    /// assert_eq!(table.remove(&1), Some("one"));
    /// assert_eq!(table.remove(&1), None);
    /// assert_eq!(table.len(), 0);
    /// # }
    /// ```
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let home = self.home_of(key);
        let index = self.find_entry(home, key)?;
        let (_, value) = self.slots[index].take()?;

        // The slot is extracted before any bookkeeping changes, so a miss
        // here leaves the table untouched.
        let offset = self.distance(home, index);
        self.clear_neighbor(home, offset as u32);
        self.len -= 1;
        Some(value)
    }
}

impl<K, V> Default for HopscotchTable<K, V> {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl<K, V> Debug for HopscotchTable<K, V>
where
    K: Debug,
    V: Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in self.iter() {
            map.entry(key, value);
        }
        map.finish()
    }
}

/// An iterator over the entries of a [`HopscotchTable`] in slot order.
///
/// Created by [`HopscotchTable::iter`].
pub struct Iter<'a, K, V> {
    slots: core::slice::Iter<'a, Option<(K, V)>>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        for slot in self.slots.by_ref() {
            if let Some((key, value)) = slot {
                self.remaining -= 1;
                return Some((key, value));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<'a, K, V> IntoIterator for &'a HopscotchTable<K, V> {
    type IntoIter = Iter<'a, K, V>;
    type Item = (&'a K, &'a V);

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
impl<K, V> HopscotchTable<K, V>
where
    K: HashCode + PartialEq,
{
    /// Scans the whole table and asserts every structural invariant: every
    /// entry within `bucket_size` of its home, bitmap bits agreeing with
    /// slot contents, and entry accounting matching the live counter.
    fn check_invariants(&self) {
        let mut occupied = 0;
        for (index, slot) in self.slots.iter().enumerate() {
            if let Some((key, _)) = slot {
                occupied += 1;
                let home = self.home_of(key);
                let offset = self.distance(home, index);
                assert!(
                    offset < self.bucket_size as usize,
                    "entry at slot {index} lies {offset} hops from home {home}"
                );
                assert!(
                    self.neighbors[home] & (1 << (NEIGHBORHOOD_BITS - 1 - offset as u32)) != 0,
                    "bitmap of home {home} does not flag its entry at slot {index}"
                );
            }
        }
        assert_eq!(occupied, self.len, "live counter disagrees with slots");

        let set_bits: u32 = self.neighbors.iter().map(|bits| bits.count_ones()).sum();
        assert_eq!(set_bits as usize, self.len, "bitmap population disagrees");
    }
}
