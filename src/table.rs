//! Open-addressed hash table with linear probing and tombstones, used for
//! both the VM's global-name table and its string-intern set.
//!
//! The probe sequence and growth policy (load factor 0.75, starting at
//! capacity 8, doubling) mirror the table this spec was distilled from;
//! unlike it, a deleted slot here stays a genuine tombstone (key cleared,
//! slot still marked occupied-by-a-ghost) rather than collapsing back into
//! an empty slot, so probing past it still finds entries placed after it.

const MAX_LOAD: f64 = 0.75;
const INITIAL_CAPACITY: usize = 8;

enum Slot<V> {
  Empty,
  Tombstone,
  Occupied(Box<str>, V),
}

pub struct Table<V> {
  slots: Vec<Slot<V>>,
  len: usize,
}

impl<V> Default for Table<V> {
  fn default() -> Self {
    Self::new()
  }
}

impl<V> Table<V> {
  pub fn new() -> Self {
    Table {
      slots: Vec::new(),
      len: 0,
    }
  }

  pub fn len(&self) -> usize {
    self.len
  }

  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  fn capacity(&self) -> usize {
    self.slots.len()
  }

  fn find_slot(slots: &[Slot<V>], key: &str) -> usize {
    let capacity = slots.len();
    let mut index = (hash_str(key) as usize) % capacity;
    let mut tombstone: Option<usize> = None;
    loop {
      match &slots[index] {
        Slot::Empty => return tombstone.unwrap_or(index),
        Slot::Tombstone => {
          if tombstone.is_none() {
            tombstone = Some(index);
          }
        }
        Slot::Occupied(k, _) if k.as_ref() == key => return index,
        Slot::Occupied(..) => {}
      }
      index = (index + 1) % capacity;
    }
  }

  fn grow(&mut self, capacity: usize) {
    let mut new_slots = Vec::with_capacity(capacity);
    new_slots.resize_with(capacity, || Slot::Empty);
    let old = std::mem::replace(&mut self.slots, new_slots);
    self.len = 0;
    for slot in old {
      if let Slot::Occupied(key, value) = slot {
        let index = Self::find_slot(&self.slots, &key);
        self.slots[index] = Slot::Occupied(key, value);
        self.len += 1;
      }
    }
  }

  /// Inserts or overwrites `key`; returns `true` if the key is new.
  pub fn set(&mut self, key: &str, value: V) -> bool {
    if self.capacity() == 0 || (self.len + 1) as f64 > self.capacity() as f64 * MAX_LOAD {
      let capacity = if self.capacity() < INITIAL_CAPACITY {
        INITIAL_CAPACITY
      } else {
        self.capacity() * 2
      };
      self.grow(capacity);
    }
    let index = Self::find_slot(&self.slots, key);
    let is_new = !matches!(self.slots[index], Slot::Occupied(..));
    if is_new {
      self.len += 1;
    }
    self.slots[index] = Slot::Occupied(key.into(), value);
    is_new
  }

  pub fn get(&self, key: &str) -> Option<&V> {
    if self.is_empty() {
      return None;
    }
    match &self.slots[Self::find_slot(&self.slots, key)] {
      Slot::Occupied(_, value) => Some(value),
      _ => None,
    }
  }

  pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
    if self.is_empty() {
      return None;
    }
    let index = Self::find_slot(&self.slots, key);
    match &mut self.slots[index] {
      Slot::Occupied(_, value) => Some(value),
      _ => None,
    }
  }

  pub fn contains(&self, key: &str) -> bool {
    self.get(key).is_some()
  }

  pub fn delete(&mut self, key: &str) -> bool {
    if self.is_empty() {
      return false;
    }
    let index = Self::find_slot(&self.slots, key);
    if matches!(self.slots[index], Slot::Occupied(..)) {
      self.slots[index] = Slot::Tombstone;
      self.len -= 1;
      true
    } else {
      false
    }
  }
}

/// FNV-1a, the same hash used by the table this spec was distilled from.
fn hash_str(s: &str) -> u32 {
  let mut hash: u32 = 2166136261;
  for byte in s.as_bytes() {
    hash ^= *byte as u32;
    hash = hash.wrapping_mul(16777619);
  }
  hash
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn set_get_roundtrip() {
    let mut t = Table::new();
    assert!(t.set("a", 1));
    assert!(t.set("b", 2));
    assert!(!t.set("a", 3));
    assert_eq!(t.get("a"), Some(&3));
    assert_eq!(t.get("b"), Some(&2));
    assert_eq!(t.get("missing"), None);
  }

  #[test]
  fn delete_leaves_tombstone_not_empty() {
    let mut t: Table<i32> = Table::new();
    t.set("a", 1);
    t.set("b", 2);
    assert!(t.delete("a"));
    // `b` must still be reachable even if it probed past `a`'s slot.
    assert_eq!(t.get("b"), Some(&2));
    assert_eq!(t.get("a"), None);
    assert!(!t.delete("a"));
  }

  #[test]
  fn grows_before_exceeding_load_factor() {
    let mut t = Table::new();
    for i in 0..100 {
      t.set(&format!("key{i}"), i);
    }
    assert_eq!(t.len(), 100);
    for i in 0..100 {
      assert_eq!(t.get(&format!("key{i}")), Some(&i));
    }
  }

  #[test]
  fn reinsert_after_delete_reuses_tombstone() {
    let mut t = Table::new();
    t.set("a", 1);
    t.delete("a");
    assert!(t.set("a", 2));
    assert_eq!(t.get("a"), Some(&2));
  }
}
