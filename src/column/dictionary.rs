//! Dictionaries of categorical columns.
//!
//! A dictionary is an ordered list of distinct values. Slot 0 is reserved for
//! the missing value. While its buffer is still open the dictionary grows
//! through [`DictionaryBuilder`], which keeps a concurrent reverse map from
//! value to index; freezing hands the finished list to the column.

use ahash::AHashMap;
use parking_lot::{Mutex, RwLock};

use crate::value::Value;

/// The frozen, ordered list of distinct values of a categorical column.
///
/// Shared immutably between the column and any readers or projections.
#[derive(Debug, Clone)]
pub struct Dictionary {
    values: Vec<Option<Value>>,
}

impl Dictionary {
    /// Builds a dictionary from its ordered slots; slot 0 stands for the
    /// missing value and must be `None`.
    pub fn from_values(values: Vec<Option<Value>>) -> Dictionary {
        debug_assert!(matches!(values.first(), None | Some(None)));
        Dictionary { values }
    }

    /// Number of slots, including the reserved missing slot.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of distinct non-missing values.
    pub fn different_values(&self) -> usize {
        self.values.len().saturating_sub(1)
    }

    /// Value at `index`; `None` for the missing slot.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index).and_then(|v| v.as_ref())
    }

    /// Iterates over all slots in index order, missing slot first.
    pub fn iter(&self) -> impl Iterator<Item = Option<&Value>> {
        self.values.iter().map(|v| v.as_ref())
    }
}

/// Write-side dictionary with a concurrent reverse map.
///
/// Lookups take the read lock only; the first insert of a value serializes on
/// the write lock with a re-check, so concurrent writers agree on one index
/// per value.
#[derive(Debug)]
pub(crate) struct DictionaryBuilder {
    values: Mutex<Vec<Option<Value>>>,
    lookup: RwLock<AHashMap<Value, u32>>,
    max_index: u32,
}

impl DictionaryBuilder {
    pub fn new(max_index: u32) -> DictionaryBuilder {
        DictionaryBuilder {
            values: Mutex::new(vec![None]),
            lookup: RwLock::new(AHashMap::new()),
            max_index,
        }
    }

    /// Rebuilds the write-side state from a frozen dictionary.
    pub fn from_dictionary(dictionary: &Dictionary, max_index: u32) -> DictionaryBuilder {
        let mut lookup = AHashMap::with_capacity(dictionary.different_values());
        let mut values = Vec::with_capacity(dictionary.len().max(1));
        values.push(None);
        for index in 1..dictionary.len() {
            let value = dictionary.get(index).cloned();
            if let Some(ref v) = value {
                lookup.insert(v.clone(), index as u32);
            }
            values.push(value);
        }
        DictionaryBuilder {
            values: Mutex::new(values),
            lookup: RwLock::new(lookup),
            max_index,
        }
    }

    /// Index of `value`, appending it if absent.
    ///
    /// Returns `None` when the dictionary already holds the format's maximum
    /// number of distinct values; the dictionary is left unchanged in that
    /// case.
    pub fn lookup_or_insert(&self, value: &Value) -> Option<u32> {
        if let Some(&index) = self.lookup.read().get(value) {
            return Some(index);
        }
        let mut lookup = self.lookup.write();
        // Re-check: another writer may have inserted while we waited.
        if let Some(&index) = lookup.get(value) {
            return Some(index);
        }
        let mut values = self.values.lock();
        let index = values.len() as u32;
        if index > self.max_index {
            return None;
        }
        values.push(Some(value.clone()));
        lookup.insert(value.clone(), index);
        Some(index)
    }

    /// Value at `index`, cloned out of the growing list.
    pub fn get(&self, index: usize) -> Option<Value> {
        self.values.lock().get(index).and_then(|v| v.clone())
    }

    pub fn different_values(&self) -> usize {
        self.values.lock().len() - 1
    }

    pub fn into_dictionary(self) -> Dictionary {
        Dictionary::from_values(self.values.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_zero_is_missing() {
        let builder = DictionaryBuilder::new(255);
        assert_eq!(builder.different_values(), 0);
        let dictionary = builder.into_dictionary();
        assert_eq!(dictionary.len(), 1);
        assert_eq!(dictionary.get(0), None);
    }

    #[test]
    fn insert_is_idempotent() {
        let builder = DictionaryBuilder::new(255);
        let a = builder.lookup_or_insert(&Value::text("a"));
        let b = builder.lookup_or_insert(&Value::text("b"));
        let a_again = builder.lookup_or_insert(&Value::text("a"));
        assert_eq!(a, Some(1));
        assert_eq!(b, Some(2));
        assert_eq!(a_again, a);
        assert_eq!(builder.different_values(), 2);
    }

    #[test]
    fn overflow_leaves_dictionary_untouched() {
        let builder = DictionaryBuilder::new(3);
        for i in 0..3 {
            assert!(builder.lookup_or_insert(&Value::Int(i)).is_some());
        }
        assert_eq!(builder.lookup_or_insert(&Value::Int(99)), None);
        assert_eq!(builder.different_values(), 3);
        // Existing values still resolve after a failed insert.
        assert_eq!(builder.lookup_or_insert(&Value::Int(0)), Some(1));
    }

    #[test]
    fn round_trip_through_frozen_dictionary() {
        let builder = DictionaryBuilder::new(255);
        builder.lookup_or_insert(&Value::text("x"));
        builder.lookup_or_insert(&Value::text("y"));
        let dictionary = builder.into_dictionary();
        let rebuilt = DictionaryBuilder::from_dictionary(&dictionary, 255);
        assert_eq!(rebuilt.lookup_or_insert(&Value::text("y")), Some(2));
        assert_eq!(rebuilt.lookup_or_insert(&Value::text("z")), Some(3));
    }

    #[test]
    fn concurrent_inserts_agree() {
        use std::sync::Arc;
        let builder = Arc::new(DictionaryBuilder::new(255));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let builder = Arc::clone(&builder);
                std::thread::spawn(move || {
                    (0..100)
                        .map(|i| builder.lookup_or_insert(&Value::Int(i % 10)).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let results: Vec<Vec<u32>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for other in &results[1..] {
            assert_eq!(&results[0], other);
        }
        assert_eq!(builder.different_values(), 10);
    }
}
