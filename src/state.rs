//! # Versioned state objects consumed by trigger rules.
//!
//! [`StateStore`] holds named state objects, each carrying a monotonically
//! increasing version. The owner bumps the version on every semantically
//! meaningful update — even when the new value equals the old one — which is
//! what turns rule polling into edge-triggered evaluation: an evaluator
//! compares versions instead of re-reading values.
//!
//! Values are stored as `Rc<dyn Any>` so rules can downcast to their own
//! concrete types with [`StateStore::fetch`].

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

struct Entry {
    version: u64,
    value: Rc<dyn Any>,
}

/// Clonable handle to a set of named, versioned state objects.
///
/// Versions start at `1` on first insert and increase by one per
/// [`put`](StateStore::put) or [`touch`](StateStore::touch).
#[derive(Clone, Default)]
pub struct StateStore {
    inner: Rc<RefCell<HashMap<String, Entry>>>,
}

impl StateStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an object and bumps its version.
    pub fn put(&self, name: impl Into<String>, value: impl Any) {
        let mut map = self.inner.borrow_mut();
        let entry = map.entry(name.into());
        let entry = entry.or_insert_with(|| Entry {
            version: 0,
            value: Rc::new(()),
        });
        entry.version += 1;
        entry.value = Rc::new(value);
    }

    /// Bumps an object's version without replacing its value.
    ///
    /// No-op when the object is absent.
    pub fn touch(&self, name: &str) {
        if let Some(entry) = self.inner.borrow_mut().get_mut(name) {
            entry.version += 1;
        }
    }

    /// Removes an object. Returns `true` when it existed.
    pub fn remove(&self, name: &str) -> bool {
        self.inner.borrow_mut().remove(name).is_some()
    }

    /// Returns `true` when the object exists.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.borrow().contains_key(name)
    }

    /// Current version of an object, if present.
    pub fn version(&self, name: &str) -> Option<u64> {
        self.inner.borrow().get(name).map(|e| e.version)
    }

    /// Untyped value of an object, if present.
    pub fn get(&self, name: &str) -> Option<Rc<dyn Any>> {
        self.inner.borrow().get(name).map(|e| e.value.clone())
    }

    /// Typed value of an object; `None` when absent or of another type.
    pub fn fetch<T: Any>(&self, name: &str) -> Option<Rc<T>> {
        self.get(name)?.downcast::<T>().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_bumps_version_from_one() {
        let store = StateStore::new();
        store.put("ship", 3u32);
        assert_eq!(store.version("ship"), Some(1));
        store.put("ship", 4u32);
        assert_eq!(store.version("ship"), Some(2));
    }

    #[test]
    fn touch_bumps_without_value_change() {
        let store = StateStore::new();
        store.touch("ship"); // absent: no-op
        assert_eq!(store.version("ship"), None);

        store.put("ship", 9u32);
        store.touch("ship");
        assert_eq!(store.version("ship"), Some(2));
        assert_eq!(*store.fetch::<u32>("ship").unwrap(), 9);
    }

    #[test]
    fn fetch_rejects_wrong_type() {
        let store = StateStore::new();
        store.put("fleet", String::from("idle"));
        assert!(store.fetch::<u32>("fleet").is_none());
        assert_eq!(*store.fetch::<String>("fleet").unwrap(), "idle");
    }

    #[test]
    fn remove_forgets_object_and_version() {
        let store = StateStore::new();
        store.put("dock", 1u8);
        assert!(store.remove("dock"));
        assert!(!store.contains("dock"));
        assert!(!store.remove("dock"));
    }
}
