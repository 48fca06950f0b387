//! Identifier interning.
//!
//! Every identifier and string literal in a program is stored once in a
//! process-wide registry, so that equality, hashing, and ordering of
//! symbols are index comparisons rather than string comparisons.
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

lazy_static! {
    static ref REGISTRY: Mutex<Registry> = Mutex::new(Registry::default());
}

#[derive(Debug, Default)]
struct Registry {
    names: Vec<String>,
    ids: HashMap<String, u32>,
}

impl Registry {
    fn intern(&mut self, name: &str) -> u32 {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }

        let id = self.names.len() as u32;
        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), id);
        id
    }

    fn text(&self, id: u32) -> Option<&str> {
        self.names.get(id as usize).map(String::as_str)
    }

    fn clear(&mut self) {
        self.names.clear();
        self.ids.clear();
    }
}

/// An interned identifier. Two symbols are equal iff their strings are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u32);

impl Symbol {
    /// Returns the unique symbol for `name`, registering it on first use.
    pub fn intern(name: &str) -> Symbol {
        Symbol(REGISTRY.lock().expect("symbol registry poisoned").intern(name))
    }

    /// The interned text, for diagnostics. Once [`release_all`] has run the
    /// text is gone; the symbol stays valid for equality comparison only.
    pub fn text(&self) -> String {
        REGISTRY
            .lock()
            .expect("symbol registry poisoned")
            .text(self.0)
            .unwrap_or("<released>")
            .to_string()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text())
    }
}

/// Releases every interned string. Intended for process shutdown.
pub fn release_all() {
    REGISTRY.lock().expect("symbol registry poisoned").clear();
}
