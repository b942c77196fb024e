//! The output bundle an emitter writes finalized files into.

use crate::file::AssetSource;
use crate::pattern::extname;
use indexmap::IndexMap;
use rustc_hash::FxHashSet;

/// A finalized asset in the output bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputAsset {
    pub file_name: String,
    pub name: Option<String>,
    pub original_file_name: Option<String>,
    pub source: AssetSource,
    /// Whether the asset can be dropped when no code references it.
    pub needs_code_reference: bool,
}

/// A chunk in the output bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputChunk {
    pub file_name: String,
    pub name: String,
    pub code: String,
    pub exports: Vec<String>,
    pub map: Option<String>,
    pub sourcemap_file_name: Option<String>,
    pub facade_module_id: Option<String>,
    pub is_entry: bool,
    pub is_dynamic_entry: bool,
    pub module_ids: Vec<String>,
    pub imports: Vec<String>,
    pub dynamic_imports: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleEntry {
    /// A fixed file name reserved before its content is available.
    Reserved,
    Asset(OutputAsset),
    Chunk(OutputChunk),
}

impl BundleEntry {
    pub fn as_asset(&self) -> Option<&OutputAsset> {
        match self {
            BundleEntry::Asset(asset) => Some(asset),
            _ => None,
        }
    }

    pub fn as_chunk(&self) -> Option<&OutputChunk> {
        match self {
            BundleEntry::Chunk(chunk) => Some(chunk),
            _ => None,
        }
    }
}

/// File name to entry map for one build output.
///
/// Names are compared case-sensitively. A second set tracks lowercased names
/// so collisions that only differ by case can be reported.
#[derive(Debug, Clone, Default)]
pub struct OutputBundle {
    entries: IndexMap<String, BundleEntry>,
    lowercase_names: FxHashSet<String>,
}

impl OutputBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, file_name: &str) -> bool {
        self.entries.contains_key(file_name)
    }

    pub fn get(&self, file_name: &str) -> Option<&BundleEntry> {
        self.entries.get(file_name)
    }

    pub(crate) fn get_mut(&mut self, file_name: &str) -> Option<&mut BundleEntry> {
        self.entries.get_mut(file_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BundleEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn assets(&self) -> impl Iterator<Item = &OutputAsset> {
        self.entries.values().filter_map(BundleEntry::as_asset)
    }

    pub fn chunks(&self) -> impl Iterator<Item = &OutputChunk> {
        self.entries.values().filter_map(BundleEntry::as_chunk)
    }

    /// Whether another entry has the same name ignoring letter case.
    pub fn has_case_conflict(&self, file_name: &str) -> bool {
        !self.entries.contains_key(file_name)
            && self.lowercase_names.contains(&file_name.to_lowercase())
    }

    /// Insert or replace an entry.
    ///
    /// Returns `true` when the name collides with a different entry that only
    /// differs by letter case.
    pub fn insert(&mut self, file_name: String, entry: BundleEntry) -> bool {
        let conflict = self.has_case_conflict(&file_name);
        self.lowercase_names.insert(file_name.to_lowercase());
        self.entries.insert(file_name, entry);
        conflict
    }

    /// Remove an entry, e.g. from a `generate_bundle` hook.
    pub fn remove(&mut self, file_name: &str) -> Option<BundleEntry> {
        let removed = self.entries.shift_remove(file_name)?;
        let lower = file_name.to_lowercase();
        if !self.entries.keys().any(|k| k.to_lowercase() == lower) {
            self.lowercase_names.remove(&lower);
        }
        Some(removed)
    }

    /// Return `name`, or `name` with a numeric suffix before the extension
    /// (`name2.ext`, `name3.ext`, ...) if it is already taken.
    pub fn make_unique(&self, name: &str) -> String {
        if !self.entries.contains_key(name) {
            return name.to_string();
        }
        let ext = extname(name);
        let stem = &name[..name.len() - ext.len()];
        let mut index = 1usize;
        loop {
            index += 1;
            let candidate = format!("{}{}{}", stem, index, ext);
            if !self.entries.contains_key(&candidate) {
                return candidate;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(name: &str) -> BundleEntry {
        BundleEntry::Asset(OutputAsset {
            file_name: name.to_string(),
            name: None,
            original_file_name: None,
            source: AssetSource::from("x"),
            needs_code_reference: false,
        })
    }

    #[test]
    fn test_make_unique_suffixes_before_extension() {
        let mut bundle = OutputBundle::new();
        assert_eq!(bundle.make_unique("logo.png"), "logo.png");
        bundle.insert("logo.png".into(), asset("logo.png"));
        assert_eq!(bundle.make_unique("logo.png"), "logo2.png");
        bundle.insert("logo2.png".into(), asset("logo2.png"));
        assert_eq!(bundle.make_unique("logo.png"), "logo3.png");
        assert_eq!(bundle.make_unique("LICENSE"), "LICENSE");
    }

    #[test]
    fn test_make_unique_is_case_sensitive() {
        let mut bundle = OutputBundle::new();
        bundle.insert("Foo.png".into(), asset("Foo.png"));
        assert_eq!(bundle.make_unique("foo.png"), "foo.png");
    }

    #[test]
    fn test_insert_reports_case_conflict() {
        let mut bundle = OutputBundle::new();
        assert!(!bundle.insert("Foo.png".into(), asset("Foo.png")));
        assert!(bundle.insert("foo.png".into(), asset("foo.png")));
        // Replacing the same name is not a conflict.
        assert!(!bundle.insert("foo.png".into(), asset("foo.png")));
        assert_eq!(bundle.len(), 2);
    }

    #[test]
    fn test_remove_keeps_other_case_variant() {
        let mut bundle = OutputBundle::new();
        bundle.insert("Foo.png".into(), asset("Foo.png"));
        bundle.insert("foo.png".into(), asset("foo.png"));
        bundle.remove("foo.png");
        assert!(bundle.has_case_conflict("FOO.png"));
        bundle.remove("Foo.png");
        assert!(!bundle.has_case_conflict("FOO.png"));
        assert!(bundle.is_empty());
    }
}
