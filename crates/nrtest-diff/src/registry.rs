use crate::{ArrayDiff, Comparator, DiffError, Encoding, ExactDiff, NtupleDiff, NullDiff};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Builds a comparator from `(candidate, reference)` paths.
pub type Constructor = Arc<dyn Fn(&Path, &Path) -> Result<Comparator, DiffError> + Send + Sync>;

/// Tag to comparator-constructor map.
///
/// Passed explicitly to whoever needs it. An unknown tag is an error, never
/// a silent fallback.
#[derive(Clone, Default)]
pub struct Registry {
    constructors: BTreeMap<String, Constructor>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("tags", &self.constructors.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry pre-populated with every built-in comparator:
    ///
    /// | tag | comparator |
    /// |-----|-----------|
    /// | `default`, `exact`, `eps` | byte-for-byte |
    /// | `null`, `none` | presence only |
    /// | `array`, `csv_array`, `bin_array` | elementwise relative deviation |
    /// | `ntuple`, `csv_ntuple`, `bin_ntuple` | column mean/std deviation |
    ///
    /// [`DurationDiff`](crate::DurationDiff) has no tag. It compares two
    /// recorded wall-clock times rather than a pair of files, so the suite
    /// comparison builds it directly when duration checking is enabled.
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();

        for tag in ["default", "exact", "eps"] {
            reg.register(tag, |c, r| {
                Ok(Comparator::Boolean(Box::new(ExactDiff::new(c, r)?)))
            });
        }
        for tag in ["null", "none"] {
            reg.register(tag, |c, r| {
                Ok(Comparator::Boolean(Box::new(NullDiff::new(c, r)?)))
            });
        }

        let encodings = [
            ("", Encoding::Whitespace),
            ("csv_", Encoding::Delimited(',')),
            ("bin_", Encoding::RawBinary),
        ];
        for (prefix, enc) in encodings {
            reg.register(format!("{prefix}array"), move |c, r| {
                Ok(Comparator::Numeric(Box::new(ArrayDiff::new(c, r, enc)?)))
            });
            reg.register(format!("{prefix}ntuple"), move |c, r| {
                Ok(Comparator::Numeric(Box::new(NtupleDiff::new(c, r, enc)?)))
            });
        }

        reg
    }

    /// Add or replace the constructor for `tag`.
    pub fn register<F>(&mut self, tag: impl Into<String>, ctor: F)
    where
        F: Fn(&Path, &Path) -> Result<Comparator, DiffError> + Send + Sync + 'static,
    {
        self.constructors.insert(tag.into(), Arc::new(ctor));
    }

    pub fn resolve(&self, tag: &str) -> Result<Constructor, DiffError> {
        self.constructors
            .get(tag)
            .cloned()
            .ok_or_else(|| DiffError::UnknownTag(tag.to_string()))
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.constructors.contains_key(tag)
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    /// Tags from `tags` with no registered constructor, deduplicated and sorted.
    pub fn unresolved<'a>(&self, tags: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let mut missing: Vec<String> = tags
            .into_iter()
            .filter(|t| !self.contains(t))
            .map(str::to_string)
            .collect();
        missing.sort();
        missing.dedup();
        missing
    }

    /// Resolve `tag` and build its comparator for one file pair.
    pub fn compare(
        &self,
        tag: &str,
        candidate: &Path,
        reference: &Path,
    ) -> Result<Comparator, DiffError> {
        let ctor = self.resolve(tag)?;
        ctor(candidate, reference)
    }
}
