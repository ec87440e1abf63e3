use fxhash::FxHashMap;
use glob::Pattern;
use log::{debug, warn};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Per-run accumulator of parsed results, keyed by sample name.
///
/// Insertion order is preserved for display; duplicate sample names overwrite
/// the stored value (last write wins) while keeping the first-seen position.
#[derive(Debug, Default)]
pub struct Dataset<T> {
    order: Vec<String>,
    samples: FxHashMap<String, T>,
    duplicates: usize,
}

impl<T> Dataset<T> {
    pub fn new() -> Self {
        Dataset {
            order: Vec::new(),
            samples: FxHashMap::default(),
            duplicates: 0,
        }
    }

    /// Inserts a sample's parsed result, returning true when it overwrote an
    /// earlier result for the same name.
    pub fn insert(&mut self, sample: &str, value: T) -> bool {
        let replaced = self.samples.insert(sample.to_string(), value).is_some();
        if replaced {
            self.duplicates += 1;
            warn!("Duplicate sample name found, overwriting: {sample}");
        } else {
            self.order.push(sample.to_string());
        }
        replaced
    }

    /// Drops every sample matching the ignore-list from the dataset.
    pub fn retain_not_ignored(&mut self, ignore: &IgnoreList) {
        let samples = &mut self.samples;
        self.order.retain(|sample| {
            if ignore.matches(sample) {
                debug!("Dropping ignored sample: {sample}");
                samples.remove(sample);
                false
            } else {
                true
            }
        });
    }

    pub fn get(&self, sample: &str) -> Option<&T> {
        self.samples.get(sample)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.order
            .iter()
            .map(|sample| (sample.as_str(), &self.samples[sample.as_str()]))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// An empty final dataset is the "nothing to report" signal.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }
}

impl<T: Serialize> Serialize for Dataset<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.order.len()))?;
        for (sample, value) in self.iter() {
            map.serialize_entry(sample, value)?;
        }
        map.end()
    }
}

/// Configured sample-name exclusions, matched exactly or as globs.
#[derive(Debug, Default)]
pub struct IgnoreList {
    entries: Vec<String>,
    patterns: Vec<Pattern>,
}

impl IgnoreList {
    pub fn new(entries: &[String]) -> Self {
        let mut patterns = Vec::new();
        for entry in entries {
            match Pattern::new(entry) {
                Ok(pattern) => patterns.push(pattern),
                Err(err) => warn!("Skipping invalid sample ignore pattern '{entry}': {err}"),
            }
        }
        IgnoreList {
            entries: entries.to_vec(),
            patterns,
        }
    }

    pub fn matches(&self, sample: &str) -> bool {
        self.entries.iter().any(|entry| entry == sample)
            || self.patterns.iter().any(|pattern| pattern.matches(sample))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_order() {
        let mut data = Dataset::new();
        assert!(!data.insert("sample_b", 1));
        assert!(!data.insert("sample_a", 2));
        let samples: Vec<&str> = data.iter().map(|(sample, _)| sample).collect();
        assert_eq!(samples, vec!["sample_b", "sample_a"]);
        assert_eq!(data.len(), 2);
        assert_eq!(data.duplicates(), 0);
    }

    #[test]
    fn test_duplicate_overwrites_with_last_value() {
        let mut data = Dataset::new();
        data.insert("sample_a", 1);
        data.insert("sample_b", 2);
        assert!(data.insert("sample_a", 3));
        assert_eq!(data.len(), 2);
        assert_eq!(data.get("sample_a"), Some(&3));
        assert_eq!(data.duplicates(), 1);
        // the duplicate keeps its first-seen display position
        let samples: Vec<&str> = data.iter().map(|(sample, _)| sample).collect();
        assert_eq!(samples, vec!["sample_a", "sample_b"]);
    }

    #[test]
    fn test_ignore_exact_match() {
        let ignore = IgnoreList::new(&["control".to_string()]);
        let mut data = Dataset::new();
        data.insert("control", 1);
        data.insert("treated", 2);
        data.retain_not_ignored(&ignore);
        assert_eq!(data.len(), 1);
        assert!(data.get("control").is_none());
        assert!(data.get("treated").is_some());
    }

    #[test]
    fn test_ignore_glob_match() {
        let ignore = IgnoreList::new(&["undetermined_*".to_string()]);
        let mut data = Dataset::new();
        data.insert("undetermined_L001", 1);
        data.insert("undetermined_L002", 2);
        data.insert("sample_1", 3);
        data.retain_not_ignored(&ignore);
        let samples: Vec<&str> = data.iter().map(|(sample, _)| sample).collect();
        assert_eq!(samples, vec!["sample_1"]);
    }

    #[test]
    fn test_ignore_invalid_pattern_is_dropped() {
        let ignore = IgnoreList::new(&["[".to_string()]);
        assert!(!ignore.matches("sample_1"));
        // the raw entry still matches exactly
        assert!(ignore.matches("["));
    }

    #[test]
    fn test_empty_dataset_signals_nothing_to_report() {
        let ignore = IgnoreList::new(&["*".to_string()]);
        let mut data = Dataset::new();
        data.insert("sample_1", 1);
        data.retain_not_ignored(&ignore);
        assert!(data.is_empty());
    }

    #[test]
    fn test_serializes_in_insertion_order() {
        let mut data = Dataset::new();
        data.insert("zulu", 1);
        data.insert("alpha", 2);
        let json = serde_json::to_string(&data).unwrap();
        assert_eq!(json, r#"{"zulu":1,"alpha":2}"#);
    }
}
