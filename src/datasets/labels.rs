use std::{
    collections::{BTreeMap, BTreeSet},
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Maps label strings to class indices and back. Classes are sorted, so the same label set
/// always produces the same indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct LabelEncoder {
    classes: Vec<String>,
    index: BTreeMap<String, usize>,
}

impl LabelEncoder {
    /// Collect the distinct labels
    pub fn fit<'a>(labels: impl IntoIterator<Item = &'a str>) -> Self {
        let classes: BTreeSet<&str> = labels.into_iter().map(str::trim).collect();

        classes
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>()
            .into()
    }

    /// The class index of a label
    pub fn encode(&self, label: &str) -> Option<usize> {
        self.index.get(label.trim()).copied()
    }

    /// The label of a class index
    pub fn decode(&self, class: usize) -> Option<&str> {
        self.classes.get(class).map(String::as_str)
    }

    /// The labels, in class index order
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Number of classes
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether there are no classes
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Write the `index,label` class file
    pub fn write_class_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut writer = csv::Writer::from_path(path).map_err(|e| Error::write(path, e))?;

        writer
            .write_record(["index", "label"])
            .map_err(|e| Error::write(path, e))?;

        for (index, label) in self.classes.iter().enumerate() {
            writer
                .write_record([index.to_string().as_str(), label.as_str()])
                .map_err(|e| Error::write(path, e))?;
        }

        writer.flush().map_err(|e| Error::write(path, e))
    }
}

impl From<Vec<String>> for LabelEncoder {
    fn from(classes: Vec<String>) -> Self {
        let index = invert_map(classes.iter().cloned().enumerate());

        Self { classes, index }
    }
}

impl From<LabelEncoder> for Vec<String> {
    fn from(encoder: LabelEncoder) -> Self {
        encoder.classes
    }
}

/// Invert a map by swapping keys and values
fn invert_map<K, V, MK, MV>(original: MK) -> MV
where
    MK: IntoIterator<Item = (K, V)>,
    MV: FromIterator<(V, K)>,
{
    original
        .into_iter()
        .map(|(key, value)| (value, key))
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_fit_sorts_and_deduplicates() {
        let encoder = LabelEncoder::fit(["sports", "arts", "sports ", "news"]);

        assert_eq!(encoder.classes(), ["arts", "news", "sports"]);
        assert_eq!(encoder.encode("sports"), Some(2));
        assert_eq!(encoder.encode("weather"), None);
        assert_eq!(encoder.decode(1), Some("news"));
        assert_eq!(encoder.decode(3), None);
    }

    #[test]
    fn test_serializes_as_class_list() {
        let encoder = LabelEncoder::fit(["b", "a"]);

        let json = serde_json::to_string(&encoder).unwrap();
        let restored: LabelEncoder = serde_json::from_str(&json).unwrap();

        assert_eq!(json, r#"["a","b"]"#);
        assert_eq!(restored, encoder);
    }

    #[test]
    fn test_write_class_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("class_1.csv");

        LabelEncoder::fit(["b", "a"]).write_class_file(&path).unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "index,label\n0,a\n1,b\n"
        );
    }

    #[test]
    fn test_class_file_in_missing_dir_is_a_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("class_1.csv");

        let result = LabelEncoder::fit(["a"]).write_class_file(&path);

        assert!(matches!(result, Err(Error::Write { path: failed, .. }) if failed == path));
    }
}
