use serde::{Deserialize, Serialize};

/// Options for a single [`crate::transform`] call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransformOptions {
    /// Emit a v3 source map alongside the rewritten code.
    pub source_map: bool,

    /// Leave `Promise.resolve(require("x"))` untouched so a downstream
    /// bundler can treat it as a lazy import.
    pub ignore_dynamic_require: bool,

    /// Source name recorded in the emitted map.
    pub file: Option<String>,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            source_map: false,
            ignore_dynamic_require: true,
            file: None,
        }
    }
}

impl TransformOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set source map emission.
    #[must_use]
    pub fn with_source_map(mut self, source_map: bool) -> Self {
        self.source_map = source_map;
        self
    }

    /// Set the dynamic-require exception.
    #[must_use]
    pub fn with_ignore_dynamic_require(mut self, ignore: bool) -> Self {
        self.ignore_dynamic_require = ignore;
        self
    }

    /// Set the source name used in the map.
    #[must_use]
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = TransformOptions::default();
        assert!(!opts.source_map);
        assert!(opts.ignore_dynamic_require);
        assert!(opts.file.is_none());
    }

    #[test]
    fn test_deserialize_camel_case_with_missing_keys() {
        let opts: TransformOptions = serde_json::from_str(r#"{"sourceMap": true}"#).unwrap();
        assert!(opts.source_map);
        assert!(opts.ignore_dynamic_require);

        let opts: TransformOptions =
            serde_json::from_str(r#"{"ignoreDynamicRequire": false, "file": "a.js"}"#).unwrap();
        assert!(!opts.ignore_dynamic_require);
        assert_eq!(opts.file.as_deref(), Some("a.js"));
    }

    #[test]
    fn test_builder() {
        let opts = TransformOptions::new()
            .with_source_map(true)
            .with_ignore_dynamic_require(false)
            .with_file("index.js");
        assert!(opts.source_map);
        assert!(!opts.ignore_dynamic_require);
        assert_eq!(opts.file.as_deref(), Some("index.js"));
    }
}
