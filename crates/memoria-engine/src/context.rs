// SPDX-FileCopyrightText: 2026 Memoria Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Working context: ambient project/client/file metadata injected into
//! subsequent stores. One logical context per engine instance.

use serde_json::Value;

use memoria_core::types::Metadata;

/// Ambient metadata for the current work session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkingContext {
    pub project: Option<String>,
    pub client: Option<String>,
    pub file: Option<String>,
}

impl WorkingContext {
    /// Inject context keys into `metadata` without overwriting keys the
    /// caller set explicitly.
    pub fn merge_into(&self, metadata: &mut Metadata) {
        let pairs = [
            ("project", &self.project),
            ("client", &self.client),
            ("file", &self.file),
        ];
        for (key, value) in pairs {
            if let Some(v) = value {
                metadata
                    .entry(key.to_string())
                    .or_insert_with(|| Value::String(v.clone()));
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.project.is_none() && self.client.is_none() && self.file.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_fills_missing_keys() {
        let context = WorkingContext {
            project: Some("memoria".into()),
            client: Some("acme".into()),
            file: None,
        };
        let mut metadata = Metadata::new();
        context.merge_into(&mut metadata);

        assert_eq!(metadata.get("project"), Some(&json!("memoria")));
        assert_eq!(metadata.get("client"), Some(&json!("acme")));
        assert!(!metadata.contains_key("file"));
    }

    #[test]
    fn explicit_keys_are_not_overwritten() {
        let context = WorkingContext {
            project: Some("ambient".into()),
            client: None,
            file: None,
        };
        let mut metadata = Metadata::new();
        metadata.insert("project".into(), json!("explicit"));
        context.merge_into(&mut metadata);

        assert_eq!(metadata.get("project"), Some(&json!("explicit")));
    }

    #[test]
    fn empty_context_is_a_noop() {
        let context = WorkingContext::default();
        assert!(context.is_empty());
        let mut metadata = Metadata::new();
        context.merge_into(&mut metadata);
        assert!(metadata.is_empty());
    }
}
