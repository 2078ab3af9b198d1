// SPDX-License-Identifier: Apache-2.0

//! Persisted checkpoint layout.
//!
//! ```json
//! {"history":{"/var/log/app.log::98765":{"source":"app","offset":4096}}}
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// How far one file has been consumed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointEntry {
    /// Logical source name of the tailed file
    pub source: String,
    /// Byte offset known to be fully processed
    pub offset: u64,
}

impl CheckpointEntry {
    pub fn new(source: impl Into<String>, offset: u64) -> Self {
        Self {
            source: source.into(),
            offset,
        }
    }
}

/// Contents of the backing checkpoint file
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PersistedState {
    /// Map from file key (`path::inode`) to checkpoint entry
    #[serde(default)]
    pub history: HashMap<String, CheckpointEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_layout() {
        let mut history = HashMap::new();
        history.insert(
            "/var/log/app.log::98765".to_string(),
            CheckpointEntry::new("app", 4096),
        );
        let state = PersistedState { history };

        assert_eq!(
            serde_json::to_string(&state).unwrap(),
            r#"{"history":{"/var/log/app.log::98765":{"source":"app","offset":4096}}}"#
        );
    }

    #[test]
    fn test_missing_history_is_empty() {
        let state: PersistedState = serde_json::from_str("{}").unwrap();
        assert!(state.history.is_empty());
    }

    #[test]
    fn test_pretty_input_accepted() {
        let json = r#"{
            "history": {
                "/tmp/a.log": { "source": "a", "offset": 12 }
            }
        }"#;
        let state: PersistedState = serde_json::from_str(json).unwrap();
        assert_eq!(state.history.get("/tmp/a.log"), Some(&CheckpointEntry::new("a", 12)));
    }
}
