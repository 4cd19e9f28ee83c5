use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque per-dialog state a dumper hands back from `end_dialog`.
pub type CustomData = Map<String, Value>;

/// Resumability state for one dialog.
///
/// `last_id` is the ordering key of the newest message exported by the last
/// run that finished the dialog. It only ever moves forward.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DumpProgress {
    #[serde(default)]
    pub last_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_data: Option<CustomData>,
}

impl DumpProgress {
    pub fn new(last_id: Option<i64>) -> Self {
        Self {
            last_id,
            custom_data: None,
        }
    }

    /// Default freshness policy: a message is fresh unless a previous
    /// successful export already reached its key.
    pub fn is_fresh(&self, id: i64) -> bool {
        match self.last_id {
            None => true,
            Some(last) => id > last,
        }
    }

    /// Build the record that follows this one after a finished dialog run.
    ///
    /// `newest_dumped` is the highest key dumped during the run, if any.
    /// `custom_data` replaces the previous mapping only when the dumper
    /// returned one.
    pub fn advance(&self, newest_dumped: Option<i64>, custom_data: Option<CustomData>) -> Self {
        let last_id = match (self.last_id, newest_dumped) {
            (Some(prev), Some(new)) => Some(prev.max(new)),
            (prev, new) => prev.or(new),
        };
        Self {
            last_id,
            custom_data: custom_data.or_else(|| self.custom_data.clone()),
        }
    }

    /// Read one value out of the dumper's custom data
    pub fn custom(&self, key: &str) -> Option<&Value> {
        self.custom_data.as_ref().and_then(|data| data.get(key))
    }
}
