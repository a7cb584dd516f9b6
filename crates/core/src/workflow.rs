//! In-memory ComfyUI job graph.
//!
//! A job graph is the server's "API format" workflow: a JSON object
//! keyed by node ID, where each node holds categorized fields such as
//! `inputs` (widget values and links) alongside scalar metadata like
//! `class_type`. [`JobGraph`] wraps that object and only allows writes
//! through a [`ParamLocation`], so a binding can never silently create
//! a node, a category or a field.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;

/// Address of one field inside a job graph: `graph[node_id][category][field]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamLocation {
    pub node_id: String,
    pub category: String,
    pub field: String,
}

impl ParamLocation {
    pub fn new(
        node_id: impl Into<String>,
        category: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            category: category.into(),
            field: field.into(),
        }
    }

    /// Parse the batch-file encoding `"node_id,category,field"`.
    ///
    /// Exactly three non-empty, comma-separated parts are required;
    /// surrounding whitespace on each part is ignored.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
        match parts.as_slice() {
            [node_id, category, field]
                if !node_id.is_empty() && !category.is_empty() && !field.is_empty() =>
            {
                Ok(Self::new(*node_id, *category, *field))
            }
            _ => Err(CoreError::Config(format!(
                "Malformed workflow item '{raw}': expected 'node_id,category,field'"
            ))),
        }
    }
}

impl fmt::Display for ParamLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.node_id, self.category, self.field)
    }
}

/// A job graph loaded from a workflow template.
///
/// Every batch item loads its own instance; graphs are never shared
/// between items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobGraph(Map<String, Value>);

impl JobGraph {
    /// Parse a job graph from JSON text. The top level must be an object.
    pub fn from_json(text: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read and parse a fresh copy of the template at `path`.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Config(format!(
                "Cannot read workflow file '{}': {e}",
                path.display()
            ))
        })?;
        Self::from_json(&text)
    }

    /// Node IDs in template order.
    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Read the value at `loc`, if every level exists.
    pub fn get(&self, loc: &ParamLocation) -> Option<&Value> {
        self.0
            .get(&loc.node_id)?
            .get(&loc.category)?
            .get(&loc.field)
    }

    /// Write `value` at `loc`, returning the value it replaced.
    ///
    /// Every level must already exist in the template.
    pub fn set(&mut self, loc: &ParamLocation, value: Value) -> Result<Value, CoreError> {
        let node = self
            .0
            .get_mut(&loc.node_id)
            .ok_or_else(|| CoreError::UnknownNode {
                node_id: loc.node_id.clone(),
            })?;

        let fields = node
            .get_mut(&loc.category)
            .and_then(Value::as_object_mut)
            .ok_or_else(|| CoreError::UnknownCategory {
                node_id: loc.node_id.clone(),
                category: loc.category.clone(),
            })?;

        let slot = fields
            .get_mut(&loc.field)
            .ok_or_else(|| CoreError::UnknownField {
                node_id: loc.node_id.clone(),
                category: loc.category.clone(),
                field: loc.field.clone(),
            })?;
        Ok(std::mem::replace(slot, value))
    }

    /// Borrow the underlying JSON object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    fn sample_graph() -> JobGraph {
        JobGraph::from_json(
            r#"{
                "3": {"class_type": "KSampler", "inputs": {"seed": 1, "steps": 20, "model": ["4", 0]}},
                "5": {"class_type": "CLIPTextEncode", "inputs": {"text": "a dog"}}
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn parse_location() {
        let loc = ParamLocation::parse("3,inputs,seed").unwrap();
        assert_eq!(loc, ParamLocation::new("3", "inputs", "seed"));
    }

    #[test]
    fn parse_location_trims_parts() {
        let loc = ParamLocation::parse(" 3 , inputs , seed ").unwrap();
        assert_eq!(loc, ParamLocation::new("3", "inputs", "seed"));
    }

    #[test]
    fn parse_location_rejects_two_parts() {
        assert_matches!(ParamLocation::parse("3,inputs"), Err(CoreError::Config(_)));
    }

    #[test]
    fn parse_location_rejects_four_parts() {
        assert_matches!(
            ParamLocation::parse("3,inputs,seed,extra"),
            Err(CoreError::Config(_))
        );
    }

    #[test]
    fn parse_location_rejects_empty_part() {
        assert_matches!(ParamLocation::parse("3,,seed"), Err(CoreError::Config(_)));
    }

    #[test]
    fn display_round_trips_encoding() {
        let loc = ParamLocation::new("5", "inputs", "text");
        assert_eq!(loc.to_string(), "5,inputs,text");
    }

    #[test]
    fn set_overwrites_existing_field() {
        let mut graph = sample_graph();
        let loc = ParamLocation::new("5", "inputs", "text");

        let previous = graph.set(&loc, json!("a cat")).unwrap();

        assert_eq!(previous, json!("a dog"));
        assert_eq!(graph.get(&loc), Some(&json!("a cat")));
    }

    #[test]
    fn set_leaves_other_fields_untouched() {
        let mut graph = sample_graph();
        let before = graph.clone();

        graph
            .set(&ParamLocation::new("3", "inputs", "steps"), json!(30))
            .unwrap();

        assert_eq!(graph.as_map()["5"], before.as_map()["5"]);
        assert_eq!(graph.as_map()["3"]["inputs"]["seed"], json!(1));
        assert_eq!(graph.as_map()["3"]["class_type"], json!("KSampler"));
    }

    #[test]
    fn set_rejects_unknown_field() {
        let mut graph = sample_graph();
        let before = graph.clone();

        let result = graph.set(&ParamLocation::new("3", "inputs", "sede"), json!(42));

        assert_matches!(
            result,
            Err(CoreError::UnknownField { node_id, category, field })
                if node_id == "3" && category == "inputs" && field == "sede"
        );
        assert_eq!(graph, before);
    }

    #[test]
    fn set_rejects_unknown_node() {
        let mut graph = sample_graph();
        let result = graph.set(&ParamLocation::new("99", "inputs", "seed"), json!(1));
        assert_matches!(result, Err(CoreError::UnknownNode { node_id }) if node_id == "99");
    }

    #[test]
    fn set_rejects_unknown_category() {
        let mut graph = sample_graph();
        let result = graph.set(&ParamLocation::new("3", "widgets", "seed"), json!(1));
        assert_matches!(result, Err(CoreError::UnknownCategory { .. }));
    }

    #[test]
    fn set_rejects_scalar_category() {
        let mut graph = sample_graph();
        let result = graph.set(&ParamLocation::new("3", "class_type", "x"), json!(1));
        assert_matches!(result, Err(CoreError::UnknownCategory { .. }));
    }

    #[test]
    fn node_order_is_preserved() {
        let graph = JobGraph::from_json(r#"{"10": {}, "2": {}, "7": {}}"#).unwrap();
        let ids: Vec<&str> = graph.node_ids().collect();
        assert_eq!(ids, vec!["10", "2", "7"]);
    }

    #[test]
    fn non_object_template_is_rejected() {
        assert_matches!(JobGraph::from_json("[1, 2, 3]"), Err(CoreError::Json(_)));
    }

    #[test]
    fn load_missing_file_is_config_error() {
        let result = JobGraph::load(Path::new("/definitely/not/here.json"));
        assert_matches!(result, Err(CoreError::Config(_)));
    }
}
