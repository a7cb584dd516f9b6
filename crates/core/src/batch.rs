//! Batch file loading.
//!
//! A batch file names a workflow template, binds parameter names to
//! template locations, and lists the per-run overrides:
//!
//! ```json
//! {
//!   "parameters": {
//!     "workflow_file": "./workflows/txt2img.json",
//!     "workflow_items": { "prompt_text": "5,inputs,text", "seed": "3,inputs,seed" },
//!     "save_images": { "enabled": true, "output_directory": "./out", "filename_prefix": "cat" },
//!     "generic_prompts": { "seed": "random" }
//!   },
//!   "prompts": [ { "prompt_text": "a cat" }, { "prompt_text": "a cat", "seed": 42 } ]
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::binding::BindingTable;
use crate::error::CoreError;

/// Named overrides in file order.
pub type Overrides = Map<String, Value>;

/// Where and how produced images are saved.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SaveConfig {
    pub enabled: bool,
    pub output_directory: PathBuf,
    pub filename_prefix: String,
}

/// A fully parsed batch file.
#[derive(Debug, Clone)]
pub struct BatchSpec {
    /// Workflow template, re-read for every item.
    pub template_path: PathBuf,
    pub bindings: BindingTable,
    /// Applied to every item before the item's own overrides.
    pub generic_overrides: Option<Overrides>,
    /// Executed in this order.
    pub items: Vec<Overrides>,
    pub save: SaveConfig,
}

#[derive(Debug, Deserialize)]
struct BatchFile {
    parameters: BatchParameters,
    prompts: Vec<Overrides>,
}

#[derive(Debug, Deserialize)]
struct BatchParameters {
    workflow_file: PathBuf,
    workflow_items: Map<String, Value>,
    save_images: SaveConfig,
    #[serde(default)]
    generic_prompts: Option<Overrides>,
}

impl BatchSpec {
    /// Read and parse the batch file at `path`.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Config(format!("Cannot read batch file '{}': {e}", path.display()))
        })?;
        Self::from_json(&text)
    }

    /// Parse a batch file from JSON text.
    ///
    /// Fails on a malformed `workflow_items` entry and on any override
    /// name that `workflow_items` does not bind.
    pub fn from_json(text: &str) -> Result<Self, CoreError> {
        let file: BatchFile = serde_json::from_str(text)
            .map_err(|e| CoreError::Config(format!("Invalid batch file: {e}")))?;
        let params = file.parameters;

        let encoded = params
            .workflow_items
            .iter()
            .map(|(name, raw)| {
                raw.as_str().map(|s| (name.as_str(), s)).ok_or_else(|| {
                    CoreError::Config(format!("workflow_items['{name}'] must be a string"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let bindings = BindingTable::from_encoded(encoded)?;

        let spec = Self {
            template_path: params.workflow_file,
            bindings,
            generic_overrides: params.generic_prompts,
            items: file.prompts,
            save: params.save_images,
        };
        spec.check_bindings()?;
        Ok(spec)
    }

    /// Ensure every override name, generic or per item, is bound.
    fn check_bindings(&self) -> Result<(), CoreError> {
        self.generic_overrides
            .iter()
            .chain(self.items.iter())
            .flat_map(|overrides| overrides.keys())
            .try_for_each(|name| self.bindings.resolve(name).map(|_| ()))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;
    use crate::workflow::ParamLocation;

    const BATCH: &str = r#"{
        "parameters": {
            "workflow_file": "./workflows/txt2img.json",
            "workflow_items": {
                "prompt_text": "5,inputs,text",
                "seed": "3,inputs,seed",
                "steps": "3,inputs,steps"
            },
            "save_images": {
                "enabled": true,
                "output_directory": "./out",
                "filename_prefix": "cat"
            },
            "generic_prompts": {"steps": 25}
        },
        "prompts": [
            {"prompt_text": "a cat", "seed": "random"},
            {"prompt_text": "a tabby cat"},
            {"seed": 42}
        ]
    }"#;

    #[test]
    fn parses_full_batch() {
        let spec = BatchSpec::from_json(BATCH).unwrap();

        assert_eq!(spec.template_path, PathBuf::from("./workflows/txt2img.json"));
        assert_eq!(spec.bindings.len(), 3);
        assert_eq!(
            spec.bindings.resolve("seed").unwrap(),
            &ParamLocation::new("3", "inputs", "seed")
        );
        assert_eq!(spec.generic_overrides.as_ref().unwrap()["steps"], json!(25));
        assert_eq!(
            spec.save,
            SaveConfig {
                enabled: true,
                output_directory: PathBuf::from("./out"),
                filename_prefix: "cat".to_string(),
            }
        );
    }

    #[test]
    fn items_keep_file_order() {
        let spec = BatchSpec::from_json(BATCH).unwrap();

        assert_eq!(spec.items.len(), 3);
        assert_eq!(spec.items[0]["prompt_text"], json!("a cat"));
        assert_eq!(spec.items[1]["prompt_text"], json!("a tabby cat"));
        assert_eq!(spec.items[2]["seed"], json!(42));

        let keys: Vec<&str> = spec.items[0].keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["prompt_text", "seed"]);
    }

    #[test]
    fn generic_prompts_are_optional() {
        let text = r#"{
            "parameters": {
                "workflow_file": "wf.json",
                "workflow_items": {"prompt_text": "5,inputs,text"},
                "save_images": {"enabled": false, "output_directory": ".", "filename_prefix": "x"}
            },
            "prompts": [{"prompt_text": "a"}]
        }"#;
        let spec = BatchSpec::from_json(text).unwrap();
        assert!(spec.generic_overrides.is_none());
        assert!(!spec.save.enabled);
    }

    #[test]
    fn malformed_workflow_item_is_config_error() {
        let text = BATCH.replace("\"3,inputs,steps\"", "\"3,inputs\"");
        assert_matches!(BatchSpec::from_json(&text), Err(CoreError::Config(msg)) if msg.contains("steps"));
    }

    #[test]
    fn non_string_workflow_item_is_config_error() {
        let text = BATCH.replace("\"3,inputs,steps\"", "[3, \"inputs\", \"steps\"]");
        assert_matches!(BatchSpec::from_json(&text), Err(CoreError::Config(_)));
    }

    #[test]
    fn unbound_item_parameter_is_rejected() {
        let text = BATCH.replace("{\"seed\": 42}", "{\"cfg\": 7}");
        assert_matches!(
            BatchSpec::from_json(&text),
            Err(CoreError::UnknownParameter(name)) if name == "cfg"
        );
    }

    #[test]
    fn unbound_generic_parameter_is_rejected() {
        let text = BATCH.replace("{\"steps\": 25}", "{\"sampler\": \"euler\"}");
        assert_matches!(
            BatchSpec::from_json(&text),
            Err(CoreError::UnknownParameter(name)) if name == "sampler"
        );
    }

    #[test]
    fn missing_prompts_is_config_error() {
        let text = r#"{"parameters": {
            "workflow_file": "wf.json",
            "workflow_items": {},
            "save_images": {"enabled": false, "output_directory": ".", "filename_prefix": "x"}
        }}"#;
        assert_matches!(BatchSpec::from_json(text), Err(CoreError::Config(_)));
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(BATCH.as_bytes()).unwrap();

        let spec = BatchSpec::load(file.path()).unwrap();
        assert_eq!(spec.items.len(), 3);
    }

    #[test]
    fn load_missing_file_is_config_error() {
        assert_matches!(
            BatchSpec::load(Path::new("/no/such/batch.json")),
            Err(CoreError::Config(_))
        );
    }
}
