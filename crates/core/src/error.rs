#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown parameter: '{0}' is not bound in workflow_items")]
    UnknownParameter(String),

    #[error("Node '{node_id}' not found in workflow")]
    UnknownNode { node_id: String },

    #[error("Node '{node_id}' has no '{category}' object")]
    UnknownCategory { node_id: String, category: String },

    #[error("Field '{field}' not found in '{category}' of node '{node_id}'")]
    UnknownField {
        node_id: String,
        category: String,
        field: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
