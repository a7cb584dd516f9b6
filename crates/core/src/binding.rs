//! Parameter bindings and template patching.
//!
//! A [`BindingTable`] maps the logical parameter names used in a batch
//! file (`"prompt_text"`, `"seed"`, ...) to a [`ParamLocation`] inside
//! the job graph. [`TemplateApplier`] writes named overrides through
//! that table, in order, so later writes to the same location win.

use std::collections::HashMap;
use std::ops::RangeInclusive;

use rand::Rng;
use serde_json::Value;

use crate::error::CoreError;
use crate::workflow::{JobGraph, ParamLocation};

/// Literal value that requests a freshly drawn seed.
pub const RANDOM_SEED_SENTINEL: &str = "random";

/// Parameter names eligible for random seed substitution.
pub const SEED_PARAMETERS: &[&str] = &["seed", "noise_seed"];

/// Range random seeds are drawn from.
pub const RANDOM_SEED_RANGE: RangeInclusive<i64> = 1..=999_999_999_999;

/// Read-only mapping from parameter name to graph location.
#[derive(Debug, Clone, Default)]
pub struct BindingTable {
    bindings: HashMap<String, ParamLocation>,
}

impl BindingTable {
    /// Build a table from `name -> "node_id,category,field"` entries.
    ///
    /// Any malformed entry fails the whole table.
    pub fn from_encoded<'a, I>(entries: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let bindings = entries
            .into_iter()
            .map(|(name, raw)| {
                ParamLocation::parse(raw)
                    .map(|loc| (name.to_string(), loc))
                    .map_err(|e| CoreError::Config(format!("workflow_items['{name}']: {e}")))
            })
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(Self { bindings })
    }

    /// Look up where `name` lives in the job graph.
    pub fn resolve(&self, name: &str) -> Result<&ParamLocation, CoreError> {
        self.bindings
            .get(name)
            .ok_or_else(|| CoreError::UnknownParameter(name.to_string()))
    }

    /// Number of bound parameter names.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Which layer of a batch file an override set comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideLayer {
    /// `parameters.generic_prompts`, applied to every item first.
    Generic,
    /// One entry of `prompts`.
    Item,
}

impl OverrideLayer {
    fn as_str(self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::Item => "item",
        }
    }
}

/// Applies named overrides to a job graph through a [`BindingTable`].
pub struct TemplateApplier<'a> {
    bindings: &'a BindingTable,
}

impl<'a> TemplateApplier<'a> {
    pub fn new(bindings: &'a BindingTable) -> Self {
        Self { bindings }
    }

    /// Apply `overrides` in order, drawing random seeds from the thread RNG.
    pub fn apply<'v, I>(
        &self,
        graph: &mut JobGraph,
        overrides: I,
        layer: OverrideLayer,
    ) -> Result<(), CoreError>
    where
        I: IntoIterator<Item = (&'v str, &'v Value)>,
    {
        self.apply_with_rng(graph, overrides, layer, &mut rand::rng())
    }

    /// Apply `overrides` in order using the given RNG for seed substitution.
    pub fn apply_with_rng<'v, I, R>(
        &self,
        graph: &mut JobGraph,
        overrides: I,
        layer: OverrideLayer,
        rng: &mut R,
    ) -> Result<(), CoreError>
    where
        I: IntoIterator<Item = (&'v str, &'v Value)>,
        R: Rng + ?Sized,
    {
        for (name, value) in overrides {
            let loc = self.bindings.resolve(name)?;
            let value = resolve_value(name, value, rng);

            tracing::info!(
                layer = layer.as_str(),
                parameter = name,
                node_id = %loc.node_id,
                category = %loc.category,
                field = %loc.field,
                value = %value,
                "Setting workflow value",
            );

            graph.set(loc, value)?;
        }
        Ok(())
    }
}

/// Return the value to write for `name`, substituting a random seed
/// when a seed parameter carries the [`RANDOM_SEED_SENTINEL`].
pub fn resolve_value<R: Rng + ?Sized>(name: &str, value: &Value, rng: &mut R) -> Value {
    if SEED_PARAMETERS.contains(&name) && value.as_str() == Some(RANDOM_SEED_SENTINEL) {
        let seed = rng.random_range(RANDOM_SEED_RANGE);
        tracing::debug!(parameter = name, seed, "Drew random seed");
        Value::from(seed)
    } else {
        value.clone()
    }
}
