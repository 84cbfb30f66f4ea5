use std::collections::HashMap;
use std::fmt::{self, Debug};

use toolrun_model::ModelTool;

use super::ToolObject;
use crate::CatalogError;

pub(crate) enum Executor {
    Local(Box<dyn ToolObject>),
    /// Declared to the model, executed on the provider side.
    Provider(ModelTool),
}

/// A catalog entry as seen by the model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolDefinition {
    /// The unique tool name.
    pub name: String,
    /// What the tool does.
    pub description: String,
    /// JSON schema of the tool arguments.
    pub parameters: serde_json::Value,
    /// Whether the tool runs on the provider side.
    pub provider_executed: bool,
}

/// The closed set of tools an agent can call, keyed by name.
pub struct Catalog {
    entries: Vec<Executor>,
    index: HashMap<String, usize>,
}

impl Catalog {
    pub(crate) fn new(executors: Vec<Executor>) -> Result<Self, CatalogError> {
        let mut index = HashMap::with_capacity(executors.len());
        for (idx, executor) in executors.iter().enumerate() {
            let name = executor.name();
            if index.insert(name.to_owned(), idx).is_some() {
                return Err(CatalogError::DuplicateTool(name.to_owned()));
            }
        }
        Ok(Self {
            entries: executors,
            index,
        })
    }

    /// Returns the declarations sent to the model, in registration order.
    pub fn definitions(&self) -> Vec<ModelTool> {
        self.entries.iter().map(Executor::model_tool).collect()
    }

    /// Looks up a tool by name.
    pub fn get(&self, name: &str) -> Option<ToolDefinition> {
        let executor = &self.entries[*self.index.get(name)?];
        let ModelTool {
            name,
            description,
            parameters,
        } = executor.model_tool();
        Some(ToolDefinition {
            name,
            description,
            parameters,
            provider_executed: matches!(executor, Executor::Provider(_)),
        })
    }

    /// Returns the number of tools.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the catalog has no tools.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub(super) fn executor(&self, name: &str) -> Option<&Executor> {
        self.index.get(name).map(|idx| &self.entries[*idx])
    }
}

impl Debug for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(Executor::name))
            .finish()
    }
}

impl Executor {
    pub(super) fn name(&self) -> &str {
        match self {
            Executor::Local(tool) => tool.name(),
            Executor::Provider(tool) => &tool.name,
        }
    }

    fn model_tool(&self) -> ModelTool {
        match self {
            Executor::Local(tool) => ModelTool {
                name: tool.name().to_owned(),
                description: tool.description().to_owned(),
                parameters: tool.parameter_schema().clone(),
            },
            Executor::Provider(tool) => tool.clone(),
        }
    }
}
