//! Named callables a job can invoke: generators, processors, analysers.

use bytes::Bytes;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::temp_object::TempObject;
use crate::url_attributes::UrlAttributes;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("generator not registered: {0}")]
    GeneratorNotFound(String),
    #[error("processor not registered: {0}")]
    ProcessorNotFound(String),
    #[error("analyser not registered: {0}")]
    AnalyserNotFound(String),
}

/// Failure raised by a registered callable.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("{0}")]
    Failed(String),
}

impl PluginError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::InvalidArguments(message.into())
    }
}

/// What a generator or processor hands back: new content, optionally with a
/// name and extra metadata to merge into the produced object.
#[derive(Debug, Clone)]
pub struct StepOutput {
    pub content: Bytes,
    pub name: Option<String>,
    pub meta: Map<String, Value>,
}

impl StepOutput {
    pub fn new(content: impl Into<Bytes>) -> Self {
        Self {
            content: content.into(),
            name: None,
            meta: Map::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }
}

/// Produces content from arguments alone (no input content).
pub trait Generator: Send + Sync {
    fn call(&self, args: &[Value]) -> Result<StepOutput, PluginError>;
}

impl<F> Generator for F
where
    F: Fn(&[Value]) -> Result<StepOutput, PluginError> + Send + Sync,
{
    fn call(&self, args: &[Value]) -> Result<StepOutput, PluginError> {
        self(args)
    }
}

// Opaque Debug: registered callables are often closures, which carry no
// Debug of their own, yet `Result<Arc<dyn ...>, _>` must be Debug for
// callers (and tests) to `unwrap_err` lookups.
impl fmt::Debug for dyn Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<generator>")
    }
}

/// Transforms existing content into new content. Gets mutable access to the
/// input object (so it can ask for a file path) and to the job's URL
/// attributes (so e.g. a format conversion can update the extension).
pub trait Processor: Send + Sync {
    fn call(
        &self,
        content: &mut TempObject,
        args: &[Value],
        attrs: &mut UrlAttributes,
    ) -> Result<StepOutput, PluginError>;
}

impl<F> Processor for F
where
    F: Fn(&mut TempObject, &[Value], &mut UrlAttributes) -> Result<StepOutput, PluginError>
        + Send
        + Sync,
{
    fn call(
        &self,
        content: &mut TempObject,
        args: &[Value],
        attrs: &mut UrlAttributes,
    ) -> Result<StepOutput, PluginError> {
        self(content, args, attrs)
    }
}

impl fmt::Debug for dyn Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<processor>")
    }
}

/// Inspects content and reports a value without producing new content.
pub trait Analyser: Send + Sync {
    fn call(&self, content: &mut TempObject, args: &[Value]) -> Result<Value, PluginError>;
}

impl<F> Analyser for F
where
    F: Fn(&mut TempObject, &[Value]) -> Result<Value, PluginError> + Send + Sync,
{
    fn call(&self, content: &mut TempObject, args: &[Value]) -> Result<Value, PluginError> {
        self(content, args)
    }
}

impl fmt::Debug for dyn Analyser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<analyser>")
    }
}

/// Which registry a lookup failure came from. Each kind maps to its own
/// error variant so callers can tell a missing processor from a missing
/// generator without string matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryKind {
    Generator,
    Processor,
    Analyser,
}

impl RegistryKind {
    fn not_found(self, name: &str) -> RegistryError {
        match self {
            RegistryKind::Generator => RegistryError::GeneratorNotFound(name.to_string()),
            RegistryKind::Processor => RegistryError::ProcessorNotFound(name.to_string()),
            RegistryKind::Analyser => RegistryError::AnalyserNotFound(name.to_string()),
        }
    }
}

/// Ordered name → callable map.
pub struct Registry<T: ?Sized> {
    kind: RegistryKind,
    entries: BTreeMap<String, Arc<T>>,
}

pub type GeneratorRegistry = Registry<dyn Generator>;
pub type ProcessorRegistry = Registry<dyn Processor>;
pub type AnalyserRegistry = Registry<dyn Analyser>;

impl<T: ?Sized> Registry<T> {
    pub fn new(kind: RegistryKind) -> Self {
        Self {
            kind,
            entries: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, entry: Arc<T>) {
        self.entries.insert(name.into(), entry);
    }

    pub fn get(&self, name: &str) -> Result<Arc<T>, RegistryError> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| self.kind.not_found(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}
