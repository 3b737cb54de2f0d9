//! The five pipeline step kinds.
//!
//! Steps are data: what to do, not the doing. [`Step::apply`] runs one
//! against the app's collaborators and produces the next content object.
//! The set is closed on purpose — the abbreviation table, the wire shape,
//! and application behavior live in exhaustive matches, and extensibility
//! happens inside `generate`/`process` through the registries rather than
//! through new step kinds.
//!
//! | Step | Abbreviation | Arguments |
//! |------|--------------|-----------|
//! | `fetch` | `f` | datastore uid |
//! | `fetch_file` | `ff` | filesystem path |
//! | `fetch_url` | `fu` | remote URL |
//! | `generate` | `g` | generator name, then its arguments |
//! | `process` | `p` | processor name, then its arguments |

use serde_json::{Map, Value};
use std::path::PathBuf;

use crate::app::App;
use crate::fetch;
use crate::job::JobError;
use crate::registry::StepOutput;
use crate::serial::{DeserializeError, invalid};
use crate::temp_object::TempObject;
use crate::url_attributes::UrlAttributes;

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Pull content out of the datastore by uid.
    Fetch { uid: String },
    /// Wrap a local file, read lazily.
    FetchFile { path: PathBuf },
    /// Download content over HTTP.
    FetchUrl { url: String },
    /// Produce content from arguments alone via a registered generator.
    Generate { name: String, args: Vec<Value> },
    /// Transform the previous step's content via a registered processor.
    Process { name: String, args: Vec<Value> },
}

impl Step {
    pub fn fetch(uid: impl Into<String>) -> Self {
        Self::Fetch { uid: uid.into() }
    }

    pub fn fetch_file(path: impl Into<PathBuf>) -> Self {
        Self::FetchFile { path: path.into() }
    }

    pub fn fetch_url(url: impl Into<String>) -> Self {
        Self::FetchUrl { url: url.into() }
    }

    pub fn generate(name: impl Into<String>, args: Vec<Value>) -> Self {
        Self::Generate {
            name: name.into(),
            args,
        }
    }

    pub fn process(name: impl Into<String>, args: Vec<Value>) -> Self {
        Self::Process {
            name: name.into(),
            args,
        }
    }

    pub fn step_name(&self) -> &'static str {
        match self {
            Step::Fetch { .. } => "fetch",
            Step::FetchFile { .. } => "fetch_file",
            Step::FetchUrl { .. } => "fetch_url",
            Step::Generate { .. } => "generate",
            Step::Process { .. } => "process",
        }
    }

    /// Short tag used in the serialized form.
    pub fn abbreviation(&self) -> &'static str {
        match self {
            Step::Fetch { .. } => "f",
            Step::FetchFile { .. } => "ff",
            Step::FetchUrl { .. } => "fu",
            Step::Generate { .. } => "g",
            Step::Process { .. } => "p",
        }
    }

    /// Wire form: `[abbreviation, args...]`.
    pub fn to_tuple(&self) -> Vec<Value> {
        match self {
            Step::Fetch { uid } => vec![Value::from("f"), Value::from(uid.as_str())],
            Step::FetchFile { path } => vec![
                Value::from("ff"),
                Value::from(path.to_string_lossy().into_owned()),
            ],
            Step::FetchUrl { url } => vec![Value::from("fu"), Value::from(url.as_str())],
            Step::Generate { name, args } => tuple_with_args("g", name, args),
            Step::Process { name, args } => tuple_with_args("p", name, args),
        }
    }

    /// Parse the wire form back into a step, validating the abbreviation
    /// and the per-kind argument shape.
    pub fn from_tuple(tuple: &[Value]) -> Result<Self, DeserializeError> {
        let (head, args) = tuple
            .split_first()
            .ok_or_else(|| invalid("step array is empty"))?;
        let abbrev = head
            .as_str()
            .ok_or_else(|| invalid("step abbreviation must be a string"))?;
        match abbrev {
            "f" => Ok(Self::fetch(single_string(abbrev, args)?)),
            "ff" => Ok(Self::fetch_file(single_string(abbrev, args)?)),
            "fu" => Ok(Self::fetch_url(single_string(abbrev, args)?)),
            "g" => {
                let (name, rest) = named_args(abbrev, args)?;
                Ok(Self::generate(name, rest))
            }
            "p" => {
                let (name, rest) = named_args(abbrev, args)?;
                Ok(Self::process(name, rest))
            }
            other => Err(invalid(format!("unknown step abbreviation '{other}'"))),
        }
    }

    /// Side effect of joining a job, before any application: source steps
    /// that already know their filename advertise it to the URL attributes,
    /// so URLs can be built without running the pipeline.
    pub(crate) fn on_push(&self, attrs: &mut UrlAttributes) {
        match self {
            Step::FetchFile { path } => {
                if let Some(name) = path.file_name() {
                    attrs.set_name(name.to_string_lossy());
                }
            }
            Step::FetchUrl { url } => {
                if let Ok(parsed) = fetch::parse_url(url)
                    && let Some(name) = fetch::name_from_url(&parsed)
                {
                    attrs.set_name(name);
                }
            }
            _ => {}
        }
    }

    /// Run this step. Source steps ignore `previous`; `process` requires it.
    pub(crate) fn apply(
        &self,
        app: &App,
        previous: Option<&mut TempObject>,
        attrs: &mut UrlAttributes,
    ) -> Result<TempObject, JobError> {
        match self {
            Step::Fetch { uid } => {
                let retrieved = app.datastore().retrieve(uid)?;
                let mut obj = TempObject::from_bytes(retrieved.content);
                obj.name = retrieved
                    .meta
                    .get("name")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                obj.meta = retrieved.meta;
                Ok(obj)
            }
            Step::FetchFile { path } => {
                let mut obj = TempObject::from_file(path.clone());
                obj.name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned());
                Ok(obj)
            }
            Step::FetchUrl { url } => {
                let bytes = app.fetcher().get(url)?;
                let mut obj = TempObject::from_bytes(bytes);
                obj.name = fetch::parse_url(url)
                    .ok()
                    .and_then(|parsed| fetch::name_from_url(&parsed));
                Ok(obj)
            }
            Step::Generate { name, args } => {
                let generator = app.generators().get(name)?;
                let output = generator.call(args)?;
                Ok(object_from_output(output, None, Map::new()))
            }
            Step::Process { name, args } => {
                let prev = previous.ok_or_else(|| JobError::NothingToProcess(name.clone()))?;
                let processor = app.processors().get(name)?;
                let inherited_name = prev.name.clone();
                let inherited_meta = prev.meta.clone();
                let output = processor.call(prev, args, attrs)?;
                Ok(object_from_output(output, inherited_name, inherited_meta))
            }
        }
    }
}

/// Translate a long step name (the deprecated wire form spells them out)
/// to its abbreviation.
pub(crate) fn abbreviation_for_step_name(step_name: &str) -> Option<&'static str> {
    match step_name {
        "fetch" => Some("f"),
        "fetch_file" => Some("ff"),
        "fetch_url" => Some("fu"),
        "generate" => Some("g"),
        "process" => Some("p"),
        _ => None,
    }
}

fn tuple_with_args(abbrev: &str, name: &str, args: &[Value]) -> Vec<Value> {
    let mut tuple = Vec::with_capacity(2 + args.len());
    tuple.push(Value::from(abbrev));
    tuple.push(Value::from(name));
    tuple.extend(args.iter().cloned());
    tuple
}

fn single_string(abbrev: &str, args: &[Value]) -> Result<String, DeserializeError> {
    match args {
        [Value::String(arg)] => Ok(arg.clone()),
        _ => Err(invalid(format!(
            "step '{abbrev}' takes exactly one string argument"
        ))),
    }
}

fn named_args(abbrev: &str, args: &[Value]) -> Result<(String, Vec<Value>), DeserializeError> {
    let (name, rest) = args
        .split_first()
        .ok_or_else(|| invalid(format!("step '{abbrev}' needs a name")))?;
    let name = name
        .as_str()
        .ok_or_else(|| invalid(format!("step '{abbrev}' name must be a string")))?;
    Ok((name.to_string(), rest.to_vec()))
}

/// New content object from a callable's output, inheriting name and meta
/// from the predecessor where the output doesn't supply its own.
fn object_from_output(
    output: StepOutput,
    inherited_name: Option<String>,
    inherited_meta: Map<String, Value>,
) -> TempObject {
    let mut obj = TempObject::from_bytes(output.content);
    obj.name = output.name.or(inherited_name);
    let mut meta = inherited_meta;
    for (key, value) in output.meta {
        meta.insert(key, value);
    }
    obj.meta = meta;
    obj
}
