//! Jobs: step chains applied lazily.
//!
//! A job is a recipe, not a result. Chaining `fetch`/`generate`/`process`
//! calls only records steps; nothing runs until something actually needs
//! content. Every content accessor takes `&mut self` for exactly that
//! reason: reading [`data`](Job::data) may trigger the whole pipeline.
//!
//! ## Forking
//!
//! Chaining methods take `&self` and return a new job, so one source job
//! can branch into many variants:
//!
//! ```no_run
//! # use urlpipe::App;
//! # use serde_json::json;
//! # let app = App::builder().build().unwrap();
//! let original = app.fetch_file("/data/photo.jpg");
//! let thumb = original.process("resize", vec![json!("40x30")]);
//! let grey = original.process("greyscale", vec![]);
//! ```
//!
//! A fork copies the recorded steps, the application cursor, and the
//! current content object, so work done on the parent is not repeated;
//! superseded intermediates stay with the parent.
//!
//! ## Application
//!
//! Applying walks the unapplied tail of the step list. Each step produces
//! a fresh [`TempObject`]; the one it replaces is retained until
//! [`close`](Job::close) so processors spooling content to disk don't pull
//! files out from under a caller holding a path. A step failure leaves the
//! cursor where it was: the successful prefix stays applied.

use bytes::Bytes;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::app::App;
use crate::datastore::{DataStoreError, StoreOptions};
use crate::fetch::FetchError;
use crate::registry::{PluginError, RegistryError};
use crate::serial::{self, DeserializeError};
use crate::sha::ShaError;
use crate::steps::Step;
use crate::temp_object::TempObject;
use crate::url_attributes::{UrlAttributes, split_name};

#[derive(Error, Debug)]
pub enum JobError {
    #[error("tried to process '{0}' but the job has no content yet")]
    NothingToProcess(String),
    #[error("job has no content")]
    NoContent,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("datastore error: {0}")]
    DataStore(#[from] DataStoreError),
    #[error("{0}")]
    Registry(#[from] RegistryError),
    #[error("step failed: {0}")]
    Plugin(#[from] PluginError),
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),
}

pub struct Job {
    app: App,
    steps: Vec<Step>,
    /// How many steps from the front have been applied.
    applied_count: usize,
    current: Option<TempObject>,
    /// Superseded content objects, kept alive until [`close`](Self::close).
    retained: Vec<TempObject>,
    url_attrs: UrlAttributes,
    /// Meta written before the job has produced any content. Folded into
    /// the first content object's meta, which wins on key clashes.
    pending_meta: Map<String, Value>,
}

impl Job {
    pub(crate) fn new(app: App) -> Self {
        Self {
            app,
            steps: Vec::new(),
            applied_count: 0,
            current: None,
            retained: Vec::new(),
            url_attrs: UrlAttributes::new(),
            pending_meta: Map::new(),
        }
    }

    pub(crate) fn from_tuples(app: App, tuples: &[Vec<Value>]) -> Result<Self, DeserializeError> {
        let mut job = Self::new(app);
        for tuple in tuples {
            job.push_step(Step::from_tuple(tuple)?);
        }
        Ok(job)
    }

    /// Rebuild a job from its JSON step array (the decoded token payload).
    pub fn from_a(app: &App, steps: &Value) -> Result<Self, DeserializeError> {
        Self::from_tuples(app.clone(), &serial::tuples_from_value(steps)?)
    }

    /// Rebuild a job from a token.
    pub fn deserialize(app: &App, token: &str) -> Result<Self, DeserializeError> {
        Self::from_tuples(app.clone(), &serial::decode(token)?)
    }

    // =========================================================================
    // Building the recipe
    // =========================================================================

    /// Append a step in place. Source steps that know their filename
    /// update the URL attributes immediately, so URLs work pre-apply.
    pub fn push_step(&mut self, step: Step) {
        step.on_push(&mut self.url_attrs);
        self.steps.push(step);
    }

    pub fn push_fetch(&mut self, uid: impl Into<String>) {
        self.push_step(Step::fetch(uid));
    }

    pub fn push_fetch_file(&mut self, path: impl Into<PathBuf>) {
        self.push_step(Step::fetch_file(path));
    }

    pub fn push_fetch_url(&mut self, url: impl Into<String>) {
        self.push_step(Step::fetch_url(url));
    }

    pub fn push_generate(&mut self, name: impl Into<String>, args: Vec<Value>) {
        self.push_step(Step::generate(name, args));
    }

    pub fn push_process(&mut self, name: impl Into<String>, args: Vec<Value>) {
        self.push_step(Step::process(name, args));
    }

    pub fn fetch(&self, uid: impl Into<String>) -> Job {
        self.branch(Step::fetch(uid))
    }

    pub fn fetch_file(&self, path: impl Into<PathBuf>) -> Job {
        self.branch(Step::fetch_file(path))
    }

    pub fn fetch_url(&self, url: impl Into<String>) -> Job {
        self.branch(Step::fetch_url(url))
    }

    pub fn generate(&self, name: impl Into<String>, args: Vec<Value>) -> Job {
        self.branch(Step::generate(name, args))
    }

    pub fn process(&self, name: impl Into<String>, args: Vec<Value>) -> Job {
        self.branch(Step::process(name, args))
    }

    fn branch(&self, step: Step) -> Job {
        let mut fork = self.clone();
        fork.push_step(step);
        fork
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// True once every recorded step has run.
    pub fn is_applied(&self) -> bool {
        self.applied_count == self.steps.len()
    }

    pub fn url_attributes(&self) -> &UrlAttributes {
        &self.url_attrs
    }

    pub fn url_attributes_mut(&mut self) -> &mut UrlAttributes {
        &mut self.url_attrs
    }

    // =========================================================================
    // Application and content accessors
    // =========================================================================

    /// Run every unapplied step. Already-applied steps never re-run, so
    /// calling this repeatedly is free.
    pub fn apply(&mut self) -> Result<(), JobError> {
        while self.applied_count < self.steps.len() {
            let step = &self.steps[self.applied_count];
            debug!(
                step = step.step_name(),
                position = self.applied_count,
                "applying step"
            );
            let mut next = step.apply(&self.app, self.current.as_mut(), &mut self.url_attrs)?;
            if !self.pending_meta.is_empty() {
                let mut merged = std::mem::take(&mut self.pending_meta);
                for (key, value) in std::mem::take(&mut next.meta) {
                    merged.insert(key, value);
                }
                next.meta = merged;
            }
            if let Some(superseded) = self.current.replace(next) {
                self.retained.push(superseded);
            }
            self.applied_count += 1;
        }
        Ok(())
    }

    fn applied_content(&mut self) -> Result<&mut TempObject, JobError> {
        self.apply()?;
        self.current.as_mut().ok_or(JobError::NoContent)
    }

    /// The job's content, applying any outstanding steps first.
    pub fn data(&mut self) -> Result<Bytes, JobError> {
        Ok(self.applied_content()?.data()?)
    }

    /// Content size in bytes.
    pub fn size(&mut self) -> Result<u64, JobError> {
        Ok(self.applied_content()?.size()?)
    }

    /// A filesystem path holding the content, spooling it out if it only
    /// lives in memory. Valid until the job is closed or applied further.
    pub fn path(&mut self) -> Result<&Path, JobError> {
        Ok(self.applied_content()?.path()?)
    }

    /// The content's filename, as reported by whatever produced it.
    pub fn name(&mut self) -> Result<Option<String>, JobError> {
        Ok(self.applied_content()?.name.clone())
    }

    /// Content metadata. On a job with no steps this reads the job-level
    /// bucket that will seed the first content object.
    pub fn meta(&mut self) -> Result<&Map<String, Value>, JobError> {
        self.apply()?;
        match self.current.as_ref() {
            Some(content) => Ok(&content.meta),
            None => Ok(&self.pending_meta),
        }
    }

    pub fn meta_mut(&mut self) -> Result<&mut Map<String, Value>, JobError> {
        self.apply()?;
        match self.current.as_mut() {
            Some(content) => Ok(&mut content.meta),
            None => Ok(&mut self.pending_meta),
        }
    }

    /// Run a registered analyser against the applied content.
    pub fn analyse(&mut self, name: &str, args: &[Value]) -> Result<Value, JobError> {
        let analyser = self.app.analysers().get(name)?;
        let content = self.applied_content()?;
        Ok(analyser.call(content, args)?)
    }

    /// Apply and persist the result. Returns the datastore uid.
    ///
    /// When the caller declares no MIME type, one is derived from the
    /// content name's extension through the app's MIME table.
    pub fn store(&mut self, options: &StoreOptions) -> Result<String, JobError> {
        self.apply()?;
        let content = self.current.as_ref().ok_or(JobError::NoContent)?;
        let mut options = options.clone();
        if options.mime_type.is_none()
            && let Some(name) = content.name.as_deref()
            && let Some(ext) = split_name(name).1
            && let Some(mime) = self.app.mime_type_for(ext)
        {
            options.mime_type = Some(mime);
        }
        Ok(self.app.datastore().store(content, &options)?)
    }

    /// Release temp files held by this job: the retained intermediates and
    /// the current content's spool. Safe to call more than once. Content
    /// can still be read afterwards; it re-spools on demand.
    pub fn close(&mut self) {
        for mut superseded in self.retained.drain(..) {
            superseded.close();
        }
        if let Some(content) = self.current.as_mut() {
            content.close();
        }
    }

    // =========================================================================
    // Serialization and URLs
    // =========================================================================

    /// The job as a JSON step array, the payload inside a token.
    pub fn to_a(&self) -> Vec<Vec<Value>> {
        self.steps.iter().map(Step::to_tuple).collect()
    }

    /// The job as a URL-safe token.
    pub fn serialize(&self) -> String {
        serial::encode(&self.to_a())
    }

    /// Protection digest over this job's token and the app secret.
    pub fn sha(&self) -> String {
        crate::sha::token_sha(&self.serialize(), self.app.secret())
    }

    /// Check a digest presented by a request against this job.
    pub fn validate_sha(&self, candidate: Option<&str>) -> Result<&Self, ShaError> {
        crate::sha::validate_sha(&self.serialize(), self.app.secret(), candidate)?;
        Ok(self)
    }

    /// The job's servable URL, built without applying anything. A job with
    /// no steps has nothing to serve and no URL.
    pub fn url(&self) -> Option<String> {
        self.url_with(&[])
    }

    /// Like [`url`](Self::url), with per-call parameter overrides. The
    /// reserved keys `host` and `path_prefix` replace the configured ones;
    /// everything else shadows URL attributes.
    pub fn url_with(&self, overrides: &[(&str, &str)]) -> Option<String> {
        if self.steps.is_empty() {
            return None;
        }
        Some(self.app.url_for(self, overrides))
    }
}

/// Forking. The clone gets the steps, the cursor, and a handle on the
/// current content; the retained history stays with the original, and the
/// clone spools to its own temp file if it ever needs a path.
impl Clone for Job {
    fn clone(&self) -> Self {
        Self {
            app: self.app.clone(),
            steps: self.steps.clone(),
            applied_count: self.applied_count,
            current: self.current.clone(),
            retained: Vec::new(),
            url_attrs: self.url_attrs.clone(),
            pending_meta: self.pending_meta.clone(),
        }
    }
}
