//! Application wiring.
//!
//! An [`App`] bundles everything jobs need at apply time: the validated
//! configuration, the datastore, the three plugin registries, the HTTP
//! fetcher, and the parsed URL template. It is assembled once through
//! [`AppBuilder`] and then shared; [`App`] is a cheap clone-and-pass
//! handle, so every job carries one.

use mime::Mime;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::config::{AppConfig, ConfigError};
use crate::datastore::{DataStore, MemoryDataStore};
use crate::fetch::{FetchError, HttpFetcher};
use crate::job::Job;
use crate::registry::{
    Analyser, AnalyserRegistry, Generator, GeneratorRegistry, Processor, ProcessorRegistry,
    RegistryKind,
};
use crate::url_builder::{UrlParts, UrlTemplate, build_url};

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("HTTP client error: {0}")]
    Fetch(#[from] FetchError),
}

struct AppInner {
    config: AppConfig,
    template: UrlTemplate,
    datastore: Box<dyn DataStore>,
    generators: GeneratorRegistry,
    processors: ProcessorRegistry,
    analysers: AnalyserRegistry,
    mime_types: BTreeMap<String, Mime>,
    fetcher: HttpFetcher,
}

/// Shared handle on a wired application. Clones see the same datastore,
/// registries, and configuration.
#[derive(Clone)]
pub struct App {
    inner: Arc<AppInner>,
}

// Opaque Debug: the inner wiring holds dyn plugins and the datastore,
// none of which are Debug, but `Result<App, _>` must be Debug for
// callers (and tests) to `unwrap_err` a failed build.
impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App").finish_non_exhaustive()
    }
}

impl App {
    pub fn builder() -> AppBuilder {
        AppBuilder::new()
    }

    /// An empty job bound to this app. Mostly useful as a base to push
    /// steps onto; the `fetch*`/`generate` entry points cover the common
    /// single-source cases.
    pub fn new_job(&self) -> Job {
        Job::new(self.clone())
    }

    /// A job that fetches stored content by uid.
    pub fn fetch(&self, uid: impl Into<String>) -> Job {
        self.new_job().fetch(uid)
    }

    /// A job that reads a local file.
    pub fn fetch_file(&self, path: impl Into<PathBuf>) -> Job {
        self.new_job().fetch_file(path)
    }

    /// A job that downloads remote content.
    pub fn fetch_url(&self, url: impl Into<String>) -> Job {
        self.new_job().fetch_url(url)
    }

    /// A job that runs a registered generator.
    pub fn generate(&self, name: impl Into<String>, args: Vec<serde_json::Value>) -> Job {
        self.new_job().generate(name, args)
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn datastore(&self) -> &dyn DataStore {
        self.inner.datastore.as_ref()
    }

    pub fn generators(&self) -> &GeneratorRegistry {
        &self.inner.generators
    }

    pub fn processors(&self) -> &ProcessorRegistry {
        &self.inner.processors
    }

    pub fn analysers(&self) -> &AnalyserRegistry {
        &self.inner.analysers
    }

    /// Registered MIME type for a file extension, case-insensitive.
    pub fn mime_type_for(&self, ext: &str) -> Option<Mime> {
        self.inner.mime_types.get(&ext.to_ascii_lowercase()).cloned()
    }

    pub(crate) fn fetcher(&self) -> &HttpFetcher {
        &self.inner.fetcher
    }

    pub(crate) fn secret(&self) -> &str {
        &self.inner.config.secret
    }

    /// Build the URL for a job. The reserved override keys `host` and
    /// `path_prefix` replace the configured values for this call only;
    /// the rest join the template's parameter pool.
    pub(crate) fn url_for(&self, job: &Job, overrides: &[(&str, &str)]) -> String {
        let config = &self.inner.config;
        let mut host = config.url_host.as_deref();
        let mut path_prefix = config.url_path_prefix.as_deref();
        let mut rest: Vec<(&str, &str)> = Vec::with_capacity(overrides.len());
        for (key, value) in overrides {
            match *key {
                "host" => host = Some(*value),
                "path_prefix" => path_prefix = Some(*value),
                _ => rest.push((*key, *value)),
            }
        }
        let token = job.serialize();
        let sha = config.verify_urls.then(|| job.sha());
        build_url(
            &self.inner.template,
            &UrlParts {
                token: &token,
                sha: sha.as_deref(),
                attrs: job.url_attributes(),
                overrides: &rest,
                host,
                path_prefix,
            },
        )
    }
}

/// Collects configuration, plugins, and the datastore, then wires the app.
pub struct AppBuilder {
    config: AppConfig,
    datastore: Option<Box<dyn DataStore>>,
    generators: GeneratorRegistry,
    processors: ProcessorRegistry,
    analysers: AnalyserRegistry,
    mime_types: BTreeMap<String, Mime>,
}

impl AppBuilder {
    fn new() -> Self {
        Self {
            config: AppConfig::default(),
            datastore: None,
            generators: GeneratorRegistry::new(RegistryKind::Generator),
            processors: ProcessorRegistry::new(RegistryKind::Processor),
            analysers: AnalyserRegistry::new(RegistryKind::Analyser),
            mime_types: default_mime_types(),
        }
    }

    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    /// Where `store` writes and `fetch` reads. Defaults to an in-process
    /// [`MemoryDataStore`].
    pub fn datastore(mut self, datastore: impl DataStore + 'static) -> Self {
        self.datastore = Some(Box::new(datastore));
        self
    }

    /// Register a generator. Plain closures work; annotate their
    /// signature so they coerce:
    ///
    /// ```no_run
    /// # use urlpipe::{App, PluginError, StepOutput};
    /// # use serde_json::Value;
    /// let app = App::builder()
    ///     .generator("plain", |args: &[Value]| -> Result<StepOutput, PluginError> {
    ///         let text = args[0].as_str().unwrap_or_default();
    ///         Ok(StepOutput::new(text.as_bytes().to_vec()))
    ///     })
    ///     .build()
    ///     .unwrap();
    /// ```
    pub fn generator(
        mut self,
        name: impl Into<String>,
        generator: impl Generator + 'static,
    ) -> Self {
        self.generators.register(name, Arc::new(generator));
        self
    }

    pub fn processor(
        mut self,
        name: impl Into<String>,
        processor: impl Processor + 'static,
    ) -> Self {
        self.processors.register(name, Arc::new(processor));
        self
    }

    pub fn analyser(mut self, name: impl Into<String>, analyser: impl Analyser + 'static) -> Self {
        self.analysers.register(name, Arc::new(analyser));
        self
    }

    /// Map a file extension to a MIME type, replacing any default mapping.
    pub fn mime_type(mut self, ext: impl Into<String>, mime: Mime) -> Self {
        self.mime_types.insert(ext.into().to_ascii_lowercase(), mime);
        self
    }

    pub fn build(self) -> Result<App, BuildError> {
        self.config.validate()?;
        let fetcher = HttpFetcher::new(&self.config.fetch)?;
        let template = UrlTemplate::parse(&self.config.url_format);
        debug!(
            generators = self.generators.names().count(),
            processors = self.processors.names().count(),
            analysers = self.analysers.names().count(),
            url_format = %self.config.url_format,
            "application built"
        );
        let datastore = self
            .datastore
            .unwrap_or_else(|| Box::new(MemoryDataStore::new()));
        Ok(App {
            inner: Arc::new(AppInner {
                config: self.config,
                template,
                datastore,
                generators: self.generators,
                processors: self.processors,
                analysers: self.analysers,
                mime_types: self.mime_types,
                fetcher,
            }),
        })
    }
}

fn default_mime_types() -> BTreeMap<String, Mime> {
    let mut types = BTreeMap::new();
    types.insert("jpg".to_string(), mime::IMAGE_JPEG);
    types.insert("jpeg".to_string(), mime::IMAGE_JPEG);
    types.insert("png".to_string(), mime::IMAGE_PNG);
    types.insert("gif".to_string(), mime::IMAGE_GIF);
    types.insert("svg".to_string(), mime::IMAGE_SVG);
    types.insert("bmp".to_string(), mime::IMAGE_BMP);
    types.insert("txt".to_string(), mime::TEXT_PLAIN);
    types.insert("html".to_string(), mime::TEXT_HTML);
    types.insert("css".to_string(), mime::TEXT_CSS);
    types.insert("js".to_string(), mime::TEXT_JAVASCRIPT);
    types.insert("json".to_string(), mime::APPLICATION_JSON);
    types.insert("pdf".to_string(), mime::APPLICATION_PDF);
    // no named constants for these in the mime crate
    if let Ok(webp) = "image/webp".parse::<Mime>() {
        types.insert("webp".to_string(), webp);
    }
    if let Ok(tiff) = "image/tiff".parse::<Mime>() {
        types.insert("tif".to_string(), tiff.clone());
        types.insert("tiff".to_string(), tiff);
    }
    types
}
