//! # urlpipe
//!
//! On-the-fly content transformation behind tamper-proof URLs. You describe
//! what should happen to a piece of content — fetch it, resize it, re-encode
//! it — and urlpipe hands out a URL encoding that whole recipe. Nothing is
//! processed up front: work happens when someone actually reads the result.
//!
//! # Architecture: Recipes, Not Results
//!
//! The central type is the [`job::Job`], an ordered list of steps plus a
//! cursor marking how far it has run:
//!
//! ```text
//! let job = app.fetch_file("photo.jpg")     steps: [ff photo.jpg]
//!     .process("resize", ...);              steps: [ff photo.jpg, p resize]
//! job.url()                                 still no work done
//! job.data()?                               NOW the chain runs
//! ```
//!
//! This laziness is load-bearing in three ways:
//!
//! - **URLs are free**: a page with fifty thumbnail links does no image work
//!   at render time; each thumbnail is computed when (and if) its URL is hit.
//! - **Forks share work**: chaining methods take `&self` and return a new
//!   job carrying the parent's applied state, so one decoded source can feed
//!   many variants without re-fetching.
//! - **Recipes travel**: a job serializes to a URL-safe token and rebuilds
//!   on any process holding the same app wiring, which is what lets a
//!   stateless web tier serve the URLs.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`app`] | Builder-wired application: config, datastore, plugin registries, HTTP fetcher |
//! | [`job`] | Lazy step chains — apply-on-read accessors, forking, temp file cleanup |
//! | [`steps`] | The five step kinds, their wire tuples, and their application semantics |
//! | [`temp_object`] | Content payloads: memory- or file-backed, cached reads, spool-on-demand paths |
//! | [`url_attributes`] | Insertion-ordered attribute bag with `name`/`basename`/`ext` derivation |
//! | [`url_builder`] | `/:job/:name` templates: placeholder elision, query-string assembly |
//! | [`serial`] | Token codec — JSON step tuples in URL-safe base64, old verbose shape accepted |
//! | [`sha`] | Short keyed digests that make tokens tamper-evident |
//! | [`registry`] | Named generator/processor/analyser registries; closures register directly |
//! | [`datastore`] | Persistence trait plus in-memory and filesystem stores |
//! | [`config`] | TOML configuration with defaults and validation |
//! | [`fetch`] | Blocking HTTP client behind `fetch_url` steps |
//!
//! # Design Decisions
//!
//! ## Reads Take `&mut self`
//!
//! Every content accessor on a job ([`data`](job::Job::data),
//! [`size`](job::Job::size), [`path`](job::Job::path), ...) takes `&mut
//! self` and applies outstanding steps first. The signature is the
//! documentation: reading a job may fetch over the network, run processors,
//! and write temp files. A shared-reference read API would hide all of that
//! behind interior mutability and make the cheap/expensive distinction
//! invisible.
//!
//! ## Jobs Are Values
//!
//! Forking is `Clone`. The fork gets the steps, the cursor, and a handle on
//! the current content; retained intermediates stay with the parent. There
//! is no shared mutable job state and no lifetime tying a fork to its
//! parent — a fork can outlive, re-run, or diverge from the original
//! freely.
//!
//! ## Closed Steps, Open Plugins
//!
//! [`steps::Step`] is a five-variant enum, not a trait object. The wire
//! format, the URL side effects, and the application logic for each kind
//! live in exhaustive matches that the compiler checks. Extensibility lives
//! one level down: `generate` and `process` dispatch by name into
//! registries, so applications add behavior by registering closures, not by
//! inventing step kinds that every token consumer would need to know.
//!
//! ## Tokens Are Guarded, Not Hidden
//!
//! A token is readable base64 over JSON — anyone can decode it, and that is
//! fine. What matters is that nobody can *mint* one: with `verify_urls` on,
//! URLs carry a short SHA over the token and a server-side secret, and
//! serving code rejects requests whose digest doesn't match. Validation is
//! string comparison; no job is applied for a request that fails it.

pub mod app;
pub mod config;
pub mod datastore;
pub mod fetch;
pub mod job;
pub mod registry;
pub mod serial;
pub mod sha;
pub mod steps;
pub mod temp_object;
pub mod url_attributes;
pub mod url_builder;

pub use app::{App, AppBuilder, BuildError};
pub use config::{AppConfig, ConfigError, FetchConfig, load_config};
pub use datastore::{
    DataStore, DataStoreError, FileDataStore, MemoryDataStore, Retrieved, StoreOptions,
};
pub use fetch::FetchError;
pub use job::{Job, JobError};
pub use registry::{Analyser, Generator, PluginError, Processor, RegistryError, StepOutput};
pub use serial::DeserializeError;
pub use sha::{SHA_LENGTH, ShaError};
pub use steps::Step;
pub use temp_object::TempObject;
pub use url_attributes::UrlAttributes;
pub use url_builder::UrlTemplate;

#[cfg(test)]
pub(crate) mod test_helpers;
