//! Shared fixtures for the urlpipe test suite.
//!
//! Prewired apps whose plugins operate on plain text, so pipeline behavior
//! is assertable against byte-string literals, plus a call-counting variant
//! for laziness assertions.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let app = test_app();
//! let mut job = app
//!     .generate("text", vec![json!("hello")])
//!     .process("upcase", vec![]);
//! assert_eq!(&job.data().unwrap()[..], b"HELLO");
//! ```

use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::app::{App, AppBuilder};
use crate::registry::{PluginError, StepOutput};
use crate::temp_object::TempObject;
use crate::url_attributes::UrlAttributes;

// =========================================================================
// Prewired apps
// =========================================================================

/// An app with the standard text plugins registered:
///
/// | Name | Kind | Behavior |
/// |------|------|----------|
/// | `text` | generator | arg 0 becomes the content, named `text.txt` |
/// | `tagged` | generator | fixed content carrying `kind: "generated"` meta |
/// | `upcase` | processor | uppercases the content |
/// | `reverse` | processor | reverses the content bytes |
/// | `rename` | processor | keeps content, renames it to arg 0 |
/// | `length` | analyser | content length in bytes |
pub fn test_app() -> App {
    plugin_builder().build().unwrap()
}

/// The standard plugins on a bare builder, for tests that need their own
/// config or datastore on top.
pub fn plugin_builder() -> AppBuilder {
    App::builder()
        .generator("text", text_generator)
        .generator("tagged", tagged_generator)
        .processor("upcase", upcase_processor)
        .processor("reverse", reverse_processor)
        .processor("rename", rename_processor)
        .analyser("length", length_analyser)
}

/// [`test_app`] plus a counter ticked every time the `text` generator runs.
pub fn counting_app() -> (App, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let app = plugin_builder()
        .generator(
            "text",
            move |args: &[Value]| -> Result<StepOutput, PluginError> {
                seen.fetch_add(1, Ordering::SeqCst);
                text_generator(args)
            },
        )
        .build()
        .unwrap();
    (app, calls)
}

// =========================================================================
// Plugins
// =========================================================================

fn text_generator(args: &[Value]) -> Result<StepOutput, PluginError> {
    let text = args
        .first()
        .and_then(Value::as_str)
        .ok_or_else(|| PluginError::invalid_arguments("text generator needs a string"))?;
    Ok(StepOutput::new(text.as_bytes().to_vec()).with_name("text.txt"))
}

fn tagged_generator(_args: &[Value]) -> Result<StepOutput, PluginError> {
    Ok(StepOutput::new(&b"tagged content"[..])
        .with_name("tagged.bin")
        .with_meta("kind", "generated"))
}

fn upcase_processor(
    content: &mut TempObject,
    _args: &[Value],
    _attrs: &mut UrlAttributes,
) -> Result<StepOutput, PluginError> {
    let data = content.data()?;
    Ok(StepOutput::new(data.to_ascii_uppercase()))
}

fn reverse_processor(
    content: &mut TempObject,
    _args: &[Value],
    _attrs: &mut UrlAttributes,
) -> Result<StepOutput, PluginError> {
    let mut data = content.data()?.to_vec();
    data.reverse();
    Ok(StepOutput::new(data))
}

fn rename_processor(
    content: &mut TempObject,
    args: &[Value],
    attrs: &mut UrlAttributes,
) -> Result<StepOutput, PluginError> {
    let name = args
        .first()
        .and_then(Value::as_str)
        .ok_or_else(|| PluginError::invalid_arguments("rename needs a string name"))?;
    attrs.set_name(name);
    Ok(StepOutput::new(content.data()?).with_name(name))
}

fn length_analyser(content: &mut TempObject, _args: &[Value]) -> Result<Value, PluginError> {
    Ok(json!(content.data()?.len()))
}

// =========================================================================
// Filesystem
// =========================================================================

/// Write `content` under `dir` and return the full path.
pub fn write_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}
