//! URL templating.
//!
//! A format string like `/:job/:name` turns a job into a servable URL.
//! `:identifier` segments are placeholders; everything else is literal. All
//! of the job's URL attributes plus the reserved `job` (the token) and
//! `sha` (the protection digest) form one parameter pool: placeholders
//! consume matching parameters into the path, and whatever is left over
//! becomes the query string.
//!
//! ## Elision
//!
//! A placeholder with no value (missing or blank) disappears, and takes
//! one separator character immediately before it along (`/`, `-`, `.`,
//! any non-word literal), so separators don't dangle. `/:job/:name`
//! without a name renders as `/<token>`, not `/<token>/`. Word characters
//! stay put: `/x:name` without a name is `/x`. Nothing is taken at the
//! start of the format or right after another placeholder.

use url::form_urlencoded;

use crate::url_attributes::{UrlAttributes, is_blank};

#[derive(Debug, Clone, PartialEq)]
enum Part {
    Literal(String),
    Placeholder(String),
}

/// A parsed URL format string.
///
/// Placeholder names are lowercase identifiers (`:name`, `:path_prefix`).
/// Parsing cannot fail: a `:` not followed by one is just a literal colon.
#[derive(Debug, Clone)]
pub struct UrlTemplate {
    parts: Vec<Part>,
}

impl UrlTemplate {
    pub fn parse(format: &str) -> Self {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut chars = format.chars().peekable();
        while let Some(c) = chars.next() {
            let starts_placeholder = c == ':'
                && chars
                    .peek()
                    .is_some_and(|&next| next.is_ascii_lowercase() || next == '_');
            if !starts_placeholder {
                literal.push(c);
                continue;
            }
            let mut name = String::new();
            while let Some(&next) = chars.peek() {
                if next.is_ascii_lowercase() || next.is_ascii_digit() || next == '_' {
                    name.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            if !literal.is_empty() {
                parts.push(Part::Literal(std::mem::take(&mut literal)));
            }
            parts.push(Part::Placeholder(name));
        }
        if !literal.is_empty() {
            parts.push(Part::Literal(literal));
        }
        Self { parts }
    }

    pub fn has_placeholder(&self, name: &str) -> bool {
        self.parts
            .iter()
            .any(|part| matches!(part, Part::Placeholder(p) if p == name))
    }

    /// Substitute placeholders via `resolve`, applying the elision rule for
    /// any that come back missing or blank.
    pub fn render(&self, mut resolve: impl FnMut(&str) -> Option<String>) -> String {
        let mut out = String::new();
        // Literal chars since the last placeholder; elision may only eat
        // template text, never a substituted value.
        let mut eatable = 0usize;
        for part in &self.parts {
            match part {
                Part::Literal(text) => {
                    out.push_str(text);
                    eatable += text.chars().count();
                }
                Part::Placeholder(name) => {
                    match resolve(name).filter(|value| !is_blank(value)) {
                        Some(value) => out.push_str(&value),
                        None => {
                            if eatable > 0
                                && let Some(last) = out.chars().next_back()
                                && !last.is_ascii_alphanumeric()
                                && last != '_'
                            {
                                out.pop();
                            }
                        }
                    }
                    eatable = 0;
                }
            }
        }
        out
    }
}

/// Everything a URL is built from, besides the template itself.
pub(crate) struct UrlParts<'a> {
    pub token: &'a str,
    pub sha: Option<&'a str>,
    pub attrs: &'a UrlAttributes,
    pub overrides: &'a [(&'a str, &'a str)],
    pub host: Option<&'a str>,
    pub path_prefix: Option<&'a str>,
}

/// Render the template against the parameter pool and assemble the final
/// URL, host and path prefix first, leftovers as the query string.
///
/// Overrides shadow attributes under the same key, in the path and in the
/// query alike; a blank override suppresses the key entirely. `job` always
/// carries the real token, and `sha` the computed digest when there is one;
/// overrides cannot forge either.
pub(crate) fn build_url(template: &UrlTemplate, parts: &UrlParts<'_>) -> String {
    let lookup_override = |key: &str| -> Option<&str> {
        parts
            .overrides
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
    };
    let reserved = |key: &str| key == "job" || (key == "sha" && parts.sha.is_some());
    let resolve = |name: &str| -> Option<String> {
        match name {
            "job" => Some(parts.token.to_string()),
            "sha" if parts.sha.is_some() => parts.sha.map(str::to_string),
            _ => lookup_override(name)
                .map(str::to_string)
                .or_else(|| parts.attrs.get(name)),
        }
    };

    let path = template.render(resolve);

    let attr_keys: Vec<String> = parts.attrs.keys().map(str::to_string).collect();
    let mut pairs: Vec<(String, String)> = Vec::new();
    for key in &attr_keys {
        if template.has_placeholder(key) || reserved(key) {
            continue;
        }
        let value = match lookup_override(key) {
            Some(value) => value.to_string(),
            None => match parts.attrs.get(key) {
                Some(value) => value,
                None => continue,
            },
        };
        if !is_blank(&value) {
            pairs.push((key.clone(), value));
        }
    }
    for (key, value) in parts.overrides {
        if template.has_placeholder(key) || reserved(key) || attr_keys.iter().any(|k| k == key) {
            continue;
        }
        if !is_blank(value) {
            pairs.push(((*key).to_string(), (*value).to_string()));
        }
    }
    if !template.has_placeholder("job") {
        pairs.push(("job".to_string(), parts.token.to_string()));
    }
    if let Some(sha) = parts.sha
        && !template.has_placeholder("sha")
    {
        pairs.push(("sha".to_string(), sha.to_string()));
    }

    let mut url = String::new();
    if let Some(host) = parts.host {
        url.push_str(host.trim_end_matches('/'));
    }
    if let Some(prefix) = parts.path_prefix {
        let prefix = prefix.trim_end_matches('/');
        if !prefix.is_empty() {
            if !prefix.starts_with('/') {
                url.push('/');
            }
            url.push_str(prefix);
        }
    }
    url.push_str(&path);
    if !pairs.is_empty() {
        let mut query = form_urlencoded::Serializer::new(String::new());
        for (key, value) in &pairs {
            query.append_pair(key, value);
        }
        url.push('?');
        url.push_str(&query.finish());
    }
    url
}
