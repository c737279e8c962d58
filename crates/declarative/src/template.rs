//! File templates with `{{ name }}` placeholders
//!
//! Rendering is pure: the same template and variables always produce the
//! same bytes, which are what the file guard compares and the file action
//! writes. A variable missing from the context is an error rather than an
//! empty string. `\{{` produces a literal `{{`.

use crate::error::{Error, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\?\{\{\s*([A-Za-z_][A-Za-z0-9_.\-]*)\s*\}\}")
        .expect("placeholder pattern is valid")
});

/// Variable bindings for rendering
pub type Variables = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Var { name: String, line: usize },
}

/// A parsed template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Parse template source
    pub fn parse(source: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut last = 0;

        for caps in PLACEHOLDER.captures_iter(source) {
            let Some(m) = caps.get(0) else { continue };
            push_text(&mut segments, source, last, m.start())?;

            if m.as_str().starts_with('\\') {
                segments.push(Segment::Text(m.as_str()[1..].to_string()));
            } else {
                segments.push(Segment::Var {
                    name: caps[1].to_string(),
                    line: line_of(source, m.start()),
                });
            }
            last = m.end();
        }
        push_text(&mut segments, source, last, source.len())?;

        Ok(Self { segments })
    }

    /// Names of all variables referenced, in first-use order
    pub fn variables(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for seg in &self.segments {
            if let Segment::Var { name, .. } = seg
                && !names.contains(&name.as_str())
            {
                names.push(name);
            }
        }
        names
    }

    /// Render with the given bindings
    pub fn render(&self, vars: &Variables) -> Result<String> {
        let mut out = String::new();
        for seg in &self.segments {
            match seg {
                Segment::Text(text) => out.push_str(text),
                Segment::Var { name, line } => {
                    let value = vars.get(name).ok_or_else(|| Error::UnboundVariable {
                        name: name.clone(),
                        line: *line,
                    })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

/// Parse and render in one go
pub fn render_str(source: &str, vars: &Variables) -> Result<String> {
    Template::parse(source)?.render(vars)
}

fn push_text(segments: &mut Vec<Segment>, source: &str, start: usize, end: usize) -> Result<()> {
    if start >= end {
        return Ok(());
    }
    let text = &source[start..end];
    if let Some(offset) = text.find("{{") {
        return Err(Error::UnterminatedPlaceholder {
            line: line_of(source, start + offset),
        });
    }
    segments.push(Segment::Text(text.to_string()));
    Ok(())
}

fn line_of(source: &str, pos: usize) -> usize {
    source[..pos].matches('\n').count() + 1
}
