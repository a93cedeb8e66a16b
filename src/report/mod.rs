//! HTML summary rendering.
//!
//! The page is a frame (`frame.html`) with a literal `{records}` marker where
//! the rendered rows go, and a Tera row template (`record.html`) applied to
//! each record. Both have built-in defaults; a template directory may
//! override either file.

pub mod format;

use anyhow::{Context, Result};
use log::debug;
use serde::Serialize;
use std::path::Path;
use tera::Tera;
use thiserror::Error;

use crate::runtime::Runtime;

pub const RECORDS_MARKER: &str = "{records}";
pub const FRAME_FILE: &str = "frame.html";
pub const RECORD_FILE: &str = "record.html";

const BUILTIN_FRAME: &str = include_str!("../../templates/frame.html");
const BUILTIN_RECORD: &str = include_str!("../../templates/record.html");

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("frame template has no {{records}} marker")]
    MissingMarker,

    #[error("record template error: {0}")]
    Tera(#[from] tera::Error),
}

/// Parsed frame and record templates.
pub struct ReportTemplates {
    head: String,
    tail: String,
    tera: Tera,
}

impl ReportTemplates {
    pub fn new(frame: &str, record: &str) -> Result<Self, TemplateError> {
        let (head, tail) = frame
            .split_once(RECORDS_MARKER)
            .ok_or(TemplateError::MissingMarker)?;

        let mut tera = Tera::default();
        tera.add_raw_template(RECORD_FILE, record)?;
        // Fields carry pre-rendered HTML such as `<br>` between dependencies.
        tera.autoescape_on(vec![]);

        Ok(Self {
            head: head.to_string(),
            tail: tail.to_string(),
            tera,
        })
    }

    pub fn builtin() -> Result<Self, TemplateError> {
        Self::new(BUILTIN_FRAME, BUILTIN_RECORD)
    }

    /// Built-in templates, with `frame.html` / `record.html` from `dir`
    /// taking precedence when present.
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime>(runtime: &R, dir: Option<&Path>) -> Result<Self> {
        let frame = read_override(runtime, dir, FRAME_FILE)?;
        let record = read_override(runtime, dir, RECORD_FILE)?;

        Self::new(
            frame.as_deref().unwrap_or(BUILTIN_FRAME),
            record.as_deref().unwrap_or(BUILTIN_RECORD),
        )
        .context("Invalid report templates")
    }

    pub fn render_record<T: Serialize>(&self, record: &T) -> Result<String, TemplateError> {
        let context = tera::Context::from_serialize(record)?;
        Ok(self.tera.render(RECORD_FILE, &context)?)
    }

    /// The full page: frame head, rows joined by newlines, frame tail.
    pub fn render_page(&self, rows: &[String]) -> String {
        let body = rows.join("\n");
        let mut page = String::with_capacity(self.head.len() + body.len() + self.tail.len());
        page.push_str(&self.head);
        page.push_str(&body);
        page.push_str(&self.tail);
        page
    }
}

fn read_override<R: Runtime>(runtime: &R, dir: Option<&Path>, file: &str) -> Result<Option<String>> {
    let Some(dir) = dir else {
        return Ok(None);
    };
    let path = dir.join(file);
    if !runtime.exists(&path) {
        return Ok(None);
    }
    debug!("Using template {:?}", path);
    let text = runtime
        .read_to_string(&path)
        .with_context(|| format!("Failed to read template {:?}", path))?;
    Ok(Some(text))
}
