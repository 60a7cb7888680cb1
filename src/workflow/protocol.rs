//! Protocol templating for the liquid handler.
//!
//! Liquid-handler protocols are stored as template files containing `$token`
//! placeholders (tip rack slot, source/destination columns). Before each
//! liquid-handling dispatch the driver renders the template with the current
//! substitutions into a fresh temporary file and passes that file's path as a
//! payload field; the engine node reads the rendered file from disk. A new
//! file is written per invocation so an in-flight run never observes a
//! half-rewritten protocol.

use crate::error::{FlowError, FlowResult};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

/// A protocol template file with `$token` placeholders.
#[derive(Debug, Clone)]
pub struct ProtocolTemplate {
    path: PathBuf,
}

impl ProtocolTemplate {
    /// Reference a template file on disk.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The template file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Render the template with the given substitutions into a fresh
    /// temporary file, returning the rendered file's path.
    ///
    /// Each `$key` occurrence is replaced with the corresponding value.
    /// Tokens without a substitution are left untouched (the engine will
    /// reject the protocol, which surfaces the configuration mistake at
    /// dispatch time rather than silently running a wrong transfer).
    ///
    /// The temporary file is kept on disk; the engine consumes it after this
    /// process has moved on.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::Template`] when the template cannot be read, and
    /// [`FlowError::Io`] when the rendered copy cannot be written.
    pub fn render(&self, substitutions: &BTreeMap<String, String>) -> FlowResult<PathBuf> {
        let mut contents =
            std::fs::read_to_string(&self.path).map_err(|source| FlowError::Template {
                path: self.path.clone(),
                source,
            })?;

        for (key, value) in substitutions {
            contents = contents.replace(&format!("${key}"), value);
        }

        let mut rendered = tempfile::Builder::new()
            .prefix("plateflow_protocol_")
            .suffix(&rendered_suffix(&self.path))
            .tempfile()?;
        rendered.write_all(contents.as_bytes())?;

        let (_, path) = rendered.keep().map_err(|persist| FlowError::Io(persist.error))?;
        Ok(path)
    }
}

/// Preserve the template's extension on the rendered copy.
fn rendered_suffix(template: &Path) -> String {
    match template.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => format!(".{ext}"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_template(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".py")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn substitutes_every_token() {
        let template = write_template("tips = $tip_location\nwells = $source_columns\n");
        let mut subs = BTreeMap::new();
        subs.insert("tip_location".to_string(), "7".to_string());
        subs.insert("source_columns".to_string(), "[1, 5, 9]".to_string());

        let rendered = ProtocolTemplate::new(template.path()).render(&subs).unwrap();
        let contents = std::fs::read_to_string(&rendered).unwrap();
        assert_eq!(contents, "tips = 7\nwells = [1, 5, 9]\n");
        std::fs::remove_file(rendered).ok();
    }

    #[test]
    fn each_render_writes_a_fresh_file() {
        let template = write_template("slot = $tip_location\n");
        let protocol = ProtocolTemplate::new(template.path());
        let mut subs = BTreeMap::new();
        subs.insert("tip_location".to_string(), "4".to_string());

        let first = protocol.render(&subs).unwrap();
        subs.insert("tip_location".to_string(), "5".to_string());
        let second = protocol.render(&subs).unwrap();

        assert_ne!(first, second);
        assert_eq!(std::fs::read_to_string(&first).unwrap(), "slot = 4\n");
        assert_eq!(std::fs::read_to_string(&second).unwrap(), "slot = 5\n");
        std::fs::remove_file(first).ok();
        std::fs::remove_file(second).ok();
    }

    #[test]
    fn missing_template_reports_its_path() {
        let protocol = ProtocolTemplate::new("/nonexistent/inoculate.py");
        let err = protocol.render(&BTreeMap::new());
        assert!(matches!(err, Err(FlowError::Template { .. })));
    }
}
