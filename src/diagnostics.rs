use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Note,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticCode {
    /// Source could not be parsed, rewritten or printed; output is the input.
    TransformFailed,
    /// A literal `type:name` key was already registered by another point.
    DuplicateKey,
    /// A manifest, summary or transformed-output write failed.
    ManifestIo,
    /// A generated binding name was already taken in the module.
    HandleCollision,
    /// The element sits where hooks cannot be synthesized.
    UnsupportedPlacement,
    /// A marker attribute without a usable value.
    MissingMarkerValue,
    /// Every instance rendered by a nested function shares one handle.
    SharedHandle,
}

/// Advisory build message. Never changes the outcome of a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub message: String,
    pub file: String,
    pub line: Option<usize>,
}

impl Diagnostic {
    pub fn new(
        severity: Severity,
        code: DiagnosticCode,
        file: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            file: file.into(),
            line: None,
        }
    }

    pub fn warning(code: DiagnosticCode, file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, file, message)
    }

    pub fn with_line(mut self, line: Option<usize>) -> Self {
        self.line = line;
        self
    }

    /// Write the diagnostic to the build log at its severity.
    pub fn log(&self) {
        match self.severity {
            Severity::Note => log::info!("{}", self),
            Severity::Warning => log::warn!("{}", self),
            Severity::Error => log::error!("{}", self),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "[tracking] {}:{}: {}", self.file, line, self.message),
            None => write!(f, "[tracking] {}: {}", self.file, self.message),
        }
    }
}
