use ariadne::{Color, Label, Report, ReportKind, Source};
use doping_template::{ParameterError, RenderError, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    severity: DiagnosticSeverity,
    source_id: String,
    span: Span,
    message: String,
    note: Option<String>,
}

impl Diagnostic {
    pub fn new<S: Into<String>>(
        severity: DiagnosticSeverity,
        source_id: S,
        span: Span,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            source_id: source_id.into(),
            span,
            message: message.into(),
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn severity(&self) -> DiagnosticSeverity {
        self.severity
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    pub fn report_kind(&self) -> ReportKind<'_> {
        match self.severity {
            DiagnosticSeverity::Error => ReportKind::Error,
            DiagnosticSeverity::Warning => ReportKind::Warning,
        }
    }
}

/// Converts an error with a source location into a printable diagnostic.
pub trait ToDiagnostic {
    fn to_diagnostic(&self, source_id: &str) -> Diagnostic;
}

impl ToDiagnostic for RenderError {
    fn to_diagnostic(&self, source_id: &str) -> Diagnostic {
        let diagnostic =
            Diagnostic::new(DiagnosticSeverity::Error, source_id, self.span(), self.to_string());
        match self {
            RenderError::MissingContextKey { name, .. } => {
                diagnostic.with_note(format!("pass a value with `-p {name}:<value>`"))
            }
            RenderError::TagParse { .. } => diagnostic
                .with_note("tags have the form `/*<DOPING NAME >*/` or `/*<DOPING_IF NAME BODY >*/`"),
        }
    }
}

impl ToDiagnostic for ParameterError {
    fn to_diagnostic(&self, source_id: &str) -> Diagnostic {
        Diagnostic::new(DiagnosticSeverity::Error, source_id, self.span(), self.to_string())
            .with_note("parameters are comma-separated `NAME:value` pairs")
    }
}

pub fn emit_diagnostics(diagnostics: &[Diagnostic], source: &str) {
    for diagnostic in diagnostics {
        let color = match diagnostic.severity {
            DiagnosticSeverity::Error => Color::Red,
            DiagnosticSeverity::Warning => Color::Yellow,
        };

        let span: std::ops::Range<usize> = diagnostic.span().into();
        let mut report = Report::build(
            diagnostic.report_kind(),
            diagnostic.source_id().to_string(),
            span.start,
        )
        .with_message(diagnostic.message())
        .with_label(
            Label::new((diagnostic.source_id().to_string(), span.clone()))
                .with_message(diagnostic.message())
                .with_color(color),
        );
        if let Some(note) = diagnostic.note() {
            report = report.with_note(note);
        }

        let _ = report
            .finish()
            .eprint((diagnostic.source_id().to_string(), Source::from(source)));
    }
}
