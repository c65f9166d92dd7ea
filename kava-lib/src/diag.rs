use std::collections::BTreeSet;

/// Findings of the property analysis. These are advisory: unlike parse
/// errors they never abort anything, they accumulate and are rendered
/// after the fixpoint finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticKind {
    UnusedVariable,
    UselessAssignment,
    SelfAssignment,
    DivisionByZero,
    ConditionAlwaysTrue,
    ConditionAlwaysFalse,
    UnreachableStatement,
    EmptyLoop,
    ModifyingImmutable,
    MissingNullCheck,
    PreconditionViolation,
    DelayedFacts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Warning,
    Error,
}

impl DiagnosticKind {
    pub fn label(&self) -> &'static str {
        match self {
            DiagnosticKind::UnusedVariable => "unused-variable",
            DiagnosticKind::UselessAssignment => "useless-assignment",
            DiagnosticKind::SelfAssignment => "self-assignment",
            DiagnosticKind::DivisionByZero => "division-by-zero",
            DiagnosticKind::ConditionAlwaysTrue => "condition-always-true",
            DiagnosticKind::ConditionAlwaysFalse => "condition-always-false",
            DiagnosticKind::UnreachableStatement => "unreachable-statement",
            DiagnosticKind::EmptyLoop => "empty-loop",
            DiagnosticKind::ModifyingImmutable => "modifying-immutable",
            DiagnosticKind::MissingNullCheck => "missing-null-check",
            DiagnosticKind::PreconditionViolation => "precondition-violation",
            DiagnosticKind::DelayedFacts => "delayed-facts",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticKind::DivisionByZero
            | DiagnosticKind::ModifyingImmutable
            | DiagnosticKind::PreconditionViolation => Severity::Error,
            _ => Severity::Warning,
        }
    }
}

impl core::fmt::Display for Severity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Diagnostic {
    pub line: u32,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl core::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "[line {}] {} {}: {}",
            self.line,
            self.kind.severity(),
            self.kind.label(),
            self.message
        )
    }
}

/// Deduplicating accumulator. The fixpoint revisits every method once per
/// iteration, so the same finding is typically reported several times;
/// the set representation keeps exactly one copy and a stable order.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    findings: BTreeSet<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, line: u32, kind: DiagnosticKind, message: impl Into<String>) {
        self.findings.insert(Diagnostic {
            line,
            kind,
            message: message.into(),
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.findings.iter()
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.findings
            .iter()
            .any(|d| d.kind.severity() == Severity::Error)
    }

    pub fn render(&self) -> String {
        use core::fmt::Write;
        let mut out = String::new();
        for finding in &self.findings {
            let _ = writeln!(out, "{finding}");
        }
        out
    }
}
