#![forbid(unsafe_code)]

use fkey_dtype::KeyScalar;
use std::fmt;

/// Neighbors shown on each side of the first mismatch in verbose reports.
pub const MISMATCH_CONTEXT_RADIUS: usize = 4;

pub const VALIDATE_REASON_CODES: [&str; 2] = ["validate_length_mismatch", "validate_value_mismatch"];

/// Rendered neighborhood of the first mismatch, clipped to valid indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MismatchWindow {
    /// First index covered by the window.
    pub start: usize,
    /// Last index covered by the window (inclusive).
    pub end: usize,
    pub computed: Vec<String>,
    pub reference: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MismatchReport {
    pub index: usize,
    pub computed: String,
    pub reference: String,
    pub window: Option<MismatchWindow>,
}

impl fmt::Display for MismatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Incorrect: [{}]: {} != {}",
            self.index, self.computed, self.reference
        )?;
        if let Some(window) = &self.window {
            write!(f, "\nresult[...")?;
            for value in &window.computed {
                write!(f, "{value}, ")?;
            }
            write!(f, "...]\nreference[...")?;
            for value in &window.reference {
                write!(f, "{value}, ")?;
            }
            write!(f, "...]")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The two sequences differ in length; nothing was compared.
    LengthMismatch { computed: usize, reference: usize },
    Mismatch(MismatchReport),
}

impl ValidationError {
    #[must_use]
    pub const fn reason_code(&self) -> &'static str {
        match self {
            Self::LengthMismatch { .. } => "validate_length_mismatch",
            Self::Mismatch(_) => "validate_value_mismatch",
        }
    }

    #[must_use]
    pub fn mismatch(&self) -> Option<&MismatchReport> {
        match self {
            Self::Mismatch(report) => Some(report),
            Self::LengthMismatch { .. } => None,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LengthMismatch {
                computed,
                reference,
            } => write!(
                f,
                "length mismatch: computed has {computed} elements, reference has {reference}"
            ),
            Self::Mismatch(report) => write!(f, "{report}"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Index of the first position where the sequences disagree, scanning from 0.
///
/// Only the common prefix is scanned; callers check lengths first.
#[must_use]
pub fn first_mismatch_index<T: KeyScalar>(computed: &[T], reference: &[T]) -> Option<usize> {
    computed
        .iter()
        .zip(reference)
        .position(|(&lhs, &rhs)| !lhs.key_eq(rhs))
}

/// Compares `computed` against `reference` element by element.
///
/// Stops at the first differing index. With `verbose`, the report carries
/// both sides of indices `[i - 4, i + 4]` clipped to the sequence bounds.
pub fn compare_results<T: KeyScalar>(
    computed: &[T],
    reference: &[T],
    verbose: bool,
) -> Result<(), ValidationError> {
    if computed.len() != reference.len() {
        return Err(ValidationError::LengthMismatch {
            computed: computed.len(),
            reference: reference.len(),
        });
    }

    let Some(index) = first_mismatch_index(computed, reference) else {
        return Ok(());
    };

    let window = verbose.then(|| mismatch_window(computed, reference, index));
    Err(ValidationError::Mismatch(MismatchReport {
        index,
        computed: computed[index].format_value(),
        reference: reference[index].format_value(),
        window,
    }))
}

fn mismatch_window<T: KeyScalar>(computed: &[T], reference: &[T], index: usize) -> MismatchWindow {
    let start = index.saturating_sub(MISMATCH_CONTEXT_RADIUS);
    let end = index
        .saturating_add(MISMATCH_CONTEXT_RADIUS)
        .min(computed.len() - 1);
    let render = |values: &[T]| -> Vec<String> {
        values[start..=end]
            .iter()
            .map(|value| value.format_value())
            .collect()
    };
    MismatchWindow {
        start,
        end,
        computed: render(computed),
        reference: render(reference),
    }
}

/// Renders a comparison outcome the way the console harness prints it.
#[must_use]
pub fn render_verdict(outcome: &Result<(), ValidationError>) -> String {
    match outcome {
        Ok(()) => "Correct".to_string(),
        Err(err) => err.to_string(),
    }
}
