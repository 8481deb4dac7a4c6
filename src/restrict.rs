//! Pre-action checks and user prompts
//!
//! Count restrictions are checked before marking, relating and submitting.
//! Strict failures are reported through [`Prompt::alert`] and block the
//! action. Informational failures are collected into one
//! [`Prompt::confirm`] that lets the user proceed anyway.

use crate::error::RestrictionError;
use crate::form::FormState;
use crate::marker::{Marker, MarkerSet, Severity};

// =============================================================================
// Prompt
// =============================================================================

/// Blocking user interaction
pub trait Prompt {
    /// Show a message the user must acknowledge
    fn alert(&mut self, message: &str);

    /// Ask a yes/no question
    fn confirm(&mut self, message: &str) -> bool;
}

/// Prompt for headless use: alerts are logged, confirmations accepted
#[derive(Debug, Clone, Copy, Default)]
pub struct LogPrompt;

impl Prompt for LogPrompt {
    fn alert(&mut self, message: &str) {
        tracing::warn!("{message}");
    }

    fn confirm(&mut self, message: &str) -> bool {
        tracing::info!("{message} (accepted)");
        true
    }
}

/// Prompt that records every message and answers with a fixed value
#[derive(Debug, Clone, Default)]
pub struct RecordingPrompt {
    pub alerts: Vec<String>,
    pub confirms: Vec<String>,
    pub answer: bool,
}

impl RecordingPrompt {
    /// Prompt answering every confirmation with `answer`
    pub fn answering(answer: bool) -> Self {
        Self {
            answer,
            ..Self::default()
        }
    }
}

impl Prompt for RecordingPrompt {
    fn alert(&mut self, message: &str) {
        self.alerts.push(message.to_owned());
    }

    fn confirm(&mut self, message: &str) -> bool {
        self.confirms.push(message.to_owned());
        self.answer
    }
}

// =============================================================================
// Checks
// =============================================================================

/// Check every marker restriction against `count`
///
/// `count` gives the number of labels of a marker in the context of the
/// action: all active labels, or only the labels picked for a relation.
pub fn check_restrictions<F>(markers: &MarkerSet, count: F, prompt: &mut dyn Prompt) -> Result<(), RestrictionError>
where
    F: Fn(&Marker) -> usize,
{
    let mut unmet_info = Vec::new();
    for marker in &markers.markers {
        let current = count(marker);
        for restriction in marker.restrictions.iter().filter(|r| !r.holds(current)) {
            let error = RestrictionError::Unmet {
                marker: marker.code.to_string(),
                requirement: restriction.requirement(),
                count: current,
            };
            match restriction.severity {
                Severity::Strict => {
                    prompt.alert(&error.to_string());
                    tracing::debug!(marker = %marker.code, %restriction, current, "strict restriction unmet");
                    return Err(error);
                }
                Severity::Info => unmet_info.push(error.to_string()),
            }
        }
    }

    if unmet_info.is_empty() {
        return Ok(());
    }
    let message = format!("{}. Proceed anyway?", unmet_info.join("; "));
    if prompt.confirm(&message) {
        Ok(())
    } else {
        Err(RestrictionError::Declined)
    }
}

/// Check that required radio groups and text fields are filled
pub fn check_required(form: &FormState, prompt: &mut dyn Prompt) -> Result<(), RestrictionError> {
    match form.missing_required() {
        Some(name) => {
            let error = RestrictionError::RequiredField(name.to_owned());
            prompt.alert(&error.to_string());
            Err(error)
        }
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{FieldKind, FormField};
    use crate::marker::Restriction;

    fn markers() -> MarkerSet {
        MarkerSet::new()
            .marker(Marker::new("PER").with_restriction("ge2s".parse().unwrap()))
            .marker(Marker::new("LOC").with_restriction("le1i".parse::<Restriction>().unwrap()))
    }

    #[test]
    fn test_strict_blocks() {
        let mut prompt = RecordingPrompt::answering(true);
        let result = check_restrictions(&markers(), |m| if m.code == "PER" { 1 } else { 0 }, &mut prompt);
        assert_eq!(
            result,
            Err(RestrictionError::Unmet {
                marker: "PER".into(),
                requirement: "at least 2".into(),
                count: 1,
            })
        );
        assert_eq!(prompt.alerts.len(), 1);
        assert!(prompt.confirms.is_empty());
    }

    #[test]
    fn test_info_asks_once() {
        let counts = |m: &Marker| if m.code == "PER" { 2 } else { 3 };

        let mut accept = RecordingPrompt::answering(true);
        assert_eq!(check_restrictions(&markers(), counts, &mut accept), Ok(()));
        assert_eq!(accept.confirms.len(), 1);
        assert!(accept.confirms[0].contains("at most 1"));

        let mut decline = RecordingPrompt::answering(false);
        assert_eq!(check_restrictions(&markers(), counts, &mut decline), Err(RestrictionError::Declined));
    }

    #[test]
    fn test_required_fields() {
        let form = FormState::new().field(FormField::new("comment", FieldKind::ShortText).required());
        let mut prompt = RecordingPrompt::default();
        assert_eq!(
            check_required(&form, &mut prompt),
            Err(RestrictionError::RequiredField("comment".into()))
        );
        assert_eq!(prompt.alerts, vec!["required field is empty: comment".to_owned()]);
    }
}
