//! Claims-revalidation lifecycle for one assistant turn.
//!
//! The working state is `Option<GuardrailState>`: `None` means no guardrail
//! activity on the current turn. Transitions are pure:
//!
//! | from \ event  | thinking | validating (content) | regenerating | done (verdict) |
//! |---------------|----------|----------------------|--------------|----------------|
//! | none          | none     | validating           | regenerating | done           |
//! | validating    | none     | validating           | regenerating | done           |
//! | regenerating  | *kept*   | validating           | regenerating | done           |
//! | done          | none     | validating           | regenerating | done           |
//!
//! `thinking` during regeneration is the backend re-invoking tools for the
//! rewritten answer, so the state survives it.

use agent_wire::ClaimsValidation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardrailPhase {
    Validating,
    Regenerating,
    Done,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComplianceVerdict {
    pub compliant: bool,
    pub violated_claims: Vec<String>,
    pub allowed_claims: Vec<String>,
    pub suggestions: Vec<String>,
    /// In `0.0..=1.0`.
    pub compliance_score: f64,
    pub was_regenerated: bool,
}

impl From<&ClaimsValidation> for ComplianceVerdict {
    fn from(report: &ClaimsValidation) -> Self {
        Self {
            compliant: report.is_compliant,
            violated_claims: report.violated_claims.clone(),
            allowed_claims: report.allowed_claims.clone(),
            suggestions: report.suggestions.clone(),
            compliance_score: report.compliance_score.clamp(0.0, 1.0),
            was_regenerated: report.was_regenerated,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GuardrailState {
    pub phase: GuardrailPhase,
    /// Answer content captured when validation began.
    pub original_response: String,
    pub regenerated_response: Option<String>,
    /// Set once the first regenerated delta has overwritten the original.
    pub has_cleared_for_regen: bool,
    pub verdict: Option<ComplianceVerdict>,
}

impl GuardrailState {
    fn new(phase: GuardrailPhase, original_response: String) -> Self {
        Self {
            phase,
            original_response,
            regenerated_response: None,
            has_cleared_for_regen: false,
            verdict: None,
        }
    }
}

/// Inputs to [`transition`].
#[derive(Debug, Clone, Copy)]
pub enum GuardrailEvent<'a> {
    TurnStarted,
    Thinking,
    /// `content` is the current answer of the turn, if any.
    Validating { content: Option<&'a str> },
    Regenerating { content: Option<&'a str> },
    OutputStarted,
    /// A regenerated delta replaced the answer content.
    FreshStartApplied,
    Completed {
        report: &'a ClaimsValidation,
        final_content: &'a str,
    },
    /// The stream ended without a verdict.
    Finished,
}

pub fn transition(state: Option<GuardrailState>, event: GuardrailEvent<'_>) -> Option<GuardrailState> {
    match event {
        GuardrailEvent::TurnStarted | GuardrailEvent::Finished => None,
        GuardrailEvent::Thinking => state.filter(|state| state.phase == GuardrailPhase::Regenerating),
        GuardrailEvent::Validating { content } => {
            match content.filter(|content| !content.is_empty()) {
                Some(content) => Some(GuardrailState::new(
                    GuardrailPhase::Validating,
                    content.to_owned(),
                )),
                None => state,
            }
        }
        GuardrailEvent::Regenerating { content } => {
            let original = match state {
                Some(state) if state.phase != GuardrailPhase::Done => state.original_response,
                _ => content.unwrap_or_default().to_owned(),
            };
            Some(GuardrailState::new(GuardrailPhase::Regenerating, original))
        }
        GuardrailEvent::OutputStarted => state.map(|mut state| {
            if state.phase == GuardrailPhase::Regenerating {
                state.has_cleared_for_regen = false;
            }
            state
        }),
        GuardrailEvent::FreshStartApplied => state.map(|mut state| {
            if state.phase == GuardrailPhase::Regenerating {
                state.has_cleared_for_regen = true;
            }
            state
        }),
        GuardrailEvent::Completed {
            report,
            final_content,
        } => {
            let previous = state.filter(|state| state.phase != GuardrailPhase::Done);
            let original_response = report
                .original_response
                .clone()
                .or_else(|| previous.as_ref().map(|state| state.original_response.clone()))
                .unwrap_or_else(|| final_content.to_owned());
            let regenerated_response = report.regenerated_response.clone().or_else(|| {
                report
                    .was_regenerated
                    .then(|| final_content.to_owned())
            });

            Some(GuardrailState {
                phase: GuardrailPhase::Done,
                original_response,
                regenerated_response,
                has_cleared_for_regen: previous.is_some_and(|state| state.has_cleared_for_regen),
                verdict: Some(ComplianceVerdict::from(report)),
            })
        }
    }
}

pub fn is_regenerating(state: Option<&GuardrailState>) -> bool {
    state.is_some_and(|state| state.phase == GuardrailPhase::Regenerating)
}

/// Whether the next delta must replace the answer instead of appending.
pub fn replaces_next_delta(state: Option<&GuardrailState>) -> bool {
    state.is_some_and(|state| {
        state.phase == GuardrailPhase::Regenerating && !state.has_cleared_for_regen
    })
}

#[cfg(test)]
mod tests {
    use agent_wire::ClaimsValidation;

    use super::*;

    fn validating(original: &str) -> Option<GuardrailState> {
        transition(
            None,
            GuardrailEvent::Validating {
                content: Some(original),
            },
        )
    }

    #[test]
    fn validating_captures_original_content() {
        let state = validating("A").expect("validating state");
        assert_eq!(state.phase, GuardrailPhase::Validating);
        assert_eq!(state.original_response, "A");
        assert!(!state.has_cleared_for_regen);
    }

    #[test]
    fn validating_without_content_stays_idle() {
        assert_eq!(
            transition(None, GuardrailEvent::Validating { content: Some("") }),
            None
        );
        assert_eq!(
            transition(None, GuardrailEvent::Validating { content: None }),
            None
        );
    }

    #[test]
    fn regenerating_keeps_original_from_validation() {
        let state = transition(
            validating("A"),
            GuardrailEvent::Regenerating { content: Some("A") },
        )
        .expect("regenerating state");

        assert_eq!(state.phase, GuardrailPhase::Regenerating);
        assert_eq!(state.original_response, "A");
        assert!(!state.has_cleared_for_regen);
        assert!(replaces_next_delta(Some(&state)));
    }

    #[test]
    fn regenerating_without_validation_synthesizes_state() {
        let state = transition(None, GuardrailEvent::Regenerating { content: Some("draft") })
            .expect("regenerating state");
        assert_eq!(state.original_response, "draft");

        let state = transition(None, GuardrailEvent::Regenerating { content: None })
            .expect("regenerating state");
        assert_eq!(state.original_response, "");
    }

    #[test]
    fn thinking_resets_everything_but_regeneration() {
        let regenerating =
            transition(validating("A"), GuardrailEvent::Regenerating { content: None });
        assert_eq!(
            transition(regenerating.clone(), GuardrailEvent::Thinking),
            regenerating
        );

        assert_eq!(transition(validating("A"), GuardrailEvent::Thinking), None);
        assert_eq!(transition(None, GuardrailEvent::Thinking), None);

        let done = transition(
            None,
            GuardrailEvent::Completed {
                report: &ClaimsValidation::default(),
                final_content: "A",
            },
        );
        assert_eq!(transition(done, GuardrailEvent::Thinking), None);
    }

    #[test]
    fn fresh_start_sets_flag_and_output_start_clears_it() {
        let state = transition(validating("A"), GuardrailEvent::Regenerating { content: None });
        let cleared = transition(state, GuardrailEvent::FreshStartApplied);
        assert!(cleared.as_ref().is_some_and(|state| state.has_cleared_for_regen));
        assert!(!replaces_next_delta(cleared.as_ref()));

        let restarted = transition(cleared, GuardrailEvent::OutputStarted);
        assert!(replaces_next_delta(restarted.as_ref()));
    }

    #[test]
    fn fresh_start_outside_regeneration_is_ignored() {
        let state = transition(validating("A"), GuardrailEvent::FreshStartApplied);
        assert!(state.is_some_and(|state| !state.has_cleared_for_regen));
    }

    #[test]
    fn completion_records_verdict_and_regenerated_text() {
        let regenerating =
            transition(validating("A"), GuardrailEvent::Regenerating { content: None });
        let cleared = transition(regenerating, GuardrailEvent::FreshStartApplied);
        let report = ClaimsValidation {
            is_compliant: true,
            compliance_score: 0.9,
            was_regenerated: true,
            ..ClaimsValidation::default()
        };

        let done = transition(
            cleared,
            GuardrailEvent::Completed {
                report: &report,
                final_content: "B",
            },
        )
        .expect("done state");

        assert_eq!(done.phase, GuardrailPhase::Done);
        assert_eq!(done.original_response, "A");
        assert_eq!(done.regenerated_response.as_deref(), Some("B"));
        assert!(done.has_cleared_for_regen);
        let verdict = done.verdict.expect("verdict");
        assert!(verdict.compliant);
        assert!(verdict.was_regenerated);
    }

    #[test]
    fn turn_start_and_finish_clear_state() {
        assert_eq!(transition(validating("A"), GuardrailEvent::TurnStarted), None);
        let regenerating = transition(None, GuardrailEvent::Regenerating { content: None });
        assert_eq!(transition(regenerating, GuardrailEvent::Finished), None);
    }
}
