//! Criteria wizard step engine
//!
//! The engine walks a [`StepSchema`] for one chat, recording answers in the
//! chat's [`Session`]. It never renders anything: callers turn the returned
//! [`StepOutcome`] into prompts or results.

use std::fmt;

use crate::utils::errors::{BridgeError, Result};
use crate::utils::logging;
use super::schema::{StepDefinition, StepSchema, StepValue, NULL_TOKEN, SELECT_ALL_TOKEN};
use super::session::Session;

/// Message shown when "Next Step" is used on a step that needs an answer
pub const REQUIRED_STEP_MESSAGE: &str = "This step is required.";

/// Input handed to the engine for the step under the cursor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepInput {
    /// A typed or chosen value
    Value(String),
    /// The "Next Step" control: skip a nullable step or close a multi-select
    NextStep,
}

/// Result of driving the engine once
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Waiting for `step`; `position` is its 1-based place in the schema
    AwaitingInput { step: String, position: usize },
    /// A multi-select choice was added; the same step keeps waiting
    Accumulated { step: String },
    /// The input was rejected; nothing was recorded
    Invalid { step: String, message: String },
    /// Every step is answered or skipped
    Complete,
}

/// Coarse wizard state of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardState {
    Idle,
    AwaitingInput(String),
    Complete,
}

impl fmt::Display for WizardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WizardState::Idle => write!(f, "idle"),
            WizardState::AwaitingInput(step) => write!(f, "awaiting:{}", step),
            WizardState::Complete => write!(f, "complete"),
        }
    }
}

/// Drives one schema against a session
#[derive(Debug, Clone, Copy)]
pub struct StepEngine<'a> {
    schema: &'a StepSchema,
}

impl<'a> StepEngine<'a> {
    pub fn new(schema: &'a StepSchema) -> Self {
        Self { schema }
    }

    /// Current wizard state of a session
    pub fn state(session: &Session) -> WizardState {
        match &session.criteria_step {
            Some(step) => WizardState::AwaitingInput(step.clone()),
            None if session.result_seen => WizardState::Complete,
            None => WizardState::Idle,
        }
    }

    /// Begin the wizard from the first unanswered step
    pub fn start(&self, session: &mut Session) -> StepOutcome {
        session.criteria_step = None;
        session.previous_criteria_step = None;
        session.pending_selection.clear();
        self.advance(session)
    }

    /// Move the cursor to the next step still needing an answer
    pub fn advance(&self, session: &mut Session) -> StepOutcome {
        for (index, step) in self.schema.steps().iter().enumerate() {
            if step.is_offset() {
                continue;
            }

            if step.skip {
                if let Some(value) = &step.prefill {
                    session.prefill(&step.name, value.clone());
                }
                continue;
            }

            if session.is_satisfied(&step.name) || !Self::is_visible(step, session) {
                continue;
            }

            let old = session.criteria_step.take();
            if let Some(old) = old.as_deref() {
                // Only an answered step is worth going back to
                if old != step.name && session.is_satisfied(old) {
                    session.previous_criteria_step = Some(old.to_string());
                }
            }
            logging::log_step_transition(session.chat_id, old.as_deref(), Some(&step.name));
            session.criteria_step = Some(step.name.clone());
            session.touch();

            return StepOutcome::AwaitingInput {
                step: step.name.clone(),
                position: index + 1,
            };
        }

        logging::log_step_transition(session.chat_id, session.criteria_step.as_deref(), None);
        session.criteria_step = None;
        session.previous_criteria_step = None;
        session.pending_selection.clear();
        session.touch();
        StepOutcome::Complete
    }

    /// Apply input to the step under the cursor
    pub fn submit(&self, session: &mut Session, input: StepInput) -> Result<StepOutcome> {
        let step = self.current_step(session)?;
        let name = step.name.clone();

        match input {
            StepInput::NextStep => {
                if step.multiple {
                    let selection = std::mem::take(&mut session.pending_selection);
                    session.commit(&name, StepValue::List(selection));
                } else if step.is_nullable() {
                    session.pass(&name);
                } else {
                    return Ok(StepOutcome::Invalid {
                        step: name,
                        message: REQUIRED_STEP_MESSAGE.to_string(),
                    });
                }
                Ok(self.advance(session))
            }
            StepInput::Value(raw) => {
                if step.select_all && raw == SELECT_ALL_TOKEN {
                    session.pending_selection.clear();
                    session.commit(&name, StepValue::All);
                    return Ok(self.advance(session));
                }

                if raw == NULL_TOKEN && step.is_nullable() {
                    session.pending_selection.clear();
                    session.commit(&name, StepValue::Null);
                    return Ok(self.advance(session));
                }

                if let Err(message) = step.validate(&raw, session) {
                    return Ok(StepOutcome::Invalid { step: name, message });
                }

                if step.multiple {
                    if !session.pending_selection.contains(&raw) {
                        session.pending_selection.push(raw);
                    }
                    session.touch();
                    Ok(StepOutcome::Accumulated { step: name })
                } else {
                    session.commit(&name, StepValue::Text(raw));
                    Ok(self.advance(session))
                }
            }
        }
    }

    /// Re-ask the previously answered step.
    ///
    /// Returns `None` when there is nothing to go back to; only one level of
    /// undo is kept.
    pub fn back(&self, session: &mut Session) -> Result<Option<StepOutcome>> {
        let current = self.current_step(session)?.name.clone();
        let previous = match session.previous_criteria_step.take() {
            Some(previous) => previous,
            None => return Ok(None),
        };
        let position = self.schema.position(&previous).ok_or_else(|| {
            BridgeError::Invariant(format!("previous step {} is not in the schema", previous))
        })?;

        session.clear_step(&previous);
        session.clear_step(&current);
        session.pending_selection.clear();
        logging::log_step_transition(session.chat_id, Some(&current), Some(&previous));
        session.criteria_step = Some(previous.clone());

        Ok(Some(StepOutcome::AwaitingInput {
            step: previous,
            position: position + 1,
        }))
    }

    /// Definition of the step under the cursor
    pub fn current_step(&self, session: &Session) -> Result<&'a StepDefinition> {
        let name = session.criteria_step.as_deref().ok_or_else(|| BridgeError::InvalidStateTransition {
            from: "idle".to_string(),
            to: "criteria".to_string(),
        })?;
        self.schema
            .get(name)
            .ok_or_else(|| BridgeError::Invariant(format!("cursor step {} is not in the schema", name)))
    }

    /// Whether every `showIf` condition of a step holds
    pub fn is_visible(step: &StepDefinition, session: &Session) -> bool {
        step.show_if.iter().all(|(dependency, allowed)| {
            session
                .value(dependency)
                .map_or(false, |value| value.matches_any(allowed))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::schema::{StepType, LIMIT_STEP, OFFSET_STEP};
    use assert_matches::assert_matches;

    fn value(raw: &str) -> StepInput {
        StepInput::Value(raw.to_string())
    }

    fn awaiting(step: &str) -> String {
        step.to_string()
    }

    fn text_step(name: &str) -> StepDefinition {
        StepDefinition::new(name, StepType::Text).required()
    }

    #[test]
    fn test_start_lands_on_first_step() {
        let schema = StepSchema::new(vec![text_step("a"), text_step("b")]);
        let engine = StepEngine::new(&schema);
        let mut session = Session::new(1);

        assert_eq!(StepEngine::state(&session), WizardState::Idle);
        let outcome = engine.start(&mut session);
        assert_eq!(outcome, StepOutcome::AwaitingInput { step: awaiting("a"), position: 1 });
        assert_eq!(StepEngine::state(&session), WizardState::AwaitingInput("a".to_string()));
        assert!(session.previous_criteria_step.is_none());
    }

    #[test]
    fn test_single_values_advance_to_complete() {
        let schema = StepSchema::new(vec![text_step("a"), text_step("b")]);
        let engine = StepEngine::new(&schema);
        let mut session = Session::new(1);
        engine.start(&mut session);

        let outcome = engine.submit(&mut session, value("x")).unwrap();
        assert_eq!(outcome, StepOutcome::AwaitingInput { step: awaiting("b"), position: 2 });
        assert_eq!(session.previous_criteria_step.as_deref(), Some("a"));

        let outcome = engine.submit(&mut session, value("y")).unwrap();
        assert_eq!(outcome, StepOutcome::Complete);
        assert!(session.criteria_step.is_none());
        assert!(session.previous_criteria_step.is_none());
        assert_eq!(session.captured().len(), 2);
    }

    #[test]
    fn test_conditional_first_step_remembers_dependency() {
        let schema = StepSchema::new(vec![
            text_step("detail").show_if("kind", ["full"]),
            text_step("kind"),
        ]);
        let engine = StepEngine::new(&schema);
        let mut session = Session::new(1);

        assert_eq!(engine.start(&mut session), StepOutcome::AwaitingInput { step: awaiting("kind"), position: 2 });
        let outcome = engine.submit(&mut session, value("full")).unwrap();
        assert_eq!(outcome, StepOutcome::AwaitingInput { step: awaiting("detail"), position: 1 });
        assert_eq!(session.previous_criteria_step.as_deref(), Some("kind"));

        let outcome = engine.back(&mut session).unwrap();
        assert_eq!(outcome, Some(StepOutcome::AwaitingInput { step: awaiting("kind"), position: 2 }));
    }

    #[test]
    fn test_validation_failure_keeps_cursor() {
        let schema = StepSchema::new(vec![text_step("n").validator(|raw, _| {
            raw.parse::<i64>().map(|_| ()).map_err(|_| format!("{} is not a number.", raw))
        })]);
        let engine = StepEngine::new(&schema);
        let mut session = Session::new(1);
        engine.start(&mut session);

        let outcome = engine.submit(&mut session, value("ten")).unwrap();
        assert_eq!(
            outcome,
            StepOutcome::Invalid { step: awaiting("n"), message: "ten is not a number.".to_string() }
        );
        assert_eq!(session.criteria_step.as_deref(), Some("n"));
        assert!(session.captured().is_empty());
    }

    #[test]
    fn test_multiple_step_accumulates_until_next_step() {
        let schema = StepSchema::new(vec![StepDefinition::new("statuses", StepType::Choice).multiple()]);
        let engine = StepEngine::new(&schema);
        let mut session = Session::new(1);
        engine.start(&mut session);

        assert_matches!(engine.submit(&mut session, value("a")).unwrap(), StepOutcome::Accumulated { .. });
        assert_matches!(engine.submit(&mut session, value("b")).unwrap(), StepOutcome::Accumulated { .. });
        assert!(!session.is_satisfied("statuses"));

        let outcome = engine.submit(&mut session, StepInput::NextStep).unwrap();
        assert_eq!(outcome, StepOutcome::Complete);
        assert_eq!(
            session.captured().get("statuses"),
            Some(&StepValue::List(vec!["a".to_string(), "b".to_string()]))
        );
    }

    #[test]
    fn test_multiple_step_commits_empty_list() {
        let schema = StepSchema::new(vec![StepDefinition::new("statuses", StepType::Choice).multiple()]);
        let engine = StepEngine::new(&schema);
        let mut session = Session::new(1);
        engine.start(&mut session);

        assert_eq!(engine.submit(&mut session, StepInput::NextStep).unwrap(), StepOutcome::Complete);
        assert_eq!(session.captured().get("statuses"), Some(&StepValue::List(vec![])));
    }

    #[test]
    fn test_select_all_discards_partial_selection() {
        let schema = StepSchema::new(vec![
            StepDefinition::new("site", StepType::Choice).multiple().with_select_all(),
            text_step("after"),
        ]);
        let engine = StepEngine::new(&schema);
        let mut session = Session::new(1);
        engine.start(&mut session);

        engine.submit(&mut session, value("en")).unwrap();
        let outcome = engine.submit(&mut session, value(SELECT_ALL_TOKEN)).unwrap();
        assert_eq!(outcome, StepOutcome::AwaitingInput { step: awaiting("after"), position: 2 });
        assert_eq!(session.captured().get("site"), Some(&StepValue::All));
        assert!(session.pending_selection.is_empty());
    }

    #[test]
    fn test_wildcard_is_plain_value_without_select_all() {
        let schema = StepSchema::new(vec![StepDefinition::new("tags", StepType::Choice).multiple()]);
        let engine = StepEngine::new(&schema);
        let mut session = Session::new(1);
        engine.start(&mut session);

        assert_matches!(engine.submit(&mut session, value("*")).unwrap(), StepOutcome::Accumulated { .. });
        assert_eq!(session.pending_selection, vec!["*".to_string()]);
    }

    #[test]
    fn test_explicit_null_on_nullable_step() {
        let schema = StepSchema::new(vec![
            StepDefinition::new("flag", StepType::Boolean).validator(|raw, _| match raw {
                "true" | "false" => Ok(()),
                _ => Err("not a boolean".to_string()),
            }),
        ]);
        let engine = StepEngine::new(&schema);
        let mut session = Session::new(1);
        engine.start(&mut session);

        assert_eq!(engine.submit(&mut session, value(NULL_TOKEN)).unwrap(), StepOutcome::Complete);
        assert_eq!(session.captured().get("flag"), Some(&StepValue::Null));
    }

    #[test]
    fn test_null_token_is_validated_on_required_step() {
        let schema = StepSchema::new(vec![text_step("name").validator(|raw, _| {
            if raw == "null" { Err("name cannot be null".to_string()) } else { Ok(()) }
        })]);
        let engine = StepEngine::new(&schema);
        let mut session = Session::new(1);
        engine.start(&mut session);

        assert_matches!(engine.submit(&mut session, value(NULL_TOKEN)).unwrap(), StepOutcome::Invalid { .. });
    }

    #[test]
    fn test_next_step_on_nullable_single_step_passes_it() {
        let schema = StepSchema::new(vec![StepDefinition::new("note", StepType::Text), text_step("b")]);
        let engine = StepEngine::new(&schema);
        let mut session = Session::new(1);
        engine.start(&mut session);

        let outcome = engine.submit(&mut session, StepInput::NextStep).unwrap();
        assert_eq!(outcome, StepOutcome::AwaitingInput { step: awaiting("b"), position: 2 });
        assert!(session.is_satisfied("note"));
        assert!(!session.captured().contains_key("note"));
    }

    #[test]
    fn test_next_step_on_required_step_is_rejected() {
        let schema = StepSchema::new(vec![text_step("timeframe")]);
        let engine = StepEngine::new(&schema);
        let mut session = Session::new(1);
        engine.start(&mut session);

        let outcome = engine.submit(&mut session, StepInput::NextStep).unwrap();
        assert_eq!(
            outcome,
            StepOutcome::Invalid { step: awaiting("timeframe"), message: REQUIRED_STEP_MESSAGE.to_string() }
        );
    }

    #[test]
    fn test_limit_step_can_be_passed_even_when_declared_required() {
        let schema = StepSchema::new(vec![StepDefinition::new(LIMIT_STEP, StepType::Integer).required()]);
        let engine = StepEngine::new(&schema);
        let mut session = Session::new(1);
        engine.start(&mut session);

        assert_eq!(engine.submit(&mut session, StepInput::NextStep).unwrap(), StepOutcome::Complete);
    }

    #[test]
    fn test_zero_value_counts_as_answered() {
        let schema = StepSchema::new(vec![text_step("count"), text_step("b")]);
        let engine = StepEngine::new(&schema);
        let mut session = Session::new(1);
        session.commit("count", StepValue::Text("0".to_string()));

        assert_eq!(engine.start(&mut session), StepOutcome::AwaitingInput { step: awaiting("b"), position: 2 });
    }

    #[test]
    fn test_offset_and_skipped_steps_are_never_prompted() {
        let schema = StepSchema::new(vec![
            StepDefinition::new("storeId", StepType::Choice).skipped(Some(StepValue::Text("1".to_string()))),
            StepDefinition::new(OFFSET_STEP, StepType::Integer),
            text_step("timeframe"),
        ]);
        let engine = StepEngine::new(&schema);
        let mut session = Session::new(1);

        assert_eq!(engine.start(&mut session), StepOutcome::AwaitingInput { step: awaiting("timeframe"), position: 3 });
        assert_eq!(session.text("storeId"), Some("1"));
        assert!(!session.captured().contains_key("storeId"));
    }

    #[test]
    fn test_show_if_hides_step_when_condition_fails() {
        let schema = StepSchema::new(vec![
            text_step("type"),
            StepDefinition::new("options", StepType::Choice).multiple().show_if("type", ["revenue"]),
        ]);
        let engine = StepEngine::new(&schema);

        let mut session = Session::new(1);
        engine.start(&mut session);
        assert_eq!(engine.submit(&mut session, value("Qty")).unwrap(), StepOutcome::Complete);

        let mut session = Session::new(2);
        engine.start(&mut session);
        assert_eq!(
            engine.submit(&mut session, value("Revenue")).unwrap(),
            StepOutcome::AwaitingInput { step: awaiting("options"), position: 2 }
        );
    }

    #[test]
    fn test_show_if_step_before_its_dependency_is_skipped() {
        let schema = StepSchema::new(vec![
            StepDefinition::new("options", StepType::Choice).show_if("type", ["revenue"]),
            text_step("type"),
        ]);
        let engine = StepEngine::new(&schema);
        let mut session = Session::new(1);

        assert_eq!(engine.start(&mut session), StepOutcome::AwaitingInput { step: awaiting("type"), position: 2 });
        assert_eq!(engine.submit(&mut session, value("revenue")).unwrap(), StepOutcome::AwaitingInput { step: awaiting("options"), position: 1 });
    }

    #[test]
    fn test_back_then_resubmit_returns_to_same_step() {
        let schema = StepSchema::new(vec![text_step("a"), text_step("b"), text_step("c")]);
        let engine = StepEngine::new(&schema);
        let mut session = Session::new(1);
        engine.start(&mut session);
        engine.submit(&mut session, value("1")).unwrap();
        let before = engine.submit(&mut session, value("2")).unwrap();
        assert_eq!(before, StepOutcome::AwaitingInput { step: awaiting("c"), position: 3 });

        let back = engine.back(&mut session).unwrap();
        assert_eq!(back, Some(StepOutcome::AwaitingInput { step: awaiting("b"), position: 2 }));
        assert!(!session.is_satisfied("b"));
        assert!(session.is_satisfied("a"));

        let again = engine.submit(&mut session, value("2")).unwrap();
        assert_eq!(again, before);
    }

    #[test]
    fn test_back_keeps_single_level_of_undo() {
        let schema = StepSchema::new(vec![text_step("a"), text_step("b"), text_step("c")]);
        let engine = StepEngine::new(&schema);
        let mut session = Session::new(1);
        engine.start(&mut session);
        engine.submit(&mut session, value("1")).unwrap();
        engine.submit(&mut session, value("2")).unwrap();

        assert!(engine.back(&mut session).unwrap().is_some());
        assert_eq!(engine.back(&mut session).unwrap(), None);
        assert_eq!(session.criteria_step.as_deref(), Some("b"));
        assert!(session.is_satisfied("a"));
    }

    #[test]
    fn test_back_discards_pending_selection() {
        let schema = StepSchema::new(vec![
            text_step("a"),
            StepDefinition::new("statuses", StepType::Choice).multiple(),
        ]);
        let engine = StepEngine::new(&schema);
        let mut session = Session::new(1);
        engine.start(&mut session);
        engine.submit(&mut session, value("1")).unwrap();
        engine.submit(&mut session, value("x")).unwrap();

        engine.back(&mut session).unwrap();
        assert!(session.pending_selection.is_empty());
        assert_eq!(session.criteria_step.as_deref(), Some("a"));
    }

    #[test]
    fn test_submit_without_cursor_is_an_error() {
        let schema = StepSchema::new(vec![text_step("a")]);
        let engine = StepEngine::new(&schema);
        let mut session = Session::new(1);

        assert_matches!(
            engine.submit(&mut session, value("x")),
            Err(BridgeError::InvalidStateTransition { .. })
        );
    }

    #[test]
    fn test_cursor_outside_schema_is_an_invariant_error() {
        let schema = StepSchema::new(vec![text_step("a")]);
        let engine = StepEngine::new(&schema);
        let mut session = Session::new(1);
        session.criteria_step = Some("gone".to_string());

        assert_matches!(engine.submit(&mut session, value("x")), Err(BridgeError::Invariant(_)));
    }
}
