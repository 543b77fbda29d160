//! Step schema definitions
//!
//! A [`StepSchema`] is the ordered list of questions a tool or query asks
//! before it can produce a result. Schemas are rebuilt from their provider on
//! every update, so validators may capture whatever live data they need at
//! construction time.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::session::Session;

/// Name of the hidden pagination step; it is never prompted
pub const OFFSET_STEP: &str = "offset";

/// Name of the page size step; it is always nullable
pub const LIMIT_STEP: &str = "limit";

/// Token that submits an explicit null for nullable steps
pub const NULL_TOKEN: &str = "null";

/// Token that selects every choice on steps that allow it
pub const SELECT_ALL_TOKEN: &str = "*";

/// Kind of value a step expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepType {
    Boolean,
    Integer,
    Float,
    Text,
    File,
    Choice,
}

impl StepType {
    /// Map a GraphQL named type onto a step type
    pub fn from_graphql(type_name: &str) -> Self {
        match type_name {
            "Boolean" => StepType::Boolean,
            "Int" => StepType::Integer,
            "Float" => StepType::Float,
            "FileInput" => StepType::File,
            _ => StepType::Text,
        }
    }
}

/// A captured step value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StepValue {
    Text(String),
    List(Vec<String>),
    /// Explicit "no value", distinct from a step that was never answered
    Null,
    /// Canonical "every choice" value of a select-all step
    All,
}

impl StepValue {
    /// Whether this value satisfies a `showIf` allowed-value set.
    ///
    /// Comparison is case-insensitive on the captured side, matching how the
    /// choice keyboards send display-cased values.
    pub fn matches_any(&self, allowed: &[String]) -> bool {
        let hit = |candidate: &str| {
            let lowered = candidate.to_lowercase();
            allowed.iter().any(|a| *a == lowered)
        };
        match self {
            StepValue::Text(text) => hit(text),
            StepValue::List(items) => items.iter().any(|item| hit(item)),
            StepValue::Null => hit(NULL_TOKEN),
            StepValue::All => hit(SELECT_ALL_TOKEN),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            StepValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Outcome of a validator: `Err` carries the message shown to the user
pub type Validation = std::result::Result<(), String>;

/// Step input validator, resolved when the schema is built
pub type Validator = Arc<dyn Fn(&str, &Session) -> Validation + Send + Sync>;

/// One question of a wizard
#[derive(Clone)]
pub struct StepDefinition {
    pub name: String,
    pub label: String,
    pub step_type: StepType,
    pub multiple: bool,
    pub nullable: bool,
    /// Structurally skipped; an auto-filled value may stand in for the answer
    pub skip: bool,
    pub prefill: Option<StepValue>,
    /// Accepts [`SELECT_ALL_TOKEN`] as a complete answer
    pub select_all: bool,
    pub validator: Option<Validator>,
    /// Every listed step must hold one of the allowed (lowercase) values
    pub show_if: HashMap<String, Vec<String>>,
}

impl StepDefinition {
    /// New nullable, single-valued step labelled with its own name
    pub fn new(name: impl Into<String>, step_type: StepType) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            step_type,
            multiple: false,
            nullable: true,
            skip: false,
            prefill: None,
            select_all: false,
            validator: None,
            show_if: HashMap::new(),
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn required(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    pub fn with_select_all(mut self) -> Self {
        self.select_all = true;
        self
    }

    /// Skip the prompt, optionally recording `value` as the answer
    pub fn skipped(mut self, value: Option<StepValue>) -> Self {
        self.skip = true;
        self.prefill = value;
        self
    }

    pub fn validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&str, &Session) -> Validation + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn show_if<I, S>(mut self, step: impl Into<String>, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let allowed = allowed.into_iter().map(|v| v.into().to_lowercase()).collect();
        self.show_if.insert(step.into(), allowed);
        self
    }

    /// `limit` steps accept an empty answer whatever the declaration says
    pub fn is_nullable(&self) -> bool {
        self.nullable || self.name == LIMIT_STEP
    }

    /// The hidden pagination step
    pub fn is_offset(&self) -> bool {
        self.name == OFFSET_STEP
    }

    pub fn validate(&self, raw: &str, session: &Session) -> Validation {
        match &self.validator {
            Some(validator) => validator(raw, session),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDefinition")
            .field("name", &self.name)
            .field("label", &self.label)
            .field("step_type", &self.step_type)
            .field("multiple", &self.multiple)
            .field("nullable", &self.nullable)
            .field("skip", &self.skip)
            .field("select_all", &self.select_all)
            .field("has_validator", &self.validator.is_some())
            .field("show_if", &self.show_if)
            .finish()
    }
}

/// Ordered step list; order is traversal order
#[derive(Debug, Clone, Default)]
pub struct StepSchema {
    steps: Vec<StepDefinition>,
}

impl StepSchema {
    pub fn new(steps: Vec<StepDefinition>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    pub fn get(&self, name: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|step| step.name == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.steps.iter().position(|step| step.name == name)
    }

    pub fn has_offset(&self) -> bool {
        self.steps.iter().any(StepDefinition::is_offset)
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl FromIterator<StepDefinition> for StepSchema {
    fn from_iter<T: IntoIterator<Item = StepDefinition>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_defaults() {
        let step = StepDefinition::new("siteId", StepType::Choice);
        assert_eq!(step.label, "siteId");
        assert!(step.nullable);
        assert!(!step.multiple);
        assert!(step.validate("anything", &Session::new(1)).is_ok());
    }

    #[test]
    fn test_limit_is_always_nullable() {
        let step = StepDefinition::new(LIMIT_STEP, StepType::Integer).required();
        assert!(!step.nullable);
        assert!(step.is_nullable());

        let other = StepDefinition::new("count", StepType::Integer).required();
        assert!(!other.is_nullable());
    }

    #[test]
    fn test_validator_runs() {
        let step = StepDefinition::new("type", StepType::Choice)
            .validator(|raw, _| if raw == "Qty" { Ok(()) } else { Err(format!("The {} is not valid.", raw)) });
        let session = Session::new(1);
        assert!(step.validate("Qty", &session).is_ok());
        assert_eq!(step.validate("Weight", &session), Err("The Weight is not valid.".to_string()));
    }

    #[test]
    fn test_show_if_matching_is_case_insensitive() {
        let allowed = vec!["revenue".to_string()];
        assert!(StepValue::Text("Revenue".to_string()).matches_any(&allowed));
        assert!(!StepValue::Text("Qty".to_string()).matches_any(&allowed));
        assert!(StepValue::List(vec!["Qty".to_string(), "REVENUE".to_string()]).matches_any(&allowed));
        assert!(!StepValue::Null.matches_any(&allowed));
    }

    #[test]
    fn test_graphql_type_mapping() {
        assert_eq!(StepType::from_graphql("Int"), StepType::Integer);
        assert_eq!(StepType::from_graphql("Boolean"), StepType::Boolean);
        assert_eq!(StepType::from_graphql("FileInput"), StepType::File);
        assert_eq!(StepType::from_graphql("ID"), StepType::Text);
    }

    #[test]
    fn test_schema_lookup() {
        let schema: StepSchema = vec![
            StepDefinition::new("a", StepType::Text),
            StepDefinition::new(OFFSET_STEP, StepType::Integer),
        ]
        .into_iter()
        .collect();
        assert_eq!(schema.position("a"), Some(0));
        assert!(schema.get("missing").is_none());
        assert!(schema.has_offset());
    }
}
