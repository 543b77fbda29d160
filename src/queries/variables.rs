//! Wizard steps derived from GraphQL variable definitions

use regex::Regex;

use crate::state::{StepDefinition, StepSchema, StepType};
use crate::utils::errors::{BridgeError, Result};

/// Variable that accepts the select-all token
pub const SITE_VARIABLE: &str = "site";

/// One `$name: Type` entry of an operation header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableDefinition {
    pub name: String,
    /// Innermost named type
    pub type_name: String,
    /// A list at any nesting level
    pub list: bool,
    /// Outermost `!`
    pub non_null: bool,
}

const VARIABLE_PATTERN: &str = r"\$(?P<name>[_A-Za-z][_0-9A-Za-z]*)\s*:\s*(?P<ty>[\[\]_0-9A-Za-z!\s]+)";

/// Drop `#` comments and blank out string contents, so that brackets, `#`
/// and `$` inside string defaults carry no meaning.
fn sanitize(document: &str) -> String {
    let mut out = String::with_capacity(document.len());
    let mut chars = document.chars();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            match c {
                '"' => {
                    in_string = false;
                    out.push('"');
                }
                '\\' => {
                    chars.next();
                    out.push_str("  ");
                }
                '\n' => out.push('\n'),
                _ => out.push(' '),
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push('"');
            }
            '#' => {
                if chars.by_ref().any(|rest| rest == '\n') {
                    out.push('\n');
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Text between the operation's `(` and its matching `)`.
///
/// `None` when the selection set opens first.
fn argument_list(document: &str) -> Option<&str> {
    let mut start = None;
    let mut depth = 0usize;

    for (index, c) in document.char_indices() {
        match (c, start) {
            ('{', None) => return None,
            ('(', None) => {
                start = Some(index + 1);
                depth = 1;
            }
            ('(' | '[' | '{', Some(_)) => depth += 1,
            (')' | ']' | '}', Some(from)) => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&document[from..index]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Variables declared by the first operation of a document.
///
/// Only the operation header is read: the parenthesized list before the
/// selection set opens. Anonymous operations declare nothing.
pub fn parse_variables(document: &str) -> Result<Vec<VariableDefinition>> {
    let document = sanitize(document);
    let arguments = match argument_list(&document) {
        Some(arguments) => arguments,
        None => return Ok(Vec::new()),
    };

    let pattern = Regex::new(VARIABLE_PATTERN)
        .map_err(|_| BridgeError::Config("Invalid variable pattern".to_string()))?;

    let variables = pattern
        .captures_iter(arguments)
        .map(|captures| {
            let ty: String = captures["ty"].chars().filter(|c| !c.is_whitespace()).collect();
            let type_name = ty
                .trim_matches(|c| c == '[' || c == ']' || c == '!')
                .to_string();
            VariableDefinition {
                name: captures["name"].to_string(),
                list: ty.contains('['),
                non_null: ty.ends_with('!'),
                type_name,
            }
        })
        .collect();
    Ok(variables)
}

fn validate_integer(raw: &str) -> crate::state::Validation {
    raw.trim()
        .parse::<i64>()
        .map(|_| ())
        .map_err(|_| format!("{} is not a valid integer.", raw))
}

fn validate_float(raw: &str) -> crate::state::Validation {
    raw.trim()
        .parse::<f64>()
        .map(|_| ())
        .map_err(|_| format!("{} is not a valid number.", raw))
}

fn validate_boolean(raw: &str) -> crate::state::Validation {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "false" => Ok(()),
        _ => Err(format!("{} is not a valid boolean.", raw)),
    }
}

impl VariableDefinition {
    /// Wizard step asking for this variable
    pub fn to_step(&self) -> StepDefinition {
        let step_type = StepType::from_graphql(&self.type_name);
        let mut step = StepDefinition::new(&self.name, step_type).nullable(!self.non_null);
        if self.list {
            step = step.multiple();
        }
        if self.name == SITE_VARIABLE {
            step = step.with_select_all();
        }
        match step_type {
            StepType::Integer => step.validator(|raw, _| validate_integer(raw)),
            StepType::Float => step.validator(|raw, _| validate_float(raw)),
            StepType::Boolean => step.validator(|raw, _| validate_boolean(raw)),
            _ => step,
        }
    }
}

/// Step schema for a query document, in declaration order
pub fn schema_from_document(document: &str) -> Result<StepSchema> {
    Ok(parse_variables(document)?
        .iter()
        .map(VariableDefinition::to_step)
        .collect())
}
