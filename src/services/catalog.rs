//! Criteria providers
//!
//! The dispatcher asks three collaborators about whatever the chat selected:
//! which steps to ask, which choices to offer for a step and how to render the
//! result. [`Catalog`] answers all three for the built-in tools and saved
//! queries.

use std::sync::Arc;

use async_trait::async_trait;

use crate::handlers::keyboard::KeyboardItem;
use crate::handlers::labels;
use crate::models::RenderedResult;
use crate::queries::{schema_from_document, QueryCatalog, QueryRunner};
use crate::state::schema::{LIMIT_STEP, NULL_TOKEN, SELECT_ALL_TOKEN};
use crate::state::{Menu, Session, StepDefinition, StepSchema, StepType};
use crate::tools::{limit_items, ToolKind, ToolRegistry};
use crate::utils::errors::{BridgeError, Result};

/// What the wizard is collecting criteria for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Tool { kind: ToolKind, tool: String },
    Query { id: String },
}

impl Target {
    /// Target selected in a session's open menu
    pub fn from_session(session: &Session) -> Result<Self> {
        match session.menu {
            Menu::Tools => {
                let handle = session
                    .tool_category
                    .as_deref()
                    .ok_or_else(|| BridgeError::Invariant("no tool category selected".to_string()))?;
                let kind = ToolKind::from_handle(handle)
                    .ok_or_else(|| BridgeError::UnknownTool(handle.to_string()))?;
                let tool = session
                    .tool
                    .clone()
                    .ok_or_else(|| BridgeError::Invariant("no tool selected".to_string()))?;
                Ok(Target::Tool { kind, tool })
            }
            Menu::Queries => {
                let id = session
                    .query_id
                    .clone()
                    .ok_or_else(|| BridgeError::Invariant("no query selected".to_string()))?;
                Ok(Target::Query { id })
            }
            Menu::None => Err(BridgeError::Invariant(
                "criteria requested while no menu is open".to_string(),
            )),
        }
    }

    /// Short description for logs
    pub fn describe(&self) -> String {
        match self {
            Target::Tool { kind, tool } => format!("{}:{}", kind, tool),
            Target::Query { id } => format!("query:{}", id),
        }
    }
}

#[async_trait]
pub trait StepSchemaProvider: Send + Sync {
    async fn criteria_steps(&self, target: &Target, session: &Session) -> Result<StepSchema>;
}

#[async_trait]
pub trait ChoiceProvider: Send + Sync {
    async fn keyboard_items(&self, target: &Target, step: &StepDefinition, session: &Session)
        -> Result<Vec<KeyboardItem>>;
}

#[async_trait]
pub trait ResultRenderer: Send + Sync {
    async fn render(&self, target: &Target, session: &Session) -> Result<RenderedResult>;
}

/// Registered tools plus the optional query catalog
#[derive(Clone, Default)]
pub struct Catalog {
    tools: ToolRegistry,
    queries: Option<Arc<dyn QueryCatalog>>,
    runner: Option<Arc<dyn QueryRunner>>,
}

impl Catalog {
    pub fn new(tools: ToolRegistry) -> Self {
        Self {
            tools,
            queries: None,
            runner: None,
        }
    }

    pub fn with_queries(mut self, queries: Arc<dyn QueryCatalog>, runner: Arc<dyn QueryRunner>) -> Self {
        self.queries = Some(queries);
        self.runner = Some(runner);
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn queries(&self) -> Option<&Arc<dyn QueryCatalog>> {
        self.queries.as_ref()
    }

    fn query_parts(&self) -> Result<(&Arc<dyn QueryCatalog>, &Arc<dyn QueryRunner>)> {
        match (&self.queries, &self.runner) {
            (Some(queries), Some(runner)) => Ok((queries, runner)),
            _ => Err(BridgeError::ServiceUnavailable("queries are not configured".to_string())),
        }
    }

    async fn query_schema(&self, id: &str) -> Result<(String, StepSchema)> {
        let (queries, _) = self.query_parts()?;
        let document = queries.document(id).await?;
        let schema = schema_from_document(&document)?;
        Ok((document, schema))
    }
}

#[async_trait]
impl StepSchemaProvider for Catalog {
    async fn criteria_steps(&self, target: &Target, session: &Session) -> Result<StepSchema> {
        match target {
            Target::Tool { kind, tool } => self.tools.require(*kind)?.criteria(tool, session).await,
            Target::Query { id } => Ok(self.query_schema(id).await?.1),
        }
    }
}

#[async_trait]
impl ChoiceProvider for Catalog {
    async fn keyboard_items(
        &self,
        target: &Target,
        step: &StepDefinition,
        session: &Session,
    ) -> Result<Vec<KeyboardItem>> {
        match target {
            Target::Tool { kind, .. } => self.tools.require(*kind)?.keyboard_items(&step.name, session).await,
            Target::Query { .. } => {
                if step.name == LIMIT_STEP {
                    return Ok(limit_items());
                }
                if step.step_type == StepType::Boolean {
                    let mut items = vec![KeyboardItem::plain("true"), KeyboardItem::plain("false")];
                    if step.is_nullable() {
                        items.push(KeyboardItem::plain(NULL_TOKEN));
                    }
                    return Ok(items);
                }

                let (queries, _) = self.query_parts()?;
                let mut items = Vec::new();
                if step.select_all {
                    items.push(KeyboardItem::new(labels::ALL, SELECT_ALL_TOKEN).row_after());
                }
                items.extend(queries.choices(&step.name).await?);
                Ok(items)
            }
        }
    }
}

#[async_trait]
impl ResultRenderer for Catalog {
    async fn render(&self, target: &Target, session: &Session) -> Result<RenderedResult> {
        match target {
            Target::Tool { kind, tool } => self.tools.require(*kind)?.render(tool, session).await,
            Target::Query { id } => {
                let (_, runner) = self.query_parts()?;
                let (document, schema) = self.query_schema(id).await?;
                runner.run(&document, &schema, session).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_target_from_tools_menu() {
        let mut session = Session::new(1);
        session.open_menu(Menu::Tools);
        session.tool_category = Some("commerce".to_string());
        session.tool = Some("Total Orders".to_string());
        assert_eq!(
            Target::from_session(&session).unwrap(),
            Target::Tool {
                kind: ToolKind::Commerce,
                tool: "Total Orders".to_string()
            }
        );
    }

    #[test]
    fn test_target_needs_open_menu() {
        let session = Session::new(1);
        assert_matches!(Target::from_session(&session), Err(BridgeError::Invariant(_)));
    }

    #[tokio::test]
    async fn test_queries_unavailable_without_catalog() {
        let catalog = Catalog::new(ToolRegistry::new());
        let target = Target::Query { id: "a.graphql".to_string() };
        let result = catalog.criteria_steps(&target, &Session::new(1)).await;
        assert_matches!(result, Err(BridgeError::ServiceUnavailable(_)));
    }
}
