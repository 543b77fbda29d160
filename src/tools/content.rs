//! Content management tool: recent entries and drafts

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{limit_items, ToolEntry, ToolKind, ToolType};
use crate::handlers::keyboard::KeyboardItem;
use crate::handlers::labels;
use crate::models::RenderedResult;
use crate::state::schema::{LIMIT_STEP, SELECT_ALL_TOKEN};
use crate::state::{Session, StepDefinition, StepSchema, StepType};
use crate::utils::errors::{BridgeError, Result};
use crate::utils::helpers::{escape_html, text_table};

pub const RECENT_ENTRIES: &str = "Recent Entries";
pub const MY_DRAFTS: &str = "My Drafts";

pub const SITE_STEP: &str = "siteId";
pub const SECTION_STEP: &str = "sectionId";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub name: String,
    /// Single sections hold exactly one entry and cannot be listed
    pub single: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySummary {
    pub title: String,
    pub created_at: NaiveDateTime,
    pub author: Option<String>,
}

/// Data source for the content tool; every call is scoped to the bound user
#[async_trait]
pub trait ContentBackend: Send + Sync {
    /// Sites the user may edit
    async fn sites(&self, user: &str) -> Result<Vec<Site>>;

    /// Sections the user may view
    async fn sections(&self, user: &str) -> Result<Vec<Section>>;

    /// Newest entries first; `section` of `None` means every section
    async fn recent_entries(
        &self,
        user: &str,
        site_id: Option<&str>,
        section_id: Option<&str>,
        limit: u32,
    ) -> Result<Vec<EntrySummary>>;

    async fn drafts(&self, user: &str, limit: u32) -> Result<Vec<EntrySummary>>;
}

pub struct ContentTool {
    backend: Arc<dyn ContentBackend>,
}

impl ContentTool {
    pub fn new(backend: Arc<dyn ContentBackend>) -> Self {
        Self { backend }
    }

    fn user(session: &Session) -> Result<&str> {
        session
            .bound_user
            .as_deref()
            .ok_or_else(|| BridgeError::PermissionDenied(format!("chat {} has no bound user", session.chat_id)))
    }

    fn limit(session: &Session) -> u32 {
        session
            .text(LIMIT_STEP)
            .and_then(|value| value.parse::<u32>().ok())
            .filter(|limit| *limit > 0)
            .unwrap_or(10)
    }

    /// `*` selects everything
    fn selected(session: &Session, step: &str) -> Option<String> {
        session
            .text(step)
            .filter(|value| *value != SELECT_ALL_TOKEN)
            .map(str::to_string)
    }

    fn table(title: &str, headers: &[&str], rows: Vec<Vec<String>>) -> RenderedResult {
        RenderedResult::text(format!(
            "{}\n<pre>{}</pre>",
            escape_html(title),
            escape_html(&text_table(headers, &rows))
        ))
    }
}

#[async_trait]
impl ToolType for ContentTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Content
    }

    fn display_name(&self) -> String {
        "Craft".to_string()
    }

    fn tools(&self) -> Vec<ToolEntry> {
        vec![
            ToolEntry::new(RECENT_ENTRIES, RECENT_ENTRIES),
            ToolEntry::new(MY_DRAFTS, MY_DRAFTS),
        ]
    }

    async fn criteria(&self, tool: &str, session: &Session) -> Result<StepSchema> {
        let limit = StepDefinition::new(LIMIT_STEP, StepType::Integer).label("limit").required();

        match tool {
            RECENT_ENTRIES => {
                let user = Self::user(session)?;
                let sites = self.backend.sites(user).await?;
                let sections = self.backend.sections(user).await?;

                let site = StepDefinition::new(SITE_STEP, StepType::Choice)
                    .label("site")
                    .required()
                    .validator(move |raw, _| {
                        if raw == SELECT_ALL_TOKEN || sites.iter().any(|site| site.id == raw) {
                            Ok(())
                        } else {
                            Err("Selected site is not valid.".to_string())
                        }
                    });

                let section = StepDefinition::new(SECTION_STEP, StepType::Choice)
                    .label("section")
                    .required()
                    .validator(move |raw, _| {
                        if raw == SELECT_ALL_TOKEN {
                            return Ok(());
                        }
                        match sections.iter().find(|section| section.id == raw) {
                            None => Err("Selected section is not valid.".to_string()),
                            Some(section) if section.single => Err("Selected Section is single.".to_string()),
                            Some(_) => Ok(()),
                        }
                    });

                Ok(StepSchema::new(vec![site, section, limit]))
            }
            MY_DRAFTS => Ok(StepSchema::new(vec![limit])),
            other => Err(BridgeError::UnknownTool(other.to_string())),
        }
    }

    async fn keyboard_items(&self, step: &str, session: &Session) -> Result<Vec<KeyboardItem>> {
        let user = Self::user(session)?;
        let items = match step {
            SITE_STEP => self
                .backend
                .sites(user)
                .await?
                .into_iter()
                .map(|site| KeyboardItem::new(site.name, site.id))
                .collect(),
            SECTION_STEP => {
                let mut items = vec![KeyboardItem::new(labels::ALL, SELECT_ALL_TOKEN).row_after()];
                items.extend(
                    self.backend
                        .sections(user)
                        .await?
                        .into_iter()
                        .filter(|section| !section.single)
                        .map(|section| KeyboardItem::new(section.name, section.id)),
                );
                items
            }
            LIMIT_STEP => limit_items(),
            _ => Vec::new(),
        };
        Ok(items)
    }

    async fn render(&self, tool: &str, session: &Session) -> Result<RenderedResult> {
        let user = Self::user(session)?;
        let limit = Self::limit(session);

        match tool {
            RECENT_ENTRIES => {
                let site = Self::selected(session, SITE_STEP);
                let section = Self::selected(session, SECTION_STEP);
                let entries = self
                    .backend
                    .recent_entries(user, site.as_deref(), section.as_deref(), limit)
                    .await?;
                let rows = entries
                    .into_iter()
                    .take(limit as usize)
                    .map(|entry| {
                        vec![
                            entry.title,
                            entry.created_at.format("%Y-%m-%d %H:%M").to_string(),
                            entry.author.unwrap_or_default(),
                        ]
                    })
                    .collect();
                Ok(Self::table(RECENT_ENTRIES, &["Title", "Date Created", "Author"], rows))
            }
            MY_DRAFTS => {
                let drafts = self.backend.drafts(user, limit).await?;
                let rows = drafts
                    .into_iter()
                    .take(limit as usize)
                    .map(|draft| vec![draft.title, draft.created_at.format("%Y-%m-%d %H:%M").to_string()])
                    .collect();
                Ok(Self::table(MY_DRAFTS, &["Title", "Date Created"], rows))
            }
            other => Err(BridgeError::UnknownTool(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{StepEngine, StepInput, StepOutcome, StepValue};
    use assert_matches::assert_matches;
    use chrono::NaiveDate;

    struct FixedBackend;

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .and_then(|date| date.and_hms_opt(9, 30, 0))
            .unwrap()
    }

    #[async_trait]
    impl ContentBackend for FixedBackend {
        async fn sites(&self, _user: &str) -> Result<Vec<Site>> {
            Ok(vec![Site { id: "1".to_string(), name: "Main".to_string() }])
        }

        async fn sections(&self, _user: &str) -> Result<Vec<Section>> {
            Ok(vec![
                Section { id: "2".to_string(), name: "News".to_string(), single: false },
                Section { id: "3".to_string(), name: "Home".to_string(), single: true },
            ])
        }

        async fn recent_entries(
            &self,
            _user: &str,
            _site_id: Option<&str>,
            section_id: Option<&str>,
            _limit: u32,
        ) -> Result<Vec<EntrySummary>> {
            Ok((1..=3)
                .map(|day| EntrySummary {
                    title: format!("Entry {} in {}", day, section_id.unwrap_or("all")),
                    created_at: at(day),
                    author: Some("editor".to_string()),
                })
                .collect())
        }

        async fn drafts(&self, _user: &str, _limit: u32) -> Result<Vec<EntrySummary>> {
            Ok(Vec::new())
        }
    }

    fn session() -> Session {
        let mut session = Session::new(3);
        session.bound_user = Some("editor".to_string());
        session
    }

    #[tokio::test]
    async fn test_section_validation() {
        let tool = ContentTool::new(Arc::new(FixedBackend));
        let mut session = session();
        let schema = tool.criteria(RECENT_ENTRIES, &session).await.unwrap();
        let engine = StepEngine::new(&schema);
        engine.start(&mut session);
        engine.submit(&mut session, StepInput::Value("1".to_string())).unwrap();

        let outcome = engine.submit(&mut session, StepInput::Value("3".to_string())).unwrap();
        assert_matches!(outcome, StepOutcome::Invalid { message, .. } if message == "Selected Section is single.");

        let outcome = engine.submit(&mut session, StepInput::Value("*".to_string())).unwrap();
        assert_eq!(outcome, StepOutcome::AwaitingInput { step: LIMIT_STEP.to_string(), position: 3 });
    }

    #[tokio::test]
    async fn test_section_keyboard_hides_singles() {
        let tool = ContentTool::new(Arc::new(FixedBackend));
        let items = tool.keyboard_items(SECTION_STEP, &session()).await.unwrap();
        let labels: Vec<&str> = items.iter().map(|item| item.label.as_str()).collect();
        assert_eq!(labels, vec!["All", "News"]);
        assert_eq!(items[0].value, "*");
    }

    #[tokio::test]
    async fn test_recent_entries_respects_limit() {
        let tool = ContentTool::new(Arc::new(FixedBackend));
        let mut session = session();
        session.commit(SITE_STEP, StepValue::Text("1".to_string()));
        session.commit(SECTION_STEP, StepValue::Text("*".to_string()));
        session.commit(LIMIT_STEP, StepValue::Text("2".to_string()));

        let result = tool.render(RECENT_ENTRIES, &session).await.unwrap();
        assert!(result.text.starts_with("Recent Entries\n<pre>"));
        assert!(result.text.contains("Entry 2 in all"));
        assert!(!result.text.contains("Entry 3"));
        assert!(result.text.contains("2024-03-01 09:30"));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let tool = ContentTool::new(Arc::new(FixedBackend));
        assert_matches!(tool.criteria("Assets", &session()).await, Err(BridgeError::UnknownTool(_)));
    }
}
