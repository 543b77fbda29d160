//! Update dispatcher
//!
//! Routes one normalized update for a chat:
//!
//! 1. session reset (`/start`, a changed user binding or configuration, or no
//!    stored session) shows the home menu
//! 2. `/chatid` answers with the chat id when enabled
//! 3. the Tools and Queries menu labels open their menu, even mid-wizard
//! 4. otherwise the input is read against what the last reply asked for
//!
//! Anything that matches none of these is reported as invalid and leaves
//! the conversation where it was.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::keyboard::{step_controls, Keyboard};
use super::labels;
use super::menus;
use crate::config::Settings;
use crate::models::{InboundUpdate, Reply};
use crate::services::catalog::{Catalog, ChoiceProvider, ResultRenderer, StepSchemaProvider, Target};
use crate::services::{AccessPolicy, Transport};
use crate::state::schema::LIMIT_STEP;
use crate::state::{
    Expecting, Menu, Session, StateStorage, StepEngine, StepInput, StepOutcome, StepSchema, StepType,
};
use crate::tools::ToolKind;
use crate::utils::errors::{BridgeError, Result};
use crate::utils::logging;

/// What happened to an update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A reply was sent
    Replied,
    /// The chat is not admitted; nothing was sent
    Rejected,
}

pub struct Dispatcher {
    settings: Arc<Settings>,
    fingerprint: u64,
    storage: StateStorage,
    access: Arc<dyn AccessPolicy>,
    catalog: Arc<Catalog>,
    schemas: Arc<dyn StepSchemaProvider>,
    choices: Arc<dyn ChoiceProvider>,
    renderer: Arc<dyn ResultRenderer>,
    transport: Arc<dyn Transport>,
}

impl Dispatcher {
    pub fn new(
        settings: Settings,
        storage: StateStorage,
        access: Arc<dyn AccessPolicy>,
        catalog: Arc<Catalog>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            fingerprint: settings.fingerprint(),
            settings: Arc::new(settings),
            storage,
            access,
            schemas: catalog.clone(),
            choices: catalog.clone(),
            renderer: catalog.clone(),
            catalog,
            transport,
        }
    }

    /// Render results with something other than the catalog
    pub fn with_renderer(mut self, renderer: Arc<dyn ResultRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn storage(&self) -> &StateStorage {
        &self.storage
    }

    /// Handle one update end to end: route, persist, acknowledge and reply
    pub async fn handle(&self, update: InboundUpdate) -> Result<Dispatch> {
        let chat_id = update.chat_id;
        logging::log_update_received(chat_id, update.update_id, update.is_callback(), update.file.is_some());

        let chat_id_request = self.is_chat_id_request(&update.text);
        if !self.access.is_allowed(chat_id) {
            if !chat_id_request {
                logging::log_rejected_chat(chat_id);
                return Ok(Dispatch::Rejected);
            }
            // Unlisted chats may still learn their id to get listed
            self.acknowledge(update.callback_id.as_deref()).await;
            self.deliver(chat_id, Reply::message(chat_id.to_string())).await?;
            return Ok(Dispatch::Replied);
        }

        let text = match &update.file {
            Some(file) => self.transport.download_file(file).await?,
            None => update.text.trim().to_string(),
        };

        let (stored, unreadable) = match self.storage.load_session(chat_id).await {
            Ok(stored) => (stored, false),
            Err(BridgeError::Serialization(e)) => {
                warn!(chat_id, error = %e, "Stored session is unreadable, starting over");
                (None, true)
            }
            Err(e) => return Err(e),
        };
        let reset = match &stored {
            Some(session) => self.reset_reason(session, &text),
            None if unreadable => Some("unreadable session"),
            None => None,
        };

        let (mut session, reply) = match stored {
            Some(mut session) if reset.is_none() => {
                let reply = self.route(&mut session, &text).await?;
                (session, reply)
            }
            _ => {
                self.storage.reset_chat(chat_id).await?;
                logging::log_session_reset(chat_id, reset.unwrap_or("no stored session"));
                let mut session = self.fresh_session(chat_id);
                let reply = self.home(&mut session);
                (session, reply)
            }
        };

        session.pending_callback_id = update.callback_id;
        self.acknowledge(session.pending_callback_id.take().as_deref()).await;

        session.touch();
        self.storage.save_session(&session).await?;
        debug!(summary = %session.summary(), wizard = %StepEngine::state(&session), "Session saved");

        self.deliver(chat_id, reply).await?;
        Ok(Dispatch::Replied)
    }

    fn is_chat_id_request(&self, text: &str) -> bool {
        self.settings.bot.allow_chat_id_command && text.trim().eq_ignore_ascii_case(labels::CHAT_ID_COMMAND)
    }

    fn reset_reason(&self, session: &Session, text: &str) -> Option<&'static str> {
        if text.eq_ignore_ascii_case(labels::START_COMMAND) {
            Some("start command")
        } else if session.bound_user != self.access.user_binding(session.chat_id) {
            Some("user binding changed")
        } else if session.config_fingerprint != Some(self.fingerprint) {
            Some("configuration changed")
        } else {
            None
        }
    }

    fn fresh_session(&self, chat_id: i64) -> Session {
        let mut session = Session::new(chat_id);
        session.bound_user = self.access.user_binding(chat_id);
        session.config_fingerprint = Some(self.fingerprint);
        session
    }

    fn permitted_kinds(&self, chat_id: i64) -> Vec<ToolKind> {
        if !self.access.can_access_tools(chat_id) {
            return Vec::new();
        }
        self.catalog
            .tools()
            .kinds()
            .filter(|kind| self.access.can_access_tool(chat_id, *kind))
            .collect()
    }

    fn tools_available(&self, chat_id: i64) -> bool {
        !self.permitted_kinds(chat_id).is_empty()
    }

    fn queries_available(&self, chat_id: i64) -> bool {
        self.settings.queries.enabled && self.catalog.queries().is_some() && self.access.can_access_queries(chat_id)
    }

    fn home(&self, session: &mut Session) -> Reply {
        session.open_menu(Menu::None);
        session.expecting = Expecting::Home;
        menus::home(self.tools_available(session.chat_id), self.queries_available(session.chat_id))
    }

    async fn route(&self, session: &mut Session, text: &str) -> Result<Reply> {
        let chat_id = session.chat_id;

        if self.is_chat_id_request(text) {
            return Ok(Reply::message(chat_id.to_string()));
        }
        if text == labels::TOOLS && self.tools_available(chat_id) {
            return Ok(self.open_tools(session));
        }
        if text == labels::QUERIES && self.queries_available(chat_id) {
            return self.open_queries(session).await;
        }

        let routed = match session.expecting {
            Expecting::Home => None,
            Expecting::ToolCategory => self.choose_category(session, text),
            Expecting::Criteria => self.criteria_input(session, text).await?,
            Expecting::Tool => self.tool_input(session, text).await?,
            Expecting::Query => self.query_input(session, text).await?,
        };

        Ok(routed.unwrap_or_else(|| {
            logging::log_invalid_input(chat_id, text, session.expecting.as_str());
            Reply::message(labels::INVALID_DATA)
        }))
    }

    fn open_tools(&self, session: &mut Session) -> Reply {
        session.open_menu(Menu::Tools);
        session.expecting = Expecting::ToolCategory;
        logging::log_menu_switch(session.chat_id, Menu::Tools.as_str());

        let kinds = self.permitted_kinds(session.chat_id);
        let registry = self.catalog.tools();
        menus::categories(
            kinds
                .iter()
                .filter_map(|kind| registry.get(*kind))
                .map(|tool| tool.as_ref()),
        )
    }

    async fn open_queries(&self, session: &mut Session) -> Result<Reply> {
        session.open_menu(Menu::Queries);
        session.expecting = Expecting::Query;
        logging::log_menu_switch(session.chat_id, Menu::Queries.as_str());
        self.query_folder(None).await
    }

    async fn query_folder(&self, folder: Option<&str>) -> Result<Reply> {
        let queries = self
            .catalog
            .queries()
            .ok_or_else(|| BridgeError::ServiceUnavailable("queries are not configured".to_string()))?;
        let nodes = queries.children(folder).await?;
        Ok(menus::queries(&nodes))
    }

    fn choose_category(&self, session: &mut Session, text: &str) -> Option<Reply> {
        let kind = ToolKind::from_handle(text)?;
        if !self.permitted_kinds(session.chat_id).contains(&kind) {
            return None;
        }
        let tool = self.catalog.tools().get(kind)?;

        session.tool_category = Some(kind.handle().to_string());
        session.expecting = Expecting::Tool;
        info!(chat_id = session.chat_id, category = %kind, "Tool category selected");
        Some(menus::tools(tool.as_ref(), false))
    }

    async fn criteria_input(&self, session: &mut Session, text: &str) -> Result<Option<Reply>> {
        let target = Target::from_session(session)?;
        let schema = self.schemas.criteria_steps(&target, session).await?;
        let engine = StepEngine::new(&schema);

        let outcome = if text == labels::PREVIOUS_STEP {
            match engine.back(session)? {
                Some(outcome) => outcome,
                None => return Ok(None),
            }
        } else if text == labels::NEXT_STEP {
            engine.submit(session, StepInput::NextStep)?
        } else {
            engine.submit(session, StepInput::Value(text.to_string()))?
        };

        self.respond(session, &target, &schema, outcome).await.map(Some)
    }

    async fn tool_input(&self, session: &mut Session, text: &str) -> Result<Option<Reply>> {
        let handle = session
            .tool_category
            .as_deref()
            .ok_or_else(|| BridgeError::Invariant("tool list shown without a category".to_string()))?;
        let kind = ToolKind::from_handle(handle).ok_or_else(|| BridgeError::UnknownTool(handle.to_string()))?;
        let tool_selected = session.tool.is_some();

        if tool_selected && text == labels::CHANGE_CRITERIA {
            session.clear_criteria();
            return self.start_wizard(session).await.map(Some);
        }
        if tool_selected && session.result_seen && Self::is_paging(text) {
            return self.page(session, text).await.map(Some);
        }

        let registry = self.catalog.tools();
        let known = registry
            .get(kind)
            .map_or(false, |tool| tool.tools().iter().any(|entry| entry.key == text));
        if !known {
            return Ok(None);
        }

        session.clear_criteria();
        session.tool = Some(text.to_string());
        info!(chat_id = session.chat_id, category = %kind, tool = text, "Tool selected");
        self.start_wizard(session).await.map(Some)
    }

    async fn query_input(&self, session: &mut Session, text: &str) -> Result<Option<Reply>> {
        let query_selected = session.query_id.is_some();

        if query_selected && text == labels::CHANGE_CRITERIA {
            session.clear_criteria();
            return self.start_wizard(session).await.map(Some);
        }
        if query_selected && session.result_seen && Self::is_paging(text) {
            return self.page(session, text).await.map(Some);
        }

        let Some(queries) = self.catalog.queries() else {
            return Ok(None);
        };
        let Some(node) = queries.node(text).await? else {
            return Ok(None);
        };

        if node.is_folder() {
            session.descendant_of = Some(node.id.clone());
            return self.query_folder(Some(&node.id)).await.map(Some);
        }

        session.clear_criteria();
        session.query_id = Some(node.id.clone());
        info!(chat_id = session.chat_id, query = %node.id, "Query selected");
        self.start_wizard(session).await.map(Some)
    }

    fn is_paging(text: &str) -> bool {
        text == labels::NEXT_RESULTS || text == labels::PREVIOUS_RESULTS
    }

    async fn start_wizard(&self, session: &mut Session) -> Result<Reply> {
        let target = Target::from_session(session)?;
        let schema = self.schemas.criteria_steps(&target, session).await?;
        let outcome = StepEngine::new(&schema).start(session);
        self.respond(session, &target, &schema, outcome).await
    }

    /// Move through paged results and render again
    async fn page(&self, session: &mut Session, text: &str) -> Result<Reply> {
        let target = Target::from_session(session)?;
        let schema = self.schemas.criteria_steps(&target, session).await?;

        if schema.has_offset() {
            let limit = session.effective_limit();
            session.offset = if text == labels::NEXT_RESULTS {
                session.offset.saturating_add(limit)
            } else {
                session.offset.saturating_sub(limit)
            };
        }

        // A step that appeared since the last run is asked before rendering
        let outcome = StepEngine::new(&schema).advance(session);
        self.respond(session, &target, &schema, outcome).await
    }

    async fn respond(
        &self,
        session: &mut Session,
        target: &Target,
        schema: &StepSchema,
        outcome: StepOutcome,
    ) -> Result<Reply> {
        match outcome {
            StepOutcome::AwaitingInput { step, .. } => {
                session.expecting = Expecting::Criteria;
                self.prompt(session, target, schema, &step).await
            }
            StepOutcome::Accumulated { .. } => Ok(Reply::message(labels::SELECT_ANOTHER)),
            StepOutcome::Invalid { message, .. } => Ok(Reply::message(message)),
            StepOutcome::Complete => self.finish(session, target, schema).await,
        }
    }

    async fn prompt(&self, session: &Session, target: &Target, schema: &StepSchema, step: &str) -> Result<Reply> {
        let definition = schema
            .get(step)
            .ok_or_else(|| BridgeError::Invariant(format!("step {} is not in the schema", step)))?;

        let mut items = self.choices.keyboard_items(target, definition, session).await?;
        items.extend(step_controls(
            session.previous_criteria_step.is_some(),
            definition.is_nullable() || definition.multiple,
        ));

        let text = labels::step_prompt(&definition.label, definition.step_type == StepType::File);
        Ok(Reply::with_keyboard(text, Keyboard::inline(&items)))
    }

    async fn finish(&self, session: &mut Session, target: &Target, schema: &StepSchema) -> Result<Reply> {
        session.page_limit = session.text(LIMIT_STEP).and_then(|raw| raw.trim().parse().ok());

        let mut result = self.renderer.render(target, session).await?;
        session.result_seen = true;
        session.expecting = match target {
            Target::Tool { .. } => Expecting::Tool,
            Target::Query { .. } => Expecting::Query,
        };

        let image_sent = result.image.is_some() && self.settings.bot.show_result_chart;
        if result.text.trim().is_empty() && !image_sent {
            result.text = labels::NO_RESULT.to_string();
        }
        logging::log_result_rendered(session.chat_id, &target.describe(), result.text.len(), image_sent);

        let extra = match (target, self.catalog.queries()) {
            (Target::Query { .. }, Some(queries)) => {
                let nodes = queries.children(session.descendant_of.as_deref()).await?;
                menus::query_items(&nodes)
            }
            _ => Vec::new(),
        };

        Ok(Reply::result(result, menus::result_keyboard(session.offset, schema.has_offset(), extra)))
    }

    async fn acknowledge(&self, callback_id: Option<&str>) {
        if let Some(id) = callback_id {
            if let Err(e) = self.transport.acknowledge_callback(id).await {
                warn!(error = %e, "Callback acknowledgement failed");
            }
        }
    }

    /// Send a reply: text first, then the chart if charts are enabled
    async fn deliver(&self, chat_id: i64, reply: Reply) -> Result<()> {
        if let Some(text) = &reply.text {
            self.transport.send_message(chat_id, text, reply.keyboard.as_ref()).await?;
        }

        if let Some(image) = &reply.image {
            if self.settings.bot.show_result_chart {
                // The keyboard rides on the photo only when no text carried it
                let keyboard = if reply.text.is_some() { None } else { reply.keyboard.as_ref() };
                self.transport.send_photo(chat_id, image, keyboard).await?;
            }
        }
        Ok(())
    }
}
