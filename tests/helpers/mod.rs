//! Test helpers module
//!
//! Shared fixtures for the integration tests: a transport that records what
//! the bot would have sent, in-memory tool backends and a builder wiring a
//! dispatcher around them.

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;

use telegram_bridge::config::{AllowedChat, Settings};
use telegram_bridge::handlers::{Dispatch, Dispatcher, Keyboard};
use telegram_bridge::models::{ChartImage, FileKind, FileRef, InboundUpdate};
use telegram_bridge::queries::{FsQueryCatalog, GraphQlRenderer};
use telegram_bridge::services::{AccessPolicy, Catalog, ChatAccess, Transport};
use telegram_bridge::state::{Session, StateStorage};
use telegram_bridge::tools::commerce::{OrderStatus, ReportData, ReportRequest, Store};
use telegram_bridge::tools::content::{EntrySummary, Section, Site};
use telegram_bridge::tools::{CommerceBackend, CommerceTool, ContentBackend, ContentTool, ToolRegistry};
use telegram_bridge::Result;

pub const CHAT_ID: i64 = 4242;
pub const STRANGER_CHAT_ID: i64 = 777;
pub const QUERY_TOKEN: &str = "query-secret";

/// One outbound call seen by [`RecordingTransport`]
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Message { chat_id: i64, text: String, keyboard: Option<Keyboard> },
    Photo { chat_id: i64, file_name: String, keyboard: Option<Keyboard> },
    Ack { callback_id: String },
}

/// Transport that records calls instead of talking to Telegram
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<Sent>>,
}

impl RecordingTransport {
    pub fn take(&self) -> Vec<Sent> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }

    fn push(&self, sent: Sent) {
        self.sent.lock().unwrap().push(sent);
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_message(&self, chat_id: i64, text: &str, keyboard: Option<&Keyboard>) -> Result<()> {
        self.push(Sent::Message {
            chat_id,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(())
    }

    async fn send_photo(&self, chat_id: i64, image: &ChartImage, keyboard: Option<&Keyboard>) -> Result<()> {
        self.push(Sent::Photo {
            chat_id,
            file_name: image.file_name.clone(),
            keyboard: keyboard.cloned(),
        });
        Ok(())
    }

    async fn acknowledge_callback(&self, callback_id: &str) -> Result<()> {
        self.push(Sent::Ack {
            callback_id: callback_id.to_string(),
        });
        Ok(())
    }

    async fn download_file(&self, file: &FileRef) -> Result<String> {
        let mime = match file.kind {
            FileKind::Photo => "image/jpeg",
            FileKind::Document => "application/pdf",
            _ => "application/octet-stream",
        };
        Ok(format!("data:{};base64,{}", mime, file.file_id))
    }
}

/// Commerce backend with one store and two order statuses
pub struct FakeCommerce {
    pub stores: Vec<Store>,
    pub chart: bool,
}

impl Default for FakeCommerce {
    fn default() -> Self {
        Self {
            stores: vec![Store { id: "1".to_string(), name: "Main Store".to_string() }],
            chart: false,
        }
    }
}

#[async_trait]
impl CommerceBackend for FakeCommerce {
    async fn stores(&self, _user: &str) -> Result<Vec<Store>> {
        Ok(self.stores.clone())
    }

    async fn order_statuses(&self, _store_id: &str) -> Result<Vec<OrderStatus>> {
        Ok(vec![
            OrderStatus { name: "Paid".to_string(), uid: "uid-paid".to_string() },
            OrderStatus { name: "Shipped".to_string(), uid: "uid-shipped".to_string() },
        ])
    }

    async fn report(&self, request: &ReportRequest) -> Result<ReportData> {
        Ok(ReportData {
            headline: Some(format!("{} orders", 3 * request.order_statuses.len())),
            headers: vec!["Status".to_string(), "Orders".to_string()],
            rows: request
                .order_statuses
                .iter()
                .map(|uid| vec![uid.clone(), "3".to_string()])
                .collect(),
            chart: self.chart.then(|| ChartImage {
                file_name: "chart.png".to_string(),
                bytes: vec![0x89, 0x50, 0x4e, 0x47],
            }),
        })
    }
}

/// Content backend with one site and two sections
#[derive(Default)]
pub struct FakeContent;

#[async_trait]
impl ContentBackend for FakeContent {
    async fn sites(&self, _user: &str) -> Result<Vec<Site>> {
        Ok(vec![Site { id: "1".to_string(), name: "Default".to_string() }])
    }

    async fn sections(&self, _user: &str) -> Result<Vec<Section>> {
        Ok(vec![
            Section { id: "2".to_string(), name: "News".to_string(), single: false },
            Section { id: "3".to_string(), name: "Homepage".to_string(), single: true },
        ])
    }

    async fn recent_entries(
        &self,
        _user: &str,
        _site_id: Option<&str>,
        _section_id: Option<&str>,
        limit: u32,
    ) -> Result<Vec<EntrySummary>> {
        let created_at = NaiveDate::from_ymd_opt(2024, 5, 1)
            .and_then(|date| date.and_hms_opt(9, 30, 0))
            .unwrap();
        Ok((0..limit.min(2))
            .map(|i| EntrySummary {
                title: format!("Entry {}", i + 1),
                created_at,
                author: Some("admin".to_string()),
            })
            .collect())
    }

    async fn drafts(&self, _user: &str, _limit: u32) -> Result<Vec<EntrySummary>> {
        Ok(Vec::new())
    }
}

/// Settings admitting [`CHAT_ID`] to every tool category
pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.bot.token = "12345:test_token".to_string();
    settings.bot.allow_chat_id_command = true;
    settings.access.chats.push(AllowedChat {
        chat_id: CHAT_ID,
        user: Some("admin".to_string()),
        query_token: Some(QUERY_TOKEN.to_string()),
        tools: vec!["commerce".to_string(), "craft".to_string()],
    });
    settings
}

/// Settings with the query catalog at `directory` and the endpoint at `endpoint`
pub fn query_settings(directory: &Path, endpoint: &str) -> Settings {
    let mut settings = test_settings();
    settings.queries.enabled = true;
    settings.queries.directory = directory.to_string_lossy().into_owned();
    settings.queries.endpoint = Some(endpoint.to_string());
    settings
}

/// A dispatcher wired to recording and in-memory parts
pub struct TestBridge {
    pub dispatcher: Dispatcher,
    pub transport: Arc<RecordingTransport>,
    pub storage: StateStorage,
}

impl TestBridge {
    /// Tools only, no query catalog
    pub fn new(settings: Settings) -> Self {
        Self::build(settings, FakeCommerce::default(), false)
    }

    pub fn with_commerce(settings: Settings, commerce: FakeCommerce) -> Self {
        Self::build(settings, commerce, false)
    }

    /// Tools plus the filesystem query catalog from the settings
    pub fn with_queries(settings: Settings) -> Self {
        Self::build(settings, FakeCommerce::default(), true)
    }

    /// Tools only, over an existing session store
    pub fn with_storage(settings: Settings, storage: StateStorage) -> Self {
        Self::build_with(settings, FakeCommerce::default(), false, storage)
    }

    fn build(settings: Settings, commerce: FakeCommerce, queries: bool) -> Self {
        Self::build_with(settings, commerce, queries, StateStorage::in_memory())
    }

    fn build_with(settings: Settings, commerce: FakeCommerce, queries: bool, storage: StateStorage) -> Self {
        let access: Arc<dyn AccessPolicy> = Arc::new(ChatAccess::new(settings.access.clone()));
        let registry = ToolRegistry::new()
            .with(Arc::new(CommerceTool::new(Arc::new(commerce))))
            .with(Arc::new(ContentTool::new(Arc::new(FakeContent))));

        let mut catalog = Catalog::new(registry);
        if queries {
            let runner = GraphQlRenderer::new(&settings.queries, access.clone()).unwrap();
            catalog = catalog.with_queries(
                Arc::new(FsQueryCatalog::new(&settings.queries.directory)),
                Arc::new(runner),
            );
        }

        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = Dispatcher::new(settings, storage.clone(), access, Arc::new(catalog), transport.clone());

        Self { dispatcher, transport, storage }
    }

    /// Send a text message from [`CHAT_ID`]
    pub async fn say(&self, text: &str) -> Vec<Sent> {
        self.send(InboundUpdate::text(CHAT_ID, text)).await
    }

    /// Press an inline button in [`CHAT_ID`]
    pub async fn press(&self, data: &str) -> Vec<Sent> {
        self.send(InboundUpdate::callback(CHAT_ID, data, format!("cb-{}", data))).await
    }

    pub async fn send(&self, update: InboundUpdate) -> Vec<Sent> {
        let outcome = self.dispatcher.handle(update).await.unwrap();
        assert_eq!(outcome, Dispatch::Replied);
        self.transport.take()
    }

    pub async fn session(&self) -> Session {
        self.storage.load_session(CHAT_ID).await.unwrap().unwrap()
    }
}

/// Messages among the recorded calls, acknowledgements left out
pub fn messages(sent: &[Sent]) -> Vec<(&str, Option<&Keyboard>)> {
    sent.iter()
        .filter_map(|sent| match sent {
            Sent::Message { text, keyboard, .. } => Some((text.as_str(), keyboard.as_ref())),
            _ => None,
        })
        .collect()
}

/// Text of the single message in `sent`
pub fn only_text(sent: &[Sent]) -> &str {
    let messages = messages(sent);
    assert_eq!(messages.len(), 1, "expected one message, got {:?}", sent);
    messages[0].0
}

/// Keyboard of the single message in `sent`
pub fn only_keyboard(sent: &[Sent]) -> &Keyboard {
    let messages = messages(sent);
    assert_eq!(messages.len(), 1, "expected one message, got {:?}", sent);
    messages[0].1.expect("message has no keyboard")
}
