//! Commerce statistics tool
//!
//! Every report asks for a store, a date range and the order statuses to
//! include, then a few report specific options. Store and order status data
//! come from a [`CommerceBackend`]; the tool turns the collected answers into a
//! typed [`ReportRequest`] and formats what the backend returns.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{entry_item, limit_items, not_valid, one_of, ToolEntry, ToolKind, ToolType};
use crate::handlers::keyboard::KeyboardItem;
use crate::handlers::labels;
use crate::models::{ChartImage, RenderedResult};
use crate::state::schema::LIMIT_STEP;
use crate::state::{Session, StepDefinition, StepSchema, StepType, StepValue};
use crate::utils::errors::{BridgeError, Result};
use crate::utils::helpers::{escape_html, is_ymd_format, text_table};

pub const STORE_STEP: &str = "storeId";
pub const TIMEFRAME_STEP: &str = "timeframe";
pub const ORDER_STATUSES_STEP: &str = "orderStatuses";
pub const ORDER_STATUS_STEP: &str = "orderStatus";
pub const REVENUE_OPTIONS_STEP: &str = "revenueOptions";

/// Date range presets, in menu order
pub const TIMEFRAMES: [&str; 9] = [
    "All",
    "Today",
    "This week",
    "This month",
    "This year",
    "Past 7 days",
    "Past 30 days",
    "Past 90 days",
    "Past year",
];

const TOTAL_REVENUE_TYPES: [&str; 2] = ["Total", "Total Paid"];
const TOP_CUSTOMERS_TYPES: [&str; 2] = ["Total", "Average"];
const COUNTRY_TYPES: [&str; 2] = ["Billing", "Shipping"];
const PRODUCT_TYPES: [&str; 2] = ["Qty", "Revenue"];
const REVENUE_OPTIONS: [(&str, &str); 4] = [
    ("Discount", "discount"),
    ("Shipping", "shipping"),
    ("Tax", "tax"),
    ("Tax included", "tax_included"),
];

/// A store the bound user may report on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    pub id: String,
    pub name: String,
}

/// An order status of a store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatus {
    pub name: String,
    pub uid: String,
}

/// Reports offered by the commerce tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommerceReport {
    NewCustomers,
    RepeatCustomers,
    AverageOrderTotal,
    TotalOrders,
    TotalOrdersByCountry,
    RecentOrders,
    TotalRevenue,
    TopCustomers,
    TopProductTypes,
    TopProducts,
    TopPurchasables,
}

impl CommerceReport {
    pub const ALL: [CommerceReport; 11] = [
        CommerceReport::NewCustomers,
        CommerceReport::RepeatCustomers,
        CommerceReport::AverageOrderTotal,
        CommerceReport::TotalOrders,
        CommerceReport::TotalOrdersByCountry,
        CommerceReport::RecentOrders,
        CommerceReport::TotalRevenue,
        CommerceReport::TopCustomers,
        CommerceReport::TopProductTypes,
        CommerceReport::TopProducts,
        CommerceReport::TopPurchasables,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            CommerceReport::NewCustomers => "New Customers",
            CommerceReport::RepeatCustomers => "Repeat Customers",
            CommerceReport::AverageOrderTotal => "Average Order Total",
            CommerceReport::TotalOrders => "Total Orders",
            CommerceReport::TotalOrdersByCountry => "Total Orders by Country",
            CommerceReport::RecentOrders => "Recent Orders",
            CommerceReport::TotalRevenue => "Total Revenue",
            CommerceReport::TopCustomers => "Top Customers",
            CommerceReport::TopProductTypes => "Top Product Types",
            CommerceReport::TopProducts => "Top Products",
            CommerceReport::TopPurchasables => "Top Purchasables",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|report| report.label() == label)
    }

    /// Name of the report specific type step, if any
    fn type_step(&self) -> Option<&'static str> {
        match self {
            CommerceReport::TotalOrdersByCountry => Some("totalOrdersCountryType"),
            CommerceReport::TotalRevenue => Some("totalRevenueType"),
            CommerceReport::TopCustomers => Some("topCustomersType"),
            CommerceReport::TopProductTypes => Some("topProductTypesType"),
            CommerceReport::TopProducts => Some("topProductsType"),
            CommerceReport::TopPurchasables => Some("topPurchasablesType"),
            _ => None,
        }
    }
}

fn type_choices(step: &str) -> Option<&'static [&'static str]> {
    match step {
        "totalOrdersCountryType" => Some(&COUNTRY_TYPES),
        "totalRevenueType" => Some(&TOTAL_REVENUE_TYPES),
        "topCustomersType" => Some(&TOP_CUSTOMERS_TYPES),
        "topProductTypesType" | "topProductsType" | "topPurchasablesType" => Some(&PRODUCT_TYPES),
        _ => None,
    }
}

/// Date range of a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timeframe {
    /// A preset, as its camel case key (`past7Days`)
    Preset(String),
    Custom { start: NaiveDate, end: NaiveDate },
}

impl Timeframe {
    /// Parse a captured timeframe: a preset label or `start end` dates
    pub fn parse(raw: &str) -> Option<Self> {
        if TIMEFRAMES.contains(&raw) {
            return Some(Timeframe::Preset(camel_case(raw)));
        }
        let mut parts = raw.split_whitespace();
        let start = NaiveDate::parse_from_str(parts.next()?, "%Y-%m-%d").ok()?;
        let end = NaiveDate::parse_from_str(parts.next()?, "%Y-%m-%d").ok()?;
        Some(Timeframe::Custom { start, end })
    }

    /// Human wording for result texts
    pub fn wording(&self) -> String {
        match self {
            Timeframe::Preset(key) => TIMEFRAMES
                .iter()
                .find(|label| camel_case(label) == *key)
                .map(|label| label.to_string())
                .unwrap_or_else(|| key.clone()),
            Timeframe::Custom { start, end } => format!("{} - {}", start, end),
        }
    }
}

fn camel_case(label: &str) -> String {
    let mut out = String::new();
    for (index, word) in label.split_whitespace().enumerate() {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            if index == 0 {
                out.extend(first.to_lowercase());
            } else {
                out.extend(first.to_uppercase());
            }
            out.push_str(&chars.as_str().to_lowercase());
        }
    }
    out
}

fn timeframe_validate(raw: &str) -> crate::state::Validation {
    if TIMEFRAMES.contains(&raw) {
        return Ok(());
    }
    let parts: Vec<&str> = raw.split_whitespace().collect();
    if parts.len() < 2 {
        return Err(format!("Start date and end date are not detected in {}.", raw));
    }
    for part in &parts[..2] {
        if !is_ymd_format(part) {
            return Err(format!("Format of {} is not valid.", part));
        }
    }
    Ok(())
}

/// Everything the backend needs to compute one report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRequest {
    pub report: CommerceReport,
    pub user: String,
    pub store_id: String,
    pub timeframe: Option<Timeframe>,
    /// Order status uids to include; empty means every status
    pub order_statuses: Vec<String>,
    /// Single status filter of recent orders; `None` means every status
    pub order_status: Option<String>,
    /// Report specific type, lowercased without spaces (`totalpaid`)
    pub report_type: Option<String>,
    pub revenue_options: Vec<String>,
    pub limit: u32,
}

/// Figures a backend computed for a report
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReportData {
    /// Single headline value, shown in bold
    pub headline: Option<String>,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub chart: Option<ChartImage>,
}

/// Data source for commerce reports
#[async_trait]
pub trait CommerceBackend: Send + Sync {
    /// Stores `user` may report on, first one is the default
    async fn stores(&self, user: &str) -> Result<Vec<Store>>;

    async fn order_statuses(&self, store_id: &str) -> Result<Vec<OrderStatus>>;

    async fn report(&self, request: &ReportRequest) -> Result<ReportData>;
}

/// The commerce tool category
pub struct CommerceTool {
    backend: Arc<dyn CommerceBackend>,
}

impl CommerceTool {
    pub fn new(backend: Arc<dyn CommerceBackend>) -> Self {
        Self { backend }
    }

    fn user(session: &Session) -> Result<&str> {
        session
            .bound_user
            .as_deref()
            .ok_or_else(|| BridgeError::PermissionDenied(format!("chat {} has no bound user", session.chat_id)))
    }

    async fn stores(&self, session: &Session) -> Result<Vec<Store>> {
        let stores = self.backend.stores(Self::user(session)?).await?;
        if stores.is_empty() {
            return Err(BridgeError::PermissionDenied("the user can not access any store".to_string()));
        }
        Ok(stores)
    }

    /// Store the wizard is working with: the chosen one or the default
    fn store_id(session: &Session, stores: &[Store]) -> String {
        session
            .text(STORE_STEP)
            .map(str::to_string)
            .or_else(|| stores.first().map(|store| store.id.clone()))
            .unwrap_or_default()
    }

    fn store_step(stores: &[Store]) -> StepDefinition {
        let ids: Vec<String> = stores.iter().map(|store| store.id.clone()).collect();
        let step = StepDefinition::new(STORE_STEP, StepType::Choice)
            .label("store")
            .required()
            .validator(move |raw, _| {
                if ids.iter().any(|id| id == raw) {
                    Ok(())
                } else {
                    Err("The user can not access the store.".to_string())
                }
            });

        if stores.len() > 1 {
            step
        } else {
            let default = stores.first().map(|store| StepValue::Text(store.id.clone()));
            step.skipped(default)
        }
    }

    fn status_validator(
        statuses: &[OrderStatus],
    ) -> impl Fn(&str, &Session) -> crate::state::Validation + Send + Sync + 'static {
        let names: Vec<String> = statuses.iter().map(|status| status.name.clone()).collect();
        move |raw, _| {
            if raw == labels::ALL || names.iter().any(|name| name == raw) {
                Ok(())
            } else {
                Err(not_valid(raw))
            }
        }
    }

    fn type_step(step: &'static str) -> StepDefinition {
        let choices = type_choices(step).unwrap_or(&[]);
        StepDefinition::new(step, StepType::Choice)
            .label("type")
            .required()
            .validator(move |raw, _| one_of(raw, choices))
    }

    fn build_schema(report: CommerceReport, stores: &[Store], statuses: &[OrderStatus]) -> StepSchema {
        let mut steps = vec![Self::store_step(stores)];

        if report == CommerceReport::RecentOrders {
            steps.push(
                StepDefinition::new(ORDER_STATUS_STEP, StepType::Choice)
                    .label("order status")
                    .required()
                    .validator(Self::status_validator(statuses)),
            );
            steps.push(StepDefinition::new(LIMIT_STEP, StepType::Integer).label("limit").required());
            return StepSchema::new(steps);
        }

        steps.push(
            StepDefinition::new(TIMEFRAME_STEP, StepType::Choice)
                .label("date range")
                .required()
                .validator(|raw, _| timeframe_validate(raw)),
        );
        steps.push(
            StepDefinition::new(ORDER_STATUSES_STEP, StepType::Choice)
                .label("order status")
                .multiple()
                .validator(Self::status_validator(statuses)),
        );

        if let Some(type_step) = report.type_step() {
            steps.push(Self::type_step(type_step));
        }

        if report == CommerceReport::TopProducts {
            let values: Vec<&str> = REVENUE_OPTIONS.iter().map(|(_, value)| *value).collect();
            steps.push(
                StepDefinition::new(REVENUE_OPTIONS_STEP, StepType::Choice)
                    .label("option")
                    .multiple()
                    .show_if("topProductsType", ["revenue"])
                    .validator(move |raw, _| one_of(raw, &values)),
            );
        }

        StepSchema::new(steps)
    }

    /// Collect the answers of `session` into a report request
    pub async fn request(&self, report: CommerceReport, session: &Session) -> Result<ReportRequest> {
        let stores = self.stores(session).await?;
        let store_id = Self::store_id(session, &stores);
        let statuses = self.backend.order_statuses(&store_id).await?;

        let uid_of = |name: &str| {
            statuses
                .iter()
                .find(|status| status.name == name)
                .map(|status| status.uid.clone())
        };

        let order_statuses = match session.value(ORDER_STATUSES_STEP) {
            Some(StepValue::List(names)) if !names.iter().any(|n| n == labels::ALL) => {
                names.iter().filter_map(|name| uid_of(name)).collect()
            }
            Some(StepValue::Text(name)) if name != labels::ALL => uid_of(name).into_iter().collect(),
            _ => Vec::new(),
        };

        let order_status = session
            .text(ORDER_STATUS_STEP)
            .filter(|name| *name != labels::ALL)
            .and_then(uid_of);

        let report_type = report
            .type_step()
            .and_then(|step| session.text(step))
            .map(|value| value.replace(' ', "").to_lowercase());

        let revenue_options = match session.value(REVENUE_OPTIONS_STEP) {
            Some(StepValue::List(options)) => options.clone(),
            Some(StepValue::Text(option)) => vec![option.clone()],
            _ => Vec::new(),
        };

        let limit = session
            .text(LIMIT_STEP)
            .and_then(|value| value.parse::<u32>().ok())
            .filter(|limit| *limit > 0)
            .unwrap_or(10);

        Ok(ReportRequest {
            report,
            user: Self::user(session)?.to_string(),
            store_id,
            timeframe: session.text(TIMEFRAME_STEP).and_then(Timeframe::parse),
            order_statuses,
            order_status,
            report_type,
            revenue_options,
            limit,
        })
    }

    fn format(request: &ReportRequest, session: &Session, store: &str, data: ReportData) -> RenderedResult {
        let mut lines = Vec::new();
        let title = escape_html(request.report.label());
        match &data.headline {
            Some(headline) => lines.push(format!("{}: <b>{}</b>", title, escape_html(headline))),
            None => lines.push(format!("<b>{}</b>", title)),
        }
        lines.push(format!("Store: {}", escape_html(store)));
        if let Some(timeframe) = &request.timeframe {
            lines.push(format!("Date Range: {}", escape_html(&timeframe.wording())));
        }

        let statuses = match (session.value(ORDER_STATUSES_STEP), session.text(ORDER_STATUS_STEP)) {
            (Some(StepValue::List(names)), _) if !names.is_empty() => Some(names.join("-")),
            (_, Some(name)) => Some(name.to_string()),
            _ => None,
        };
        if let Some(statuses) = statuses {
            lines.push(format!("Order Status: {}", escape_html(&statuses)));
        }
        if !request.revenue_options.is_empty() {
            lines.push(format!("Including: {}", escape_html(&request.revenue_options.join("-"))));
        }

        let mut text = lines.join("\n");
        if !data.rows.is_empty() {
            let headers: Vec<&str> = data.headers.iter().map(String::as_str).collect();
            text.push_str(&format!("\n\n<pre>{}</pre>", escape_html(&text_table(&headers, &data.rows))));
        }

        let result = RenderedResult::text(text);
        match data.chart {
            Some(chart) => result.with_image(chart),
            None => result,
        }
    }
}

#[async_trait]
impl ToolType for CommerceTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Commerce
    }

    fn display_name(&self) -> String {
        "Commerce".to_string()
    }

    fn tools(&self) -> Vec<ToolEntry> {
        CommerceReport::ALL
            .iter()
            .map(|report| ToolEntry::new(report.label(), report.label()))
            .collect()
    }

    async fn criteria(&self, tool: &str, session: &Session) -> Result<StepSchema> {
        let report = CommerceReport::from_label(tool).ok_or_else(|| BridgeError::UnknownTool(tool.to_string()))?;
        let stores = self.stores(session).await?;
        let store_id = Self::store_id(session, &stores);
        let statuses = self.backend.order_statuses(&store_id).await?;
        Ok(Self::build_schema(report, &stores, &statuses))
    }

    async fn keyboard_items(&self, step: &str, session: &Session) -> Result<Vec<KeyboardItem>> {
        let items = match step {
            STORE_STEP => self
                .stores(session)
                .await?
                .into_iter()
                .map(|store| entry_item(&store.name, &store.id))
                .collect(),
            TIMEFRAME_STEP => TIMEFRAMES.iter().map(|label| KeyboardItem::plain(*label)).collect(),
            ORDER_STATUSES_STEP | ORDER_STATUS_STEP => {
                let stores = self.stores(session).await?;
                let statuses = self.backend.order_statuses(&Self::store_id(session, &stores)).await?;
                let mut items = Vec::new();
                if step == ORDER_STATUS_STEP {
                    items.push(KeyboardItem::plain(labels::ALL).row_after());
                }
                items.extend(statuses.into_iter().map(|status| KeyboardItem::plain(status.name)));
                items
            }
            REVENUE_OPTIONS_STEP => REVENUE_OPTIONS
                .iter()
                .map(|(label, value)| KeyboardItem::new(*label, *value))
                .collect(),
            LIMIT_STEP => limit_items(),
            other => type_choices(other)
                .map(|choices| choices.iter().map(|choice| KeyboardItem::plain(*choice)).collect())
                .unwrap_or_default(),
        };
        Ok(items)
    }

    async fn render(&self, tool: &str, session: &Session) -> Result<RenderedResult> {
        let report = CommerceReport::from_label(tool).ok_or_else(|| BridgeError::UnknownTool(tool.to_string()))?;
        let request = self.request(report, session).await?;
        debug!(chat_id = session.chat_id, report = report.label(), "Running commerce report");

        let store_name = self
            .stores(session)
            .await?
            .into_iter()
            .find(|store| store.id == request.store_id)
            .map(|store| store.name)
            .unwrap_or_else(|| request.store_id.clone());

        let data = self.backend.report(&request).await?;
        Ok(Self::format(&request, session, &store_name, data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{StepEngine, StepInput, StepOutcome};
    use assert_matches::assert_matches;

    struct FixedBackend {
        stores: Vec<Store>,
    }

    #[async_trait]
    impl CommerceBackend for FixedBackend {
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
                headline: Some(format!("{} orders", request.order_statuses.len())),
                ..ReportData::default()
            })
        }
    }

    fn store(id: &str) -> Store {
        Store { id: id.to_string(), name: format!("Store {}", id) }
    }

    fn tool(stores: Vec<Store>) -> CommerceTool {
        CommerceTool::new(Arc::new(FixedBackend { stores }))
    }

    fn session() -> Session {
        let mut session = Session::new(7);
        session.bound_user = Some("admin".to_string());
        session
    }

    #[test]
    fn test_timeframe_validation() {
        assert!(timeframe_validate("Past 7 days").is_ok());
        assert!(timeframe_validate("2024-01-01 2024-02-01").is_ok());
        assert_eq!(
            timeframe_validate("yesterday"),
            Err("Start date and end date are not detected in yesterday.".to_string())
        );
        assert_eq!(
            timeframe_validate("2024-13-01 2024-02-01"),
            Err("Format of 2024-13-01 is not valid.".to_string())
        );
    }

    #[test]
    fn test_timeframe_parse() {
        assert_eq!(Timeframe::parse("Past 7 days"), Some(Timeframe::Preset("past7Days".to_string())));
        assert_eq!(Timeframe::parse("This week").map(|t| t.wording()), Some("This week".to_string()));
        assert_matches!(Timeframe::parse("2024-01-01 2024-01-31"), Some(Timeframe::Custom { .. }));
        assert_eq!(Timeframe::parse("soon"), None);
    }

    #[tokio::test]
    async fn test_single_store_is_skipped_and_prefilled() {
        let tool = tool(vec![store("1")]);
        let mut session = session();
        let schema = tool.criteria("Total Orders", &session).await.unwrap();
        assert!(schema.get(STORE_STEP).unwrap().skip);

        let engine = StepEngine::new(&schema);
        let outcome = engine.start(&mut session);
        assert_eq!(outcome, StepOutcome::AwaitingInput { step: TIMEFRAME_STEP.to_string(), position: 2 });
        assert_eq!(session.text(STORE_STEP), Some("1"));
    }

    #[tokio::test]
    async fn test_store_validation_with_several_stores() {
        let tool = tool(vec![store("1"), store("2")]);
        let mut session = session();
        let schema = tool.criteria("Total Orders", &session).await.unwrap();
        let engine = StepEngine::new(&schema);
        engine.start(&mut session);

        let outcome = engine.submit(&mut session, StepInput::Value("9".to_string())).unwrap();
        assert_matches!(outcome, StepOutcome::Invalid { message, .. } if message == "The user can not access the store.");
    }

    #[tokio::test]
    async fn test_revenue_options_only_for_revenue_type() {
        let tool = tool(vec![store("1")]);
        let mut session = session();
        let schema = tool.criteria("Top Products", &session).await.unwrap();
        let engine = StepEngine::new(&schema);
        engine.start(&mut session);

        engine.submit(&mut session, StepInput::Value("Today".to_string())).unwrap();
        engine.submit(&mut session, StepInput::NextStep).unwrap();
        let outcome = engine.submit(&mut session, StepInput::Value("Qty".to_string())).unwrap();
        assert_eq!(outcome, StepOutcome::Complete);
    }

    #[tokio::test]
    async fn test_request_maps_names_to_uids() {
        let tool = tool(vec![store("1")]);
        let mut session = session();
        session.prefill(STORE_STEP, StepValue::Text("1".to_string()));
        session.commit(TIMEFRAME_STEP, StepValue::Text("Past 30 days".to_string()));
        session.commit(ORDER_STATUSES_STEP, StepValue::List(vec!["Shipped".to_string()]));
        session.commit("totalRevenueType", StepValue::Text("Total Paid".to_string()));

        let request = tool.request(CommerceReport::TotalRevenue, &session).await.unwrap();
        assert_eq!(request.order_statuses, vec!["uid-shipped".to_string()]);
        assert_eq!(request.report_type.as_deref(), Some("totalpaid"));
        assert_eq!(request.timeframe, Some(Timeframe::Preset("past30Days".to_string())));
        assert_eq!(request.limit, 10);
    }

    #[tokio::test]
    async fn test_recent_orders_keyboard_starts_with_all() {
        let tool = tool(vec![store("1")]);
        let items = tool.keyboard_items(ORDER_STATUS_STEP, &session()).await.unwrap();
        assert_eq!(items[0].label, labels::ALL);
        assert!(items[0].new_row_after);
        assert_eq!(items.len(), 3);
    }

    #[tokio::test]
    async fn test_unbound_chat_is_denied() {
        let tool = tool(vec![store("1")]);
        let result = tool.criteria("Total Orders", &Session::new(1)).await;
        assert_matches!(result, Err(BridgeError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_render_formats_headline() {
        let tool = tool(vec![store("1")]);
        let mut session = session();
        session.prefill(STORE_STEP, StepValue::Text("1".to_string()));
        session.commit(TIMEFRAME_STEP, StepValue::Text("Today".to_string()));
        session.commit(ORDER_STATUSES_STEP, StepValue::List(vec!["Paid".to_string(), "Shipped".to_string()]));

        let result = tool.render("Total Orders", &session).await.unwrap();
        assert!(result.text.starts_with("Total Orders: <b>2 orders</b>"));
        assert!(result.text.contains("Store: Store 1"));
        assert!(result.text.contains("Order Status: Paid-Shipped"));
    }
}
