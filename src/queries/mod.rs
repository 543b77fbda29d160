//! Saved GraphQL queries
//!
//! Queries live in a browsable catalog of folders and query documents. A
//! query's variables become the wizard steps, and a [`QueryRunner`] executes
//! the document once every step is answered.

pub mod catalog;
pub mod graphql;
pub mod variables;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::handlers::keyboard::KeyboardItem;
use crate::models::RenderedResult;
use crate::state::{Session, StepSchema};
use crate::utils::errors::Result;

pub use catalog::FsQueryCatalog;
pub use graphql::GraphQlRenderer;
pub use variables::{parse_variables, schema_from_document, VariableDefinition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryNodeKind {
    Folder,
    Query,
}

/// A folder or query of the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryNode {
    /// Stable identifier, sent back when the node is chosen
    pub id: String,
    pub title: String,
    pub kind: QueryNodeKind,
}

impl QueryNode {
    pub fn is_folder(&self) -> bool {
        self.kind == QueryNodeKind::Folder
    }
}

/// Where saved queries come from
#[async_trait]
pub trait QueryCatalog: Send + Sync {
    /// Nodes inside `folder`, or at the top level for `None`
    async fn children(&self, folder: Option<&str>) -> Result<Vec<QueryNode>>;

    async fn node(&self, id: &str) -> Result<Option<QueryNode>>;

    /// Document text of a query
    async fn document(&self, id: &str) -> Result<String>;

    /// Fixed choices offered for a variable, if the catalog defines any
    async fn choices(&self, _variable: &str) -> Result<Vec<KeyboardItem>> {
        Ok(Vec::new())
    }
}

/// Executes a query document with the answers collected in a session
#[async_trait]
pub trait QueryRunner: Send + Sync {
    async fn run(&self, document: &str, schema: &StepSchema, session: &Session) -> Result<RenderedResult>;
}
