//! Query catalog backed by a directory tree
//!
//! Sub-directories are folders and `*.graphql` files are queries. Node ids are
//! paths relative to the root with `/` separators. A `<variable>.choices`
//! file at the root lists fixed choices for that variable, one per line, as
//! `label` or `label|value`.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{QueryCatalog, QueryNode, QueryNodeKind};
use crate::handlers::keyboard::KeyboardItem;
use crate::utils::errors::{BridgeError, Result};

pub const QUERY_EXTENSION: &str = "graphql";
pub const CHOICES_EXTENSION: &str = "choices";

#[derive(Debug, Clone)]
pub struct FsQueryCatalog {
    root: PathBuf,
}

impl FsQueryCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of a node id; ids escaping the root resolve to nothing
    fn resolve(&self, id: &str) -> Option<PathBuf> {
        let relative = Path::new(id);
        let plain = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        (plain && !id.is_empty()).then(|| self.root.join(relative))
    }

    fn id_of(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }

    fn is_query_file(path: &Path) -> bool {
        path.extension().map_or(false, |ext| ext == QUERY_EXTENSION)
    }

    fn title_of(path: &Path, kind: QueryNodeKind) -> String {
        let name = match kind {
            QueryNodeKind::Folder => path.file_name(),
            QueryNodeKind::Query => path.file_stem(),
        };
        name.map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
    }

    async fn describe(&self, path: &Path) -> Result<Option<QueryNode>> {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let kind = if metadata.is_dir() {
            QueryNodeKind::Folder
        } else if metadata.is_file() && Self::is_query_file(path) {
            QueryNodeKind::Query
        } else {
            return Ok(None);
        };

        Ok(self.id_of(path).map(|id| QueryNode {
            id,
            title: Self::title_of(path, kind),
            kind,
        }))
    }
}

#[async_trait]
impl QueryCatalog for FsQueryCatalog {
    async fn children(&self, folder: Option<&str>) -> Result<Vec<QueryNode>> {
        let directory = match folder {
            Some(id) => self
                .resolve(id)
                .ok_or_else(|| BridgeError::UnknownQuery(id.to_string()))?,
            None => self.root.clone(),
        };

        let mut nodes = Vec::new();
        let mut entries = tokio::fs::read_dir(&directory).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            if let Some(node) = self.describe(&entry.path()).await? {
                nodes.push(node);
            }
        }

        // Folders first, then queries, each alphabetically
        nodes.sort_by(|a, b| {
            b.is_folder()
                .cmp(&a.is_folder())
                .then_with(|| a.title.to_lowercase().cmp(&b.title.to_lowercase()))
        });
        debug!(folder = ?folder, count = nodes.len(), "Listed query catalog");
        Ok(nodes)
    }

    async fn node(&self, id: &str) -> Result<Option<QueryNode>> {
        match self.resolve(id) {
            Some(path) => self.describe(&path).await,
            None => Ok(None),
        }
    }

    async fn document(&self, id: &str) -> Result<String> {
        match self.node(id).await? {
            Some(node) if node.kind == QueryNodeKind::Query => {
                let path = self.root.join(Path::new(&node.id));
                Ok(tokio::fs::read_to_string(path).await?)
            }
            _ => Err(BridgeError::UnknownQuery(id.to_string())),
        }
    }

    async fn choices(&self, variable: &str) -> Result<Vec<KeyboardItem>> {
        let Some(path) = self.resolve(&format!("{}.{}", variable, CHOICES_EXTENSION)) else {
            return Ok(Vec::new());
        };
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| match line.split_once('|') {
                Some((label, value)) => KeyboardItem::new(label.trim(), value.trim()),
                None => KeyboardItem::plain(line),
            })
            .collect())
    }
}
