//! Loading and merging of bootstrap class documents.
//!
//! A source is either an `http(s)` URL or a local path. Both connectors run
//! the same merge before touching their backend.

use std::collections::HashSet;

use reqwest::Url;
use tracing::{debug, info};

use strand_core::config::SchemaSources;
use strand_core::{Kind, Result, Schema, SemanticSchema, StrandError};

use crate::client::GraphError;

/// Parse `source` as a remote URL. Anything that is not `http`/`https` is
/// treated as a filesystem path.
pub fn as_url(source: &str) -> Option<Url> {
    let url = Url::parse(source).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}

/// Fetch and parse one class document. An empty source yields `None`.
pub async fn load_source(source: &str) -> Result<Option<SemanticSchema>> {
    let source = source.trim();
    if source.is_empty() {
        return Ok(None);
    }

    let body = match as_url(source) {
        Some(url) => {
            debug!(%url, "Fetching schema source");
            let response = reqwest::get(url.clone())
                .await
                .map_err(GraphError::from)?
                .error_for_status()
                .map_err(GraphError::from)?;
            response.text().await.map_err(GraphError::from)?
        }
        None => {
            debug!(path = source, "Reading schema source");
            tokio::fs::read_to_string(source).await?
        }
    };

    let doc: SemanticSchema = serde_json::from_str(&body)
        .map_err(|e| StrandError::ValidationFailed(format!("schema source {source}: {e}")))?;
    Ok(Some(doc))
}

/// Merge a loaded document into the declared class list.
///
/// Declared classes win over loaded ones of the same name. The loaded
/// context only fills an empty declared context.
pub fn merge(declared: &mut SemanticSchema, loaded: SemanticSchema) -> Result<usize> {
    let mut seen = HashSet::new();
    for class in &loaded.classes {
        if !seen.insert(class.class.as_str()) {
            return Err(StrandError::ValidationFailed(format!(
                "class '{}' is defined more than once in the same document",
                class.class
            )));
        }
    }

    if declared.context.is_empty() {
        declared.context = loaded.context;
    }
    if declared.version.is_empty() {
        declared.version = loaded.version;
    }

    let mut added = 0;
    for class in loaded.classes {
        if declared.class(&class.class).is_none() {
            declared.classes.push(class);
            added += 1;
        }
    }
    Ok(added)
}

/// Load both configured sources and merge them into `schema`.
pub async fn merge_sources(sources: &SchemaSources, schema: &mut Schema) -> Result<()> {
    for (kind, source) in [(Kind::Thing, &sources.things), (Kind::Action, &sources.actions)] {
        if let Some(doc) = load_source(source).await? {
            let added = merge(schema.semantic_schema_mut(kind), doc)?;
            info!(kind = %kind, source = %source, added, "Merged schema source");
        }
    }
    Ok(())
}
