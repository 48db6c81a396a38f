//! Turn user input into a canonical resource identifier
//!
//! Stages, first match wins:
//!
//! 1. URL: the embedded identifier, or `InvalidUrl`
//! 2. Raw identifier: normalized, or `InvalidId` when malformed
//! 3. Workspace index: exact title, alias, substring
//! 4. Remote search filtered by kind
//! 5. For databases, container IDs are converted to their data source ID
//!
//! Stages 4 and 5 need a [`RemoteLookup`]; without one the resolver works
//! offline against the index only.

use crate::ids::{normalize_id, parse_input, ParsedInput};
use crate::workspace::WorkspaceCache;
use ncli_cache::{CachedFetch, FetchOptions, KeyPart};
use ncli_core::{ApiRequest, Error, ResourceKind, Result, Transport};
use serde_json::{json, Value};
use std::sync::Arc;

/// Page size for the data source scan behind container conversion
const DATA_SOURCE_SCAN_SIZE: u32 = 100;

/// Remote access used by the search and conversion stages
#[derive(Clone)]
pub struct RemoteLookup {
    fetch: CachedFetch,
    transport: Arc<dyn Transport>,
}

impl RemoteLookup {
    pub fn new(fetch: CachedFetch, transport: Arc<dyn Transport>) -> Self {
        Self { fetch, transport }
    }

    async fn request(&self, kind: &str, ids: &[&str], request: ApiRequest) -> Result<Value> {
        let ids: Vec<KeyPart> = ids.iter().map(|id| KeyPart::from(*id)).collect();
        self.fetch
            .fetch_request(
                kind,
                &ids,
                Arc::clone(&self.transport),
                request,
                FetchOptions::default(),
            )
            .await
    }
}

#[derive(Clone, Default)]
pub struct ResourceResolver {
    workspace: Option<Arc<WorkspaceCache>>,
    remote: Option<RemoteLookup>,
}

impl std::fmt::Debug for ResourceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceResolver")
            .field(
                "indexed",
                &self.workspace.as_ref().map(|w| w.databases.len()),
            )
            .field("remote", &self.remote.is_some())
            .finish()
    }
}

impl ResourceResolver {
    pub fn new(workspace: Option<WorkspaceCache>, remote: Option<RemoteLookup>) -> Self {
        Self {
            workspace: workspace.map(Arc::new),
            remote,
        }
    }

    /// Index-only resolver
    pub fn offline(workspace: Option<WorkspaceCache>) -> Self {
        Self::new(workspace, None)
    }

    pub fn workspace(&self) -> Option<&WorkspaceCache> {
        self.workspace.as_deref()
    }

    pub fn is_offline(&self) -> bool {
        self.remote.is_none()
    }

    /// Resolve `input` to a compact identifier of `kind`
    pub async fn resolve(&self, input: &str, kind: ResourceKind) -> Result<String> {
        let id = match parse_input(input)? {
            ParsedInput::Id(id) => id,
            ParsedInput::Name(name) => self.resolve_name(&name, kind).await?,
        };

        if kind.is_container() {
            self.container_to_leaf(id).await
        } else {
            Ok(id)
        }
    }

    async fn resolve_name(&self, name: &str, kind: ResourceKind) -> Result<String> {
        if name.is_empty() {
            return Err(Error::not_found(kind, name));
        }

        if let Some(id) = self.lookup_index(name, kind) {
            return Ok(id);
        }

        match self.search_remote(name, kind).await? {
            Some(id) => Ok(id),
            None => Err(Error::not_found(kind, name)),
        }
    }

    /// The index only holds databases and their data sources
    fn lookup_index(&self, name: &str, kind: ResourceKind) -> Option<String> {
        if !matches!(kind, ResourceKind::Database | ResourceKind::DataSource) {
            return None;
        }
        let (entry, matched) = self.workspace.as_ref()?.find(name)?;
        tracing::debug!(query = name, id = %entry.id, matched = ?matched, "resolved_from_index");
        Some(entry.id.clone())
    }

    async fn search_remote(&self, query: &str, kind: ResourceKind) -> Result<Option<String>> {
        let Some(remote) = &self.remote else {
            return Ok(None);
        };

        let object = kind.search_object();
        let body = json!({
            "query": query,
            "filter": {"property": "object", "value": object},
        });
        let response = remote
            .request("search", &[object, query], ApiRequest::post("/v1/search", body))
            .await?;

        let id = results(&response)
            .first()
            .and_then(|first| first.get("id"))
            .and_then(Value::as_str)
            .and_then(normalize_id);
        if let Some(id) = &id {
            tracing::debug!(query, id = %id, "resolved_from_search");
        }
        Ok(id)
    }

    /// Swap a database (container) ID for the ID of its data source
    async fn container_to_leaf(&self, id: String) -> Result<String> {
        let Some(remote) = &self.remote else {
            return Ok(id);
        };

        let direct = remote
            .request(
                ResourceKind::DataSource.as_str(),
                &[id.as_str()],
                ApiRequest::get(format!("/v1/data_sources/{id}")),
            )
            .await;

        match direct {
            Ok(_) => Ok(id),
            Err(e) if e.is_not_found() => {
                let leaf = self.child_data_source(remote, &id).await?;
                match leaf {
                    Some(leaf) => {
                        tracing::info!(
                            database_id = %id,
                            data_source_id = %leaf,
                            "database_id_converted"
                        );
                        Ok(leaf)
                    }
                    None => Err(Error::not_found(ResourceKind::Database, id)),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Page through data sources until one names `database_id` as parent
    async fn child_data_source(&self, remote: &RemoteLookup, database_id: &str) -> Result<Option<String>> {
        let object = ResourceKind::DataSource.search_object();
        let mut cursor: Option<String> = None;

        loop {
            let mut body = json!({
                "filter": {"property": "object", "value": object},
                "page_size": DATA_SOURCE_SCAN_SIZE,
            });
            let mut key = vec![object, "parent", database_id];
            if let Some(cursor) = &cursor {
                body["start_cursor"] = json!(cursor);
                key.push(cursor.as_str());
            }

            let response = remote
                .request("search", &key, ApiRequest::post("/v1/search", body))
                .await?;

            let leaf = results(&response)
                .iter()
                .find(|source| {
                    source
                        .pointer("/parent/database_id")
                        .and_then(Value::as_str)
                        .and_then(normalize_id)
                        .is_some_and(|parent| parent == database_id)
                })
                .and_then(|source| source.get("id"))
                .and_then(Value::as_str)
                .and_then(normalize_id);
            if leaf.is_some() {
                return Ok(leaf);
            }

            let has_more = response
                .get("has_more")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let next = response
                .get("next_cursor")
                .and_then(Value::as_str)
                .map(str::to_string);
            match next {
                Some(next) if has_more && cursor.as_deref() != Some(next.as_str()) => {
                    cursor = Some(next);
                }
                _ => return Ok(None),
            }
        }
    }
}

fn results(response: &Value) -> &[Value] {
    response
        .get("results")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ncli_cache::{DeduplicationManager, MemoryCache};
    use ncli_core::Method;
    use ncli_utils::{CircuitBreaker, CircuitBreakerConfig, RetryConfig, RetryExecutor};
    use parking_lot::Mutex;

    const DATABASE_ID: &str = "1fb79d4c71bb8032b722c82305b63a00";
    const DATA_SOURCE_ID: &str = "2c2f8e1a5d6b4c7e9f0a1b2c3d4e5f60";

    /// Answers by `METHOD path` and records every request
    struct ScriptedTransport {
        routes: Vec<(Method, String, Result<Value>)>,
        log: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn new(routes: Vec<(Method, &str, Result<Value>)>) -> Arc<Self> {
            Arc::new(Self {
                routes: routes
                    .into_iter()
                    .map(|(method, path, response)| (method, path.to_string(), response))
                    .collect(),
                log: Mutex::new(Vec::new()),
            })
        }

        fn log(&self) -> Vec<String> {
            self.log.lock().clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn fetch(&self, request: ApiRequest) -> Result<Value> {
            self.log.lock().push(request.describe());
            self.routes
                .iter()
                .find(|(method, path, _)| *method == request.method && *path == request.path)
                .map(|(_, _, response)| response.clone())
                .unwrap_or_else(|| Err(Error::api(404, "no such route")))
        }
    }

    fn remote(transport: Arc<ScriptedTransport>) -> RemoteLookup {
        remote_with(transport)
    }

    fn remote_with(transport: Arc<dyn Transport>) -> RemoteLookup {
        let fetch = CachedFetch::new(
            MemoryCache::new(Default::default()),
            None,
            DeduplicationManager::default(),
            RetryExecutor::new(RetryConfig::no_retry()),
            Arc::new(CircuitBreaker::new(CircuitBreakerConfig::default())),
        );
        RemoteLookup::new(fetch, transport)
    }

    fn workspace() -> WorkspaceCache {
        WorkspaceCache::from_remote(&[json!({
            "id": DATABASE_ID,
            "title": [{"plain_text": "Tasks"}],
        })])
    }

    #[tokio::test]
    async fn test_url_resolves_offline() {
        let resolver = ResourceResolver::offline(None);
        let id = resolver
            .resolve(
                "https://host/1fb79d4c71bb8032b722c82305b63a00?v=x",
                ResourceKind::Page,
            )
            .await
            .unwrap();
        assert_eq!(id, DATABASE_ID);
    }

    #[tokio::test]
    async fn test_name_resolves_through_alias() {
        let resolver = ResourceResolver::offline(Some(workspace()));
        let id = resolver
            .resolve("Tasks Database", ResourceKind::Database)
            .await
            .unwrap();
        assert_eq!(id, DATABASE_ID);
    }

    #[tokio::test]
    async fn test_not_found_carries_the_kind() {
        let resolver = ResourceResolver::offline(Some(workspace()));

        let err = resolver
            .resolve("Quarterly Plan", ResourceKind::Page)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: ResourceKind::Page, .. }));

        let err = resolver
            .resolve("Payroll", ResourceKind::Database)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: ResourceKind::Database, .. }));
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_malformed_input_fails_by_stage() {
        let resolver = ResourceResolver::offline(None);

        let err = resolver
            .resolve("https://host/no-id-here", ResourceKind::Page)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidUrl { .. }));

        let err = resolver
            .resolve("1fb79d4c-71bb-8032-b722", ResourceKind::Page)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidId { .. }));
    }

    #[tokio::test]
    async fn test_remote_search_fallback() {
        let transport = ScriptedTransport::new(vec![(
            Method::Post,
            "/v1/search",
            Ok(json!({"results": [
                {"object": "page", "id": "aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee"},
                {"object": "page", "id": "ffffffffffffffffffffffffffffffff"}
            ]})),
        )]);
        let resolver = ResourceResolver::new(None, Some(remote(transport.clone())));

        let id = resolver
            .resolve("Quarterly Plan", ResourceKind::Page)
            .await
            .unwrap();

        assert_eq!(id, "aaaaaaaabbbbccccddddeeeeeeeeeeee");
        assert_eq!(transport.log(), vec!["POST /v1/search"]);
    }

    #[tokio::test]
    async fn test_container_id_is_converted_to_data_source() {
        let transport = ScriptedTransport::new(vec![(
            Method::Post,
            "/v1/search",
            Ok(json!({"results": [
                {
                    "object": "data_source",
                    "id": "ffffffffffffffffffffffffffffffff",
                    "parent": {"type": "database_id", "database_id": "eeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee"}
                },
                {
                    "object": "data_source",
                    "id": "2c2f8e1a-5d6b-4c7e-9f0a-1b2c3d4e5f60",
                    "parent": {"type": "database_id", "database_id": "1fb79d4c-71bb-8032-b722-c82305b63a00"}
                }
            ]})),
        )]);
        let resolver = ResourceResolver::new(Some(workspace()), Some(remote(transport.clone())));

        let id = resolver.resolve("Tasks", ResourceKind::Database).await.unwrap();

        assert_eq!(id, DATA_SOURCE_ID);
        assert_eq!(
            transport.log(),
            vec![
                format!("GET /v1/data_sources/{DATABASE_ID}"),
                "POST /v1/search".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_leaf_id_is_kept_when_lookup_succeeds() {
        let path = format!("/v1/data_sources/{DATA_SOURCE_ID}");
        let transport = ScriptedTransport::new(vec![(
            Method::Get,
            path.as_str(),
            Ok(json!({"object": "data_source", "id": DATA_SOURCE_ID})),
        )]);
        let resolver = ResourceResolver::new(None, Some(remote(transport.clone())));

        let id = resolver.resolve(DATA_SOURCE_ID, ResourceKind::Database).await.unwrap();

        assert_eq!(id, DATA_SOURCE_ID);
        assert_eq!(transport.log().len(), 1);
    }

    /// Serves data source search results one page per `start_cursor`
    struct PagedTransport {
        pages: Vec<Value>,
        cursors: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl Transport for PagedTransport {
        async fn fetch(&self, request: ApiRequest) -> Result<Value> {
            if request.method == Method::Get {
                return Err(Error::api(404, "not a data source"));
            }
            let cursor = request
                .body
                .as_ref()
                .and_then(|body| body.get("start_cursor"))
                .and_then(Value::as_str)
                .map(str::to_string);
            let page = match cursor.as_deref() {
                None => 0,
                Some(cursor) => cursor.trim_start_matches("page-").parse().unwrap_or(usize::MAX),
            };
            self.cursors.lock().push(cursor);
            self.pages
                .get(page)
                .cloned()
                .ok_or_else(|| Error::api(400, "bad cursor"))
        }
    }

    #[tokio::test]
    async fn test_container_conversion_follows_pagination() {
        let unrelated: Vec<Value> = (0..100)
            .map(|n| {
                json!({
                    "object": "data_source",
                    "id": format!("{n:032x}"),
                    "parent": {"type": "database_id", "database_id": "eeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee"}
                })
            })
            .collect();
        let transport = Arc::new(PagedTransport {
            pages: vec![
                json!({"results": unrelated, "has_more": true, "next_cursor": "page-1"}),
                json!({
                    "results": [{
                        "object": "data_source",
                        "id": DATA_SOURCE_ID,
                        "parent": {"type": "database_id", "database_id": DATABASE_ID}
                    }],
                    "has_more": false,
                    "next_cursor": null
                }),
            ],
            cursors: Mutex::new(Vec::new()),
        });
        let resolver = ResourceResolver::new(None, Some(remote_with(transport.clone())));

        let id = resolver.resolve(DATABASE_ID, ResourceKind::Database).await.unwrap();

        assert_eq!(id, DATA_SOURCE_ID);
        assert_eq!(
            *transport.cursors.lock(),
            vec![None, Some("page-1".to_string())]
        );
    }

    #[tokio::test]
    async fn test_unconvertible_container_is_not_found() {
        let transport = ScriptedTransport::new(vec![(
            Method::Post,
            "/v1/search",
            Ok(json!({"results": []})),
        )]);
        let resolver = ResourceResolver::new(None, Some(remote(transport)));

        let err = resolver
            .resolve(DATABASE_ID, ResourceKind::Database)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NotFound { kind: ResourceKind::Database, .. }));
    }

    #[tokio::test]
    async fn test_remote_errors_propagate() {
        let transport = ScriptedTransport::new(vec![(
            Method::Post,
            "/v1/search",
            Err(Error::api(400, "validation failed")),
        )]);
        let resolver = ResourceResolver::new(None, Some(remote(transport)));

        let err = resolver
            .resolve("Quarterly Plan", ResourceKind::Page)
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(400));
    }
}
