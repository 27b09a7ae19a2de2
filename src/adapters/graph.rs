//! Graph store backends
//!
//! Two implementations of the `GraphStore` contract:
//! - `HttpGraphStore`: Cypher-over-HTTP for a production graph database.
//! - `EmbeddedGraphStore`: sled-backed store for tests and single-node
//!   deployments. One tree per node label, JSON values, relations in a
//!   dedicated tree keyed `from|type|to`.
//!
//! Compare-and-set semantics back the playbook statistics invariant: the
//! embedded store serialises `checked_update` under a mutex, the HTTP store
//! delegates to a conditional update query.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::path::Path;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{classify_http, classify_status, GraphRow, GraphStore};
use crate::resilience::{AdapterError, CallFailure, Guard};

// ============================================================================
// HTTP backend
// ============================================================================

pub struct HttpGraphStore {
    http: reqwest::Client,
    base_url: String,
    guard: Guard,
}

impl HttpGraphStore {
    pub fn new(base_url: &str, guard: Guard) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            guard,
        }
    }

    async fn run_query(
        &self,
        cancel: &CancellationToken,
        op_name: &'static str,
        query: String,
        params: Value,
    ) -> Result<Vec<GraphRow>, AdapterError> {
        let url = format!("{}/query", self.base_url);
        self.guard
            .execute(op_name, cancel, || {
                let url = url.clone();
                let body = json!({ "query": query.clone(), "params": params.clone() });
                async move {
                    let resp = self
                        .http
                        .post(&url)
                        .json(&body)
                        .send()
                        .await
                        .map_err(|e| classify_http(&e))?;
                    if !resp.status().is_success() {
                        return Err(classify_status(resp.status()));
                    }
                    let rows: Vec<GraphRow> = resp
                        .json()
                        .await
                        .map_err(|e| CallFailure::Transient(format!("malformed response: {e}")))?;
                    Ok(rows)
                }
            })
            .await
    }
}

#[async_trait]
impl GraphStore for HttpGraphStore {
    async fn upsert_node(
        &self,
        cancel: &CancellationToken,
        label: &str,
        id: &str,
        props: Value,
    ) -> Result<(), AdapterError> {
        let query = format!("MERGE (n:{label} {{id: $id}}) SET n = $props");
        self.run_query(
            cancel,
            "graph.upsert_node",
            query,
            json!({ "id": id, "props": props }),
        )
        .await
        .map(|_| ())
    }

    async fn get_node(
        &self,
        cancel: &CancellationToken,
        label: &str,
        id: &str,
    ) -> Result<Option<Value>, AdapterError> {
        let query = format!("MATCH (n:{label} {{id: $id}}) RETURN n");
        let rows = self
            .run_query(cancel, "graph.get_node", query, json!({ "id": id }))
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn find_nodes(
        &self,
        cancel: &CancellationToken,
        label: &str,
        filters: &[(String, Value)],
    ) -> Result<Vec<Value>, AdapterError> {
        let clauses: Vec<String> = filters
            .iter()
            .enumerate()
            .map(|(i, (key, _))| format!("n.{key} = $p{i}"))
            .collect();
        let query = if clauses.is_empty() {
            format!("MATCH (n:{label}) RETURN n")
        } else {
            format!("MATCH (n:{label}) WHERE {} RETURN n", clauses.join(" AND "))
        };
        let mut params = Map::new();
        for (i, (_, value)) in filters.iter().enumerate() {
            params.insert(format!("p{i}"), value.clone());
        }
        self.run_query(cancel, "graph.find_nodes", query, Value::Object(params))
            .await
    }

    async fn upsert_relation(
        &self,
        cancel: &CancellationToken,
        from_id: &str,
        rel_type: &str,
        to_id: &str,
        props: Value,
    ) -> Result<(), AdapterError> {
        let query = format!(
            "MATCH (a {{id: $from}}), (b {{id: $to}}) MERGE (a)-[r:{rel_type}]->(b) SET r = $props"
        );
        self.run_query(
            cancel,
            "graph.upsert_relation",
            query,
            json!({ "from": from_id, "to": to_id, "props": props }),
        )
        .await
        .map(|_| ())
    }

    async fn query(
        &self,
        cancel: &CancellationToken,
        query: &str,
        params: Value,
    ) -> Result<Vec<GraphRow>, AdapterError> {
        self.run_query(cancel, "graph.query", query.to_string(), params)
            .await
    }

    async fn checked_update(
        &self,
        cancel: &CancellationToken,
        label: &str,
        id: &str,
        expect_key: &str,
        expect_value: Value,
        props: Value,
    ) -> Result<bool, AdapterError> {
        let query = format!(
            "MATCH (n:{label} {{id: $id}}) WHERE n.{expect_key} = $expect SET n = $props RETURN n"
        );
        let rows = self
            .run_query(
                cancel,
                "graph.checked_update",
                query,
                json!({ "id": id, "expect": expect_value, "props": props }),
            )
            .await?;
        Ok(!rows.is_empty())
    }
}

// ============================================================================
// Embedded backend
// ============================================================================

pub struct EmbeddedGraphStore {
    db: sled::Db,
    /// Serialises read-compare-write cycles in `checked_update`
    cas_lock: Mutex<()>,
}

impl EmbeddedGraphStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, AdapterError> {
        let db = sled::open(path)
            .map_err(|e| AdapterError::UpstreamUnavailable(format!("sled open: {e}")))?;
        Ok(Self {
            db,
            cas_lock: Mutex::new(()),
        })
    }

    /// In-memory store for tests.
    pub fn temporary() -> Result<Self, AdapterError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| AdapterError::UpstreamUnavailable(format!("sled open: {e}")))?;
        Ok(Self {
            db,
            cas_lock: Mutex::new(()),
        })
    }

    fn tree(&self, label: &str) -> Result<sled::Tree, AdapterError> {
        self.db
            .open_tree(format!("node:{label}"))
            .map_err(storage_err)
    }

    fn relations(&self) -> Result<sled::Tree, AdapterError> {
        self.db.open_tree("rel").map_err(storage_err)
    }
}

fn storage_err(e: sled::Error) -> AdapterError {
    AdapterError::UpstreamUnavailable(format!("storage error: {e}"))
}

fn decode(bytes: &[u8]) -> Result<Value, AdapterError> {
    serde_json::from_slice(bytes)
        .map_err(|e| AdapterError::UpstreamUnavailable(format!("corrupt node payload: {e}")))
}

fn matches_filters(node: &Value, filters: &[(String, Value)]) -> bool {
    filters
        .iter()
        .all(|(key, expected)| node.get(key) == Some(expected))
}

#[async_trait]
impl GraphStore for EmbeddedGraphStore {
    async fn upsert_node(
        &self,
        _cancel: &CancellationToken,
        label: &str,
        id: &str,
        props: Value,
    ) -> Result<(), AdapterError> {
        let bytes = serde_json::to_vec(&props)
            .map_err(|e| AdapterError::ValidationFailed(format!("unserialisable props: {e}")))?;
        self.tree(label)?.insert(id, bytes).map_err(storage_err)?;
        Ok(())
    }

    async fn get_node(
        &self,
        _cancel: &CancellationToken,
        label: &str,
        id: &str,
    ) -> Result<Option<Value>, AdapterError> {
        match self.tree(label)?.get(id).map_err(storage_err)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn find_nodes(
        &self,
        _cancel: &CancellationToken,
        label: &str,
        filters: &[(String, Value)],
    ) -> Result<Vec<Value>, AdapterError> {
        let mut nodes = Vec::new();
        for item in self.tree(label)?.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            let node = decode(&bytes)?;
            if matches_filters(&node, filters) {
                nodes.push(node);
            }
        }
        Ok(nodes)
    }

    async fn upsert_relation(
        &self,
        _cancel: &CancellationToken,
        from_id: &str,
        rel_type: &str,
        to_id: &str,
        props: Value,
    ) -> Result<(), AdapterError> {
        let key = format!("{from_id}|{rel_type}|{to_id}");
        let bytes = serde_json::to_vec(&props)
            .map_err(|e| AdapterError::ValidationFailed(format!("unserialisable props: {e}")))?;
        self.relations()?.insert(key.as_bytes(), bytes).map_err(storage_err)?;
        Ok(())
    }

    async fn query(
        &self,
        _cancel: &CancellationToken,
        query: &str,
        _params: Value,
    ) -> Result<Vec<GraphRow>, AdapterError> {
        // The embedded backend has no query language; callers that need
        // topology context get an empty result rather than a failure.
        debug!(query, "Embedded graph store ignoring free-form query");
        Ok(Vec::new())
    }

    async fn checked_update(
        &self,
        _cancel: &CancellationToken,
        label: &str,
        id: &str,
        expect_key: &str,
        expect_value: Value,
        props: Value,
    ) -> Result<bool, AdapterError> {
        let tree = self.tree(label)?;
        let bytes = serde_json::to_vec(&props)
            .map_err(|e| AdapterError::ValidationFailed(format!("unserialisable props: {e}")))?;

        #[allow(clippy::unwrap_used)]
        let _held = self.cas_lock.lock().unwrap();
        let current = match tree.get(id).map_err(storage_err)? {
            Some(raw) => decode(&raw)?,
            None => return Ok(false),
        };
        if current.get(expect_key) != Some(&expect_value) {
            return Ok(false);
        }
        tree.insert(id, bytes).map_err(storage_err)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> EmbeddedGraphStore {
        EmbeddedGraphStore::temporary().unwrap()
    }

    #[tokio::test]
    async fn upsert_and_get_roundtrip() {
        let s = store();
        let cancel = CancellationToken::new();
        let props = json!({ "id": "pb-1", "title": "restart", "status": "ACTIVE" });
        s.upsert_node(&cancel, "Playbook", "pb-1", props.clone())
            .await
            .unwrap();
        let fetched = s.get_node(&cancel, "Playbook", "pb-1").await.unwrap();
        assert_eq!(fetched, Some(props));
    }

    #[tokio::test]
    async fn find_nodes_filters_by_properties() {
        let s = store();
        let cancel = CancellationToken::new();
        s.upsert_node(
            &cancel,
            "Playbook",
            "a",
            json!({ "id": "a", "status": "ACTIVE", "pattern_type": "METRIC_METRIC" }),
        )
        .await
        .unwrap();
        s.upsert_node(
            &cancel,
            "Playbook",
            "b",
            json!({ "id": "b", "status": "DRAFT", "pattern_type": "METRIC_METRIC" }),
        )
        .await
        .unwrap();

        let found = s
            .find_nodes(
                &cancel,
                "Playbook",
                &[("status".to_string(), json!("ACTIVE"))],
            )
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["id"], "a");
    }

    #[tokio::test]
    async fn checked_update_applies_only_on_match() {
        let s = store();
        let cancel = CancellationToken::new();
        s.upsert_node(&cancel, "Playbook", "pb", json!({ "id": "pb", "total": 3 }))
            .await
            .unwrap();

        // Stale expectation loses the race
        let lost = s
            .checked_update(
                &cancel,
                "Playbook",
                "pb",
                "total",
                json!(2),
                json!({ "id": "pb", "total": 4 }),
            )
            .await
            .unwrap();
        assert!(!lost);

        let won = s
            .checked_update(
                &cancel,
                "Playbook",
                "pb",
                "total",
                json!(3),
                json!({ "id": "pb", "total": 4 }),
            )
            .await
            .unwrap();
        assert!(won);
        let node = s.get_node(&cancel, "Playbook", "pb").await.unwrap().unwrap();
        assert_eq!(node["total"], 4);
    }

    #[tokio::test]
    async fn checked_update_on_missing_node_fails() {
        let s = store();
        let cancel = CancellationToken::new();
        let applied = s
            .checked_update(&cancel, "Playbook", "nope", "total", json!(0), json!({}))
            .await
            .unwrap();
        assert!(!applied);
    }
}
