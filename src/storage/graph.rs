//! Graph backend on Dgraph, spoken to over its HTTP API.
//!
//! Each session is a `Session` node with `sessionid` and `sessionvalue`
//! predicates. Writes and deletes are upsert blocks: the node lookup and the
//! mutation travel in one request committed immediately, so resolving the
//! node and changing it happen in a single transaction.
//!
//! Uses the blocking `reqwest` client; do not call from inside an async
//! runtime thread.

use crate::error::{Error, Result, StorageError};
use crate::identifier::is_valid_identifier;
use crate::storage::traits::SessionBackend;
use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

/// Schema declared at open when `init_schema` is set.
pub const SCHEMA: &str = "\
sessionid: string @index(hash) .
sessionvalue: string .
type Session {
  sessionid
  sessionvalue
}
";

const LOOKUP: &str =
    "query q($id: string) { q(func: eq(sessionid, $id), first: 1) { sessionvalue } }";

/// Tuning knobs for the Dgraph backend.
#[derive(Debug, Clone)]
pub struct DgraphOptions {
    /// Per-request timeout.
    pub timeout: Duration,

    /// Declare [`SCHEMA`] when connecting.
    pub init_schema: bool,
}

impl Default for DgraphOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            init_schema: true,
        }
    }
}

/// Session storage as Dgraph nodes.
#[derive(Debug)]
pub struct DgraphBackend {
    client: Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct DgraphResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<DgraphError>,
}

#[derive(Debug, Deserialize)]
struct DgraphError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct SessionNode {
    #[serde(default)]
    sessionvalue: Option<String>,
}

impl DgraphBackend {
    /// Connect with default options, declaring the schema.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the client cannot be built or the schema
    /// cannot be declared.
    pub fn connect(endpoint: &str) -> Result<Self> {
        Self::connect_with(endpoint, &DgraphOptions::default())
    }

    /// Connect with explicit options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the client cannot be built or the schema
    /// cannot be declared.
    pub fn connect_with(endpoint: &str, options: &DgraphOptions) -> Result<Self> {
        let client = Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|e| Error::Config(format!("cannot build Dgraph client: {e}")))?;
        let backend = Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        };

        if options.init_schema {
            backend
                .alter(SCHEMA)
                .map_err(|e| Error::Config(format!("cannot declare Dgraph schema: {e}")))?;
        }

        debug!(endpoint = %backend.endpoint, "connected Dgraph session store");
        Ok(backend)
    }

    fn alter(&self, schema: &str) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/alter", self.endpoint))
            .body(schema.to_string())
            .send()
            .map_err(request_error)?;
        read_response(response)?;
        Ok(())
    }

    fn query(&self, body: &Value) -> Result<Value> {
        let response = self
            .client
            .post(format!("{}/query", self.endpoint))
            .json(body)
            .send()
            .map_err(request_error)?;
        read_response(response)
    }

    fn mutate(&self, body: &Value) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/mutate?commitNow=true", self.endpoint))
            .json(body)
            .send()
            .map_err(request_error)?;
        read_response(response)?;
        Ok(())
    }
}

fn request_error(err: reqwest::Error) -> Error {
    let storage = if err.is_timeout() {
        StorageError::Timeout
    } else if err.is_connect() {
        StorageError::Connection(err.to_string())
    } else {
        StorageError::Backend(err.to_string())
    };
    storage.into()
}

fn read_response(response: Response) -> Result<Value> {
    let status = response.status();
    let body: DgraphResponse = response.json().map_err(|e| {
        if e.is_timeout() {
            Error::from(StorageError::Timeout)
        } else {
            StorageError::Corrupt(format!("unreadable Dgraph response ({status}): {e}")).into()
        }
    })?;

    if !body.errors.is_empty() {
        let messages: Vec<&str> = body.errors.iter().map(|e| e.message.as_str()).collect();
        return Err(StorageError::Backend(messages.join("; ")).into());
    }
    if !status.is_success() {
        return Err(StorageError::Backend(format!("Dgraph returned {status}")).into());
    }
    Ok(body.data.unwrap_or(Value::Null))
}

fn checked(id: &str) -> Result<&str> {
    if is_valid_identifier(id) {
        Ok(id)
    } else {
        Err(Error::InvalidSession(format!(
            "identifier {id:?} is not safe to use in a Dgraph query"
        )))
    }
}

/// Upsert block resolving the node for `id` into variable `v`.
fn resolve_query(id: &str) -> String {
    format!("{{ q(func: eq(sessionid, \"{id}\")) {{ v as uid }} }}")
}

fn upsert_body(id: &str, payload: &str) -> Value {
    json!({
        "query": resolve_query(id),
        "set": [{
            "uid": "uid(v)",
            "sessionid": id,
            "sessionvalue": payload,
            "dgraph.type": "Session",
        }],
    })
}

fn delete_body(id: &str) -> Value {
    json!({
        "query": resolve_query(id),
        "delete": [{ "uid": "uid(v)" }],
    })
}

fn lookup_body(id: &str) -> Value {
    json!({
        "query": LOOKUP,
        "variables": { "$id": id },
    })
}

fn first_value(data: Value) -> Result<Option<String>> {
    let rows = match data.get("q") {
        Some(rows) => rows.clone(),
        None => return Ok(None),
    };
    let nodes: Vec<SessionNode> =
        serde_json::from_value(rows).map_err(|e| StorageError::Corrupt(e.to_string()))?;
    Ok(nodes
        .into_iter()
        .next()
        .and_then(|node| node.sessionvalue)
        .filter(|value| !value.is_empty()))
}

impl SessionBackend for DgraphBackend {
    fn put(&self, id: &str, payload: &str) -> Result<()> {
        self.mutate(&upsert_body(checked(id)?, payload))
    }

    fn get(&self, id: &str) -> Result<Option<String>> {
        first_value(self.query(&lookup_body(id))?)
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.mutate(&delete_body(checked(id)?))
    }
}
