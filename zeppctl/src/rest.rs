//! Thin client for the daemon's REST API.
//!
//! Covers exactly the three surfaces the lifecycle needs: notebook import,
//! notebook delete, and interpreter-setting modification. Interpreter
//! documents are treated as opaque JSON that is partially merged and written
//! back whole; the merge rules live in pure functions so they are testable
//! without a daemon.

use serde_json::{Map, Value};

use crate::errors::{ZeppError, ZeppResult};

/// Requested changes to a named interpreter setting.
///
/// Properties are shallow-merged (caller's keys win), options likewise, and
/// interpreter-group entries are upserted by their `name` field.
#[derive(Clone, Debug, Default)]
pub struct InterpreterChanges {
    pub properties: Map<String, Value>,
    pub options: Map<String, Value>,
    pub interpreter_group: Vec<Value>,
}

impl InterpreterChanges {
    pub fn properties(properties: Map<String, Value>) -> Self {
        Self {
            properties,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty() && self.options.is_empty() && self.interpreter_group.is_empty()
    }
}

pub struct ZeppelinApi {
    base: String,
    client: reqwest::Client,
}

impl ZeppelinApi {
    /// Client for the local daemon on the configured port.
    pub fn new(port: u16) -> Self {
        Self::with_base(format!("http://localhost:{port}/api"))
    }

    /// Client for an explicit base URL (tests point this at a stub server).
    pub fn with_base(base: impl Into<String>) -> Self {
        let mut base = base.into();
        while base.ends_with('/') {
            base.pop();
        }
        Self {
            base,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base)
    }

    /// Import a notebook document.
    ///
    /// Success is exactly HTTP 201 with a `body` identifier; any other
    /// status means the daemon rejected the document and yields `None`
    /// rather than an error.
    pub async fn import_notebook(&self, content: &str) -> ZeppResult<Option<String>> {
        let response = self
            .client
            .post(self.url("notebook"))
            .header("content-type", "application/json")
            .body(content.to_string())
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() != 201 {
            tracing::debug!(%status, "notebook import rejected");
            return Ok(None);
        }

        let body: Value = response.json().await.map_err(|e| {
            tracing::error!("malformed notebook import response: {e}");
            ZeppError::BadResponse {
                status: status.as_u16(),
                detail: format!("malformed import response: {e}"),
            }
        })?;
        match &body["body"] {
            Value::String(id) => Ok(Some(id.clone())),
            other => Err(ZeppError::BadResponse {
                status: status.as_u16(),
                detail: format!("import response missing body id: {other}"),
            }),
        }
    }

    /// Fire-and-forget notebook delete; a non-2xx status is not an error.
    pub async fn delete_notebook(&self, notebook_id: &str) -> ZeppResult<()> {
        self.client
            .delete(self.url(&format!("notebook/{notebook_id}")))
            .send()
            .await?;
        Ok(())
    }

    /// Merge `changes` into the named interpreter setting and write the
    /// whole modified document back.
    ///
    /// A missing name is [`ZeppError::NotFound`] and issues no PUT. A
    /// non-200 PUT response or a malformed setting list is
    /// [`ZeppError::BadResponse`].
    pub async fn modify_interpreter(
        &self,
        interpreter_name: &str,
        changes: &InterpreterChanges,
    ) -> ZeppResult<()> {
        let response = self.client.get(self.url("interpreter/setting")).send().await?;
        let status = response.status().as_u16();
        let listing: Value = response.json().await.map_err(|e| {
            tracing::error!("malformed interpreter setting listing: {e}");
            ZeppError::BadResponse {
                status,
                detail: format!("malformed interpreter listing: {e}"),
            }
        })?;

        let settings = listing["body"].as_array().ok_or_else(|| {
            tracing::error!("interpreter listing has no body array");
            ZeppError::BadResponse {
                status,
                detail: "interpreter listing has no body array".to_string(),
            }
        })?;

        let mut setting = settings
            .iter()
            .find(|s| s["name"].as_str() == Some(interpreter_name))
            .cloned()
            .ok_or_else(|| {
                ZeppError::NotFound(format!("interpreter not found: {interpreter_name}"))
            })?;

        merge_object(&mut setting["properties"], &changes.properties);
        merge_object(&mut setting["options"], &changes.options);
        upsert_interpreter_group(&mut setting["interpreterGroup"], &changes.interpreter_group);

        let id = setting["id"].as_str().ok_or_else(|| ZeppError::BadResponse {
            status,
            detail: format!("interpreter {interpreter_name} has no id"),
        })?;
        let url = self.url(&format!("interpreter/setting/{id}"));

        let response = self.client.put(url).json(&setting).send().await?;
        let put_status = response.status().as_u16();
        if put_status != 200 {
            let detail = response.text().await.unwrap_or_default();
            tracing::error!(status = put_status, %detail, "interpreter update rejected");
            return Err(ZeppError::BadResponse {
                status: put_status,
                detail,
            });
        }
        Ok(())
    }
}

/// Shallow-merge `changes` into a JSON object: caller's keys win, unrelated
/// keys are untouched. A non-object target is replaced wholesale.
pub(crate) fn merge_object(target: &mut Value, changes: &Map<String, Value>) {
    if changes.is_empty() {
        return;
    }
    match target.as_object_mut() {
        Some(existing) => {
            for (key, value) in changes {
                existing.insert(key.clone(), value.clone());
            }
        }
        None => *target = Value::Object(changes.clone()),
    }
}

/// Upsert interpreter-group entries by `name`: a matching entry has its
/// `class` rewritten, an unknown name is appended.
pub(crate) fn upsert_interpreter_group(target: &mut Value, entries: &[Value]) {
    if entries.is_empty() {
        return;
    }
    if !target.is_array() {
        *target = Value::Array(Vec::new());
    }
    let Some(group) = target.as_array_mut() else {
        return;
    };
    for entry in entries {
        match group
            .iter_mut()
            .find(|candidate| candidate["name"] == entry["name"])
        {
            Some(candidate) => {
                candidate["class"] = entry["class"].clone();
            }
            None => group.push(entry.clone()),
        }
    }
}
