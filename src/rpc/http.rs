// Flowdeck — JSON-RPC over HTTP workflow backend

use super::*;
use crate::config::BackendConfig;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// JsonRpcBackend speaks JSON-RPC 2.0 over HTTP POST.
/// Every operation is sent as `<extension>.<operation>` with named params.
pub struct JsonRpcBackend {
    endpoint: String,
    extension: String,
    client: Client,
    query_timeout: Option<Duration>,
    max_retries: usize,
    retry_delay: Duration,
    next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: String,
}

impl JsonRpcBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        // No client-wide timeout: executeWorkflow is bounded by the
        // execution timeout instead.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            extension: config.extension.clone(),
            client,
            query_timeout: (config.timeout_secs > 0)
                .then(|| Duration::from_secs(config.timeout_secs)),
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            next_id: AtomicU64::new(1),
        })
    }

    fn method(&self, operation: &str) -> String {
        format!("{}.{}", self.extension, operation)
    }

    /// Send one call and return its `result` member.
    async fn call(
        &self,
        operation: &str,
        params: Value,
        delivery: Delivery,
    ) -> Result<Value, BackendError> {
        let max_retries = match delivery {
            Delivery::Query => self.max_retries,
            Delivery::Once => 0,
        };
        let method = self.method(operation);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let mut last_error = None;
        for attempt in 0..=max_retries {
            if attempt > 0 {
                tracing::info!(
                    attempt = attempt,
                    method = %method,
                    "Retrying backend call after {}ms delay",
                    self.retry_delay.as_millis()
                );
                tokio::time::sleep(self.retry_delay).await;
            }

            tracing::debug!(url = %self.endpoint, method = %method, attempt = attempt, "Sending JSON-RPC request");

            let mut request = self.client.post(&self.endpoint).json(&body);
            if let (Delivery::Query, Some(limit)) = (delivery, self.query_timeout) {
                request = request.timeout(limit);
            }
            let res = request.send().await;

            match res {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let text = response.text().await?;
                        tracing::debug!(status = %status, body_len = text.len(), "JSON-RPC response received");
                        return parse_response(&text);
                    }

                    let is_transient = status.is_server_error() || status.as_u16() == 429;
                    let text = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "could not read body".to_string());

                    // Some servers report JSON-RPC errors with a non-2xx status.
                    if let Ok(RpcResponse {
                        error: Some(err), ..
                    }) = serde_json::from_str::<RpcResponse>(&text)
                    {
                        return Err(BackendError::Rejected {
                            code: err.code,
                            message: err.message,
                        });
                    }

                    let error = BackendError::Transport(format!("HTTP {}: {}", status, text));
                    if is_transient && attempt < max_retries {
                        tracing::warn!(status = %status, attempt = attempt, "Transient backend error: {}", text);
                        last_error = Some(error);
                        continue;
                    }
                    return Err(error);
                }
                Err(e) if attempt < max_retries && !e.is_timeout() => {
                    tracing::warn!(error = %e, attempt = attempt, "Network error during backend call");
                    last_error = Some(BackendError::from(e));
                    continue;
                }
                Err(e) => return Err(BackendError::from(e)),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            BackendError::Transport(format!(
                "backend call failed after {} attempts",
                max_retries + 1
            ))
        }))
    }

    async fn call_typed<T: DeserializeOwned>(
        &self,
        operation: &str,
        params: Value,
        delivery: Delivery,
    ) -> Result<T, BackendError> {
        let result = self.call(operation, params, delivery).await?;
        Ok(serde_json::from_value(result)?)
    }
}

/// How a call is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    /// Side-effect free. Retried, and bounded by `backend.timeout_secs`.
    Query,
    /// Sent exactly once with no HTTP timeout. Used for executeWorkflow,
    /// which must not run twice.
    Once,
}

fn parse_response(body: &str) -> Result<Value, BackendError> {
    let response: RpcResponse = serde_json::from_str(body)?;
    if let Some(err) = response.error {
        return Err(BackendError::Rejected {
            code: err.code,
            message: err.message,
        });
    }
    Ok(response.result.unwrap_or(Value::Null))
}

#[async_trait]
impl WorkflowBackend for JsonRpcBackend {
    async fn get_workflows(&self) -> Result<Vec<WorkflowInfo>, BackendError> {
        self.call_typed("getWorkflows", json!({}), Delivery::Query)
            .await
    }

    async fn get_input_schema(
        &self,
        id: &WorkflowDefinitionId,
    ) -> Result<Option<Value>, BackendError> {
        let result = self
            .call("getInputSchema", json!({ "id": id }), Delivery::Query)
            .await?;
        Ok((!result.is_null()).then_some(result))
    }

    async fn execute_workflow(
        &self,
        request: &ExecuteRequest,
    ) -> Result<ExecutionResult, BackendError> {
        self.call_typed(
            "executeWorkflow",
            serde_json::to_value(request)?,
            Delivery::Once,
        )
        .await
    }

    async fn count_workflows(&self) -> Result<usize, BackendError> {
        self.call_typed("getNumbersOfWorkflows", json!({}), Delivery::Query)
            .await
    }
}
