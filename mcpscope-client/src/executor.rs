// mcpscope-client/src/executor.rs
use mcpscope_common::FormValues;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::debug;

pub type ExecutionFuture<'a> = Pin<Box<dyn Future<Output = Result<String, String>> + Send + 'a>>;

/// Runs a tool with the collected form values and returns display text.
pub trait ToolExecutor: Send + Sync {
    fn execute<'a>(&'a self, tool_id: &'a str, values: &'a FormValues) -> ExecutionFuture<'a>;
}

/// Stand-in executor: waits, then echoes the call back. Nothing is contacted.
#[derive(Debug, Clone)]
pub struct SimulatedExecutor {
    delay: Duration,
}

impl SimulatedExecutor {
    pub const DEFAULT_DELAY: Duration = Duration::from_millis(1500);

    pub fn with_delay(delay: Duration) -> Self {
        SimulatedExecutor { delay }
    }
}

impl Default for SimulatedExecutor {
    fn default() -> Self {
        Self::with_delay(Self::DEFAULT_DELAY)
    }
}

pub fn simulated_output(tool_id: &str, values: &FormValues) -> String {
    let params = serde_json::to_string(values).unwrap_or_else(|_| "{}".to_string());
    format!("Successfully executed {} with parameters: {}", tool_id, params)
}

impl ToolExecutor for SimulatedExecutor {
    fn execute<'a>(&'a self, tool_id: &'a str, values: &'a FormValues) -> ExecutionFuture<'a> {
        Box::pin(async move {
            debug!("Simulating {} ({} values, {:?})", tool_id, values.len(), self.delay);
            tokio::time::sleep(self.delay).await;
            Ok(simulated_output(tool_id, values))
        })
    }
}
