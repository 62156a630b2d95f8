//! In-process stand-in for the agent service, for demos and tests
//!
//! The branching on query substrings is fixture behavior: it exercises every
//! response status and the two-step resume flow without a backend.

use super::Transport;
use crate::protocol::{
    Block, ChartSpec, ChartType, Document, ExecuteRequest, ExecuteResponse, FieldSpec,
    InputSchema, Series, UserInput,
};
use async_trait::async_trait;
use rand::Rng;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

const SKILL_SALES: &str = "sales_report_generator";
const EXPIRED_EXECUTION: &str = "Execution session expired or invalid.";

/// Where a paused sales report flow stands
#[derive(Debug, Clone)]
enum SalesStep {
    AwaitingRegion,
    AwaitingPeriod { region: String },
}

/// Simulated agent with a fixed repertoire
pub struct MockAgentTransport {
    min_latency: Duration,
    max_latency: Duration,
    sessions: Mutex<HashMap<String, SalesStep>>,
}

impl Default for MockAgentTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAgentTransport {
    /// Mock with the 1-2s latency of a real round trip
    pub fn new() -> Self {
        Self::with_latency(Duration::from_secs(1), Duration::from_secs(2))
    }

    /// Mock that answers immediately
    #[cfg(test)]
    pub fn instant() -> Self {
        Self::with_latency(Duration::ZERO, Duration::ZERO)
    }

    pub fn with_latency(min: Duration, max: Duration) -> Self {
        Self {
            min_latency: min,
            max_latency: max.max(min),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn latency(&self) -> Duration {
        if self.max_latency.is_zero() {
            return Duration::ZERO;
        }
        let min = u64::try_from(self.min_latency.as_millis()).unwrap_or(u64::MAX);
        let max = u64::try_from(self.max_latency.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }

    fn open_session(&self, step: SalesStep) -> String {
        let execution_id = format!("exec-sales-{}", Uuid::new_v4());
        self.lock_sessions().insert(execution_id.clone(), step);
        execution_id
    }

    fn lock_sessions(&self) -> std::sync::MutexGuard<'_, HashMap<String, SalesStep>> {
        // A poisoned map only means a panicking test thread; the data is still usable
        self.sessions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn respond(&self, request: &ExecuteRequest) -> ExecuteResponse {
        match request {
            ExecuteRequest::Resume {
                execution_id,
                user_input,
            } => self.resume(execution_id, user_input),
            ExecuteRequest::Query { query, .. } => self.query(query),
        }
    }

    fn query(&self, query: &str) -> ExecuteResponse {
        if query.is_empty() {
            return ExecuteResponse::failed("Empty query.");
        }

        let lower = query.to_lowercase();
        if lower.contains("sales") || lower.contains("report") {
            let execution_id = self.open_session(SalesStep::AwaitingRegion);
            return ExecuteResponse::waiting_for_input(
                execution_id,
                "I can help with the sales report. Which **Region** would you like to analyze?",
                region_schema(),
            )
            .with_skill(SKILL_SALES, "sales_report")
            .with_duration_ms(600);
        }

        if lower.contains("market") || lower.contains("analysis") {
            return ExecuteResponse::completed(market_analysis())
                .with_skill("market_analysis", "market_analysis")
                .with_duration_ms(1500);
        }

        ExecuteResponse::completed(Document::new(vec![Block::paragraph(format!(
            "I understood: \"{query}\".\n\n\
             I am the Aegis Agent. I can generate **Sales Reports** or perform **Market Analysis**. Try asking: \n\n\
             * \"Generate a sales report\"\n\
             * \"Show me market analysis\""
        ))]))
        .with_skill("chat", "chat")
        .with_duration_ms(300)
    }

    fn resume(&self, execution_id: &str, input: &UserInput) -> ExecuteResponse {
        let mut sessions = self.lock_sessions();
        let step = sessions.get(execution_id).cloned();

        match step {
            Some(SalesStep::AwaitingRegion) => {
                let Some(region) = provided(input, "region") else {
                    return ExecuteResponse::failed(EXPIRED_EXECUTION);
                };
                sessions.remove(execution_id);
                drop(sessions);

                let next = self.open_session(SalesStep::AwaitingPeriod {
                    region: region.clone(),
                });
                ExecuteResponse::waiting_for_input(
                    next,
                    format!(
                        "You selected **{region}**. Now, please specify the analysis period (e.g., 2024Q1)."
                    ),
                    period_schema(),
                )
                .with_skill(SKILL_SALES, "sales_report")
                .with_duration_ms(450)
            }
            Some(SalesStep::AwaitingPeriod { region }) => {
                let Some(period) = provided(input, "period") else {
                    return ExecuteResponse::failed(EXPIRED_EXECUTION);
                };
                sessions.remove(execution_id);

                tracing::debug!(%region, %period, "Mock agent completing sales report");
                ExecuteResponse::completed(sales_report(&period))
                    .with_skill(SKILL_SALES, "sales_report")
                    .with_duration_ms(1200)
            }
            None => ExecuteResponse::failed(EXPIRED_EXECUTION),
        }
    }
}

#[async_trait]
impl Transport for MockAgentTransport {
    async fn execute(&self, request: &ExecuteRequest) -> ExecuteResponse {
        let latency = self.latency();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.respond(request)
    }

    async fn check_health(&self) -> bool {
        true
    }
}

/// A present, non-empty field value rendered as text
fn provided(input: &UserInput, key: &str) -> Option<String> {
    match input.get(key)? {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn region_schema() -> InputSchema {
    InputSchema::new()
        .with_field(
            "region",
            FieldSpec::string(true).with_description("Region (e.g. North America, APAC)"),
        )
        .with_field(
            "includeForecast",
            FieldSpec::boolean(false).with_description("Include 2025 Forecast?"),
        )
}

fn period_schema() -> InputSchema {
    InputSchema::new().with_field(
        "period",
        FieldSpec::string(true).with_description("Period (e.g., 2024Q1)"),
    )
}

fn labels(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

fn sales_report(period: &str) -> Document {
    Document::new(vec![
        Block::paragraph(format!(
            "### Sales Report - {period}\n\n\
             Here is the performance analysis you requested. The region shows strong growth compared to previous quarters."
        )),
        Block::chart(
            ChartSpec::new(
                ChartType::Bar,
                "Monthly Revenue (Million USD)",
                labels(&["Jan", "Feb", "Mar"]),
            )
            .with_series(Series::new("Revenue", vec![120.0, 132.0, 101.0]))
            .with_series(Series::new("Target", vec![100.0, 100.0, 100.0])),
        ),
        Block::paragraph("> Note: Data is preliminary and subject to audit."),
    ])
}

fn market_analysis() -> Document {
    Document::new(vec![
        Block::paragraph(
            "## Market Analysis\n\n\
             The current market trend indicates a significant uptake in AI-driven solutions. \
             Below is the trend analysis for the last 5 years.",
        ),
        Block::chart(
            ChartSpec::new(
                ChartType::Line,
                "Market Share Trend (%)",
                labels(&["2020", "2021", "2022", "2023", "2024"]),
            )
            .with_series(Series::new("Aegis Corp", vec![15.0, 22.0, 35.0, 45.0, 58.0]))
            .with_series(Series::new("Competitor X", vec![40.0, 35.0, 30.0, 25.0, 20.0])),
        ),
    ])
}
