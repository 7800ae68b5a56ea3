//! context-cli: terminal client for the Context Engine HTTP API
//!
//! # Subcommands
//! - `ask <question> [--json]` : answer a question, printing the trace then the answer
//! - `logs <query_id> [--json]`: replay a stored query
//! - `status`                  : show server health

use clap::{Parser, Subcommand};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8000";
const DETAIL_PREVIEW_CHARS: usize = 400;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "context-cli", version, about = "Ask the Context Engine questions")]
struct Cli {
    /// Context Engine HTTP server URL (overrides CONTEXT_ENGINE_URL env var)
    #[arg(long, env = "CONTEXT_ENGINE_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Ask a question
    Ask {
        question: String,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// Show the stored trace of an earlier question
    Logs {
        query_id: String,

        #[arg(long)]
        json: bool,
    },

    /// Show server status
    Status,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LogEntry {
    pub step: String,
    pub message: String,
    pub detail: Option<String>,
}

/// Body of POST /api/v1/ask
#[derive(Debug, Deserialize)]
pub struct AskResponse {
    pub query_id: String,
    pub answer: String,
    pub logs: Vec<LogEntry>,
}

/// Body of GET /api/v1/logs/:query_id
#[derive(Debug, Deserialize)]
pub struct QueryRecord {
    pub query_id: String,
    pub query: String,
    pub answer: String,
    pub logs: Vec<LogEntry>,
    pub created_at: Option<String>,
}

// ============================================================================
// Rendering
// ============================================================================

/// One block per entry: `[STEP] message`, then the detail indented and
/// truncated to a preview.
pub fn render_trace(logs: &[LogEntry]) -> String {
    let mut out = String::new();
    for entry in logs {
        out.push_str(&format!("[{}] {}\n", entry.step.to_uppercase(), entry.message));
        if let Some(detail) = &entry.detail {
            let mut preview: String = detail.chars().take(DETAIL_PREVIEW_CHARS).collect();
            if detail.chars().count() > DETAIL_PREVIEW_CHARS {
                preview.push_str("...");
            }
            for line in preview.lines() {
                out.push_str("    ");
                out.push_str(line);
                out.push('\n');
            }
        }
    }
    out
}

pub fn render_answer(resp: &AskResponse) -> String {
    format!(
        "{}\nAnswer:\n{}\n\nquery id: {}",
        render_trace(&resp.logs),
        resp.answer,
        resp.query_id
    )
}

pub fn render_record(record: &QueryRecord) -> String {
    format!(
        "Query {} ({})\nQuestion: {}\n\n{}\nAnswer:\n{}",
        record.query_id,
        record.created_at.as_deref().unwrap_or("unknown time"),
        record.query,
        render_trace(&record.logs),
        record.answer
    )
}

/// Pull the human message out of an error body (`{"detail": ..., "status": "error"}`).
pub fn error_detail(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["detail"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn client(timeout_secs: u64) -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()?)
}

/// Send the request, exiting with a readable message on transport or HTTP errors.
fn send(request: reqwest::blocking::RequestBuilder, url: &str) -> reqwest::blocking::Response {
    let resp = match request.send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("context-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().unwrap_or_default();
        eprintln!("context-cli: server returned {}: {}", status, error_detail(&body));
        std::process::exit(1);
    }
    resp
}

fn do_ask(server: &str, question: &str, json_output: bool) -> anyhow::Result<()> {
    // Generous timeout: the server waits on the LLM.
    let client = client(120)?;
    let url = format!("{}/api/v1/ask", server);
    let resp = send(
        client.post(&url).json(&serde_json::json!({ "query": question })),
        &url,
    );

    if json_output {
        let body: serde_json::Value = resp.json()?;
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    let answer: AskResponse = match resp.json() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("context-cli: failed to parse ask response: {}", e);
            std::process::exit(1);
        }
    };
    println!("{}", render_answer(&answer));
    Ok(())
}

fn do_logs(server: &str, query_id: &str, json_output: bool) -> anyhow::Result<()> {
    let client = client(30)?;
    let url = format!("{}/api/v1/logs/{}", server, query_id);
    let resp = send(client.get(&url), &url);

    if json_output {
        let body: serde_json::Value = resp.json()?;
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    let record: QueryRecord = resp.json()?;
    println!("{}", render_record(&record));
    Ok(())
}

fn do_status(server: &str) -> anyhow::Result<()> {
    let client = client(10)?;

    let url = format!("{}/health", server);
    match client.get(&url).send() {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("Context Engine: {}", body["status"].as_str().unwrap_or("unknown"));
        }
        Ok(r) => {
            eprintln!("context-cli: server unhealthy (HTTP {})", r.status());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("context-cli: cannot reach {}: {}", url, e);
            std::process::exit(1);
        }
    }

    let version_url = format!("{}/version", server);
    if let Ok(r) = client.get(&version_url).send() {
        let body: serde_json::Value = r.json().unwrap_or_default();
        println!("Version:        {}", body["version"].as_str().unwrap_or("?"));
    }
    println!("Server:         {}", server);

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Ask { question, json } => do_ask(&server, &question, json),
        Commands::Logs { query_id, json } => do_logs(&server, &query_id, json),
        Commands::Status => do_status(&server),
    };

    if let Err(e) = result {
        eprintln!("context-cli: {}", e);
        std::process::exit(1);
    }
}
