use std::fmt::Write as FmtWrite;

use serde::Serialize;

use crate::models::{Chunk, ConversationLog, OutputFormat, RetrievalResult, Role};
use crate::services::MetricsSummary;
use crate::session::{Answer, IngestReport, SessionStats};

pub trait Formatter {
    fn format_answer(&self, answer: &Answer, show_context: bool) -> String;
    fn format_retrieval(&self, question: &str, results: &RetrievalResult) -> String;
    fn format_chunks(&self, document: &str, chunks: &[Chunk]) -> String;
    fn format_ingest(&self, report: &IngestReport) -> String;
    fn format_history(&self, log: &ConversationLog) -> String;
    fn format_session(&self, stats: &SessionStats) -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

/// Reachability of one Ollama backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "detail")]
pub enum BackendState {
    Ready,
    ModelMissing,
    Unreachable(String),
}

impl BackendState {
    pub fn is_ready(&self) -> bool {
        matches!(self, BackendState::Ready)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BackendStatus {
    pub url: String,
    pub model: String,
    #[serde(flatten)]
    pub state: BackendState,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub embedding: BackendStatus,
    pub generation: BackendStatus,
    pub config_path: Option<String>,
    pub metrics: Option<MetricsSummary>,
}

fn preview(text: &str, max_chars: usize) -> String {
    let head: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        format!("{}...", head)
    } else {
        head
    }
}

fn clock_time(rfc3339: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(rfc3339)
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|_| rfc3339.to_string())
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::User => "You",
        Role::Assistant => "Assistant",
    }
}

pub struct TextFormatter;

impl TextFormatter {
    fn write_hits(output: &mut String, results: &RetrievalResult) {
        for (i, hit) in results.iter().enumerate() {
            writeln!(
                output,
                "{}. [Score: {:.3}] {} #{} (chars {}..{})",
                i + 1,
                hit.score,
                hit.chunk.document_id,
                hit.chunk.chunk_index,
                hit.chunk.start_offset,
                hit.chunk.end_offset
            )
            .unwrap();
            for line in preview(&hit.chunk.text, 200).lines() {
                writeln!(output, "   {}", line).unwrap();
            }
            writeln!(output).unwrap();
        }
    }
}

impl Formatter for TextFormatter {
    fn format_answer(&self, answer: &Answer, show_context: bool) -> String {
        let mut output = String::new();
        writeln!(output, "{}", answer.text.trim_end()).unwrap();

        if show_context {
            writeln!(output).unwrap();
            if answer.used_context() {
                writeln!(output, "Context ({} chunks)", answer.retrieval.len()).unwrap();
                writeln!(output, "-------").unwrap();
                Self::write_hits(&mut output, &answer.retrieval);
            } else {
                writeln!(output, "(answered without document context)").unwrap();
            }
        }

        output
    }

    fn format_retrieval(&self, question: &str, results: &RetrievalResult) -> String {
        if results.is_empty() {
            return format!("No matching chunks for: {}\n", question);
        }

        let mut output = String::new();
        writeln!(output, "Context for: \"{}\"\n", question).unwrap();
        Self::write_hits(&mut output, results);
        output
    }

    fn format_chunks(&self, document: &str, chunks: &[Chunk]) -> String {
        let mut output = String::new();
        writeln!(output, "{}: {} chunks\n", document, chunks.len()).unwrap();
        for chunk in chunks {
            writeln!(
                output,
                "#{} chars {}..{} ({} chars)",
                chunk.chunk_index,
                chunk.start_offset,
                chunk.end_offset,
                chunk.len()
            )
            .unwrap();
            for line in preview(&chunk.text, 120).lines() {
                writeln!(output, "   {}", line).unwrap();
            }
        }
        output
    }

    fn format_ingest(&self, report: &IngestReport) -> String {
        if report.skipped {
            return format!("{}: already indexed, skipped\n", report.document);
        }
        format!(
            "{}: {} chunks indexed in {}ms ({} total)\n",
            report.document, report.chunks, report.duration_ms, report.total_chunks
        )
    }

    fn format_history(&self, log: &ConversationLog) -> String {
        if log.is_empty() {
            return "No messages yet.\n".to_string();
        }

        let mut output = String::new();
        for turn in log.turns() {
            writeln!(
                output,
                "[{}] {}: {}",
                clock_time(&turn.timestamp),
                role_label(turn.role),
                turn.content.trim_end()
            )
            .unwrap();
        }
        output
    }

    fn format_session(&self, stats: &SessionStats) -> String {
        let mut output = String::new();
        writeln!(output, "Documents: {}", stats.documents.len()).unwrap();
        for doc in &stats.documents {
            writeln!(output, "  {} ({} chunks)", doc.id, doc.chunks).unwrap();
        }
        writeln!(output, "Chunks:    {}", stats.chunks).unwrap();
        if let Some(dim) = stats.dimension {
            writeln!(output, "Dimension: {}", dim).unwrap();
        }
        writeln!(output, "Messages:  {}", stats.turns).unwrap();
        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "Status").unwrap();
        writeln!(output, "------").unwrap();

        for (label, backend) in [
            ("Embedding: ", &status.embedding),
            ("Generation:", &status.generation),
        ] {
            let state = match &backend.state {
                BackendState::Ready => "[READY]".to_string(),
                BackendState::ModelMissing => "[MODEL MISSING]".to_string(),
                BackendState::Unreachable(e) => format!("[UNREACHABLE] {}", e),
            };
            writeln!(output, "{}    {} {}", label, backend.model, state).unwrap();
            writeln!(output, "  URL:          {}", backend.url).unwrap();
        }

        if let Some(ref path) = status.config_path {
            writeln!(output, "Config:         {}", path).unwrap();
        }

        if let Some(ref m) = status.metrics {
            writeln!(output).unwrap();
            writeln!(output, "Questions:      {}", m.total_questions).unwrap();
            if m.total_questions > 0 {
                writeln!(output, "  Avg Latency:  {}ms", m.avg_latency_ms).unwrap();
                writeln!(output, "  Avg Context:  {:.1} chunks", m.avg_context_chunks).unwrap();
                if m.error_rate > 0.0 {
                    writeln!(output, "  Error Rate:   {:.1}%", m.error_rate).unwrap();
                }
                if m.timeouts > 0 {
                    writeln!(output, "  Timeouts:     {}", m.timeouts).unwrap();
                }
            }
        }

        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}\n", error)
    }
}

pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn render<T: Serialize + ?Sized>(&self, value: &T) -> String {
        let json = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        match json {
            Ok(s) => format!("{}\n", s),
            Err(e) => format!("{}\n", serde_json::json!({ "error": e.to_string() })),
        }
    }
}

impl Formatter for JsonFormatter {
    fn format_answer(&self, answer: &Answer, show_context: bool) -> String {
        let mut json = serde_json::json!({
            "question": answer.question,
            "answer": answer.text,
            "used_context": answer.used_context(),
            "duration_ms": answer.duration_ms,
        });
        if show_context {
            json["context"] = serde_json::to_value(&answer.retrieval.hits).unwrap_or_default();
        }
        self.render(&json)
    }

    fn format_retrieval(&self, question: &str, results: &RetrievalResult) -> String {
        self.render(&serde_json::json!({
            "question": question,
            "results": results.hits,
        }))
    }

    fn format_chunks(&self, document: &str, chunks: &[Chunk]) -> String {
        self.render(&serde_json::json!({
            "document": document,
            "chunks": chunks,
        }))
    }

    fn format_ingest(&self, report: &IngestReport) -> String {
        self.render(report)
    }

    fn format_history(&self, log: &ConversationLog) -> String {
        self.render(log.turns())
    }

    fn format_session(&self, stats: &SessionStats) -> String {
        self.render(stats)
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        self.render(status)
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", serde_json::json!({"message": message}))
    }

    fn format_error(&self, error: &str) -> String {
        format!("{}\n", serde_json::json!({"error": error}))
    }
}

pub struct MarkdownFormatter;

impl MarkdownFormatter {
    fn write_hits(output: &mut String, results: &RetrievalResult) {
        for (i, hit) in results.iter().enumerate() {
            writeln!(
                output,
                "### {}. `{}` #{} (score {:.3})\n",
                i + 1,
                hit.chunk.document_id,
                hit.chunk.chunk_index,
                hit.score
            )
            .unwrap();
            writeln!(output, "```").unwrap();
            writeln!(output, "{}", hit.chunk.text).unwrap();
            writeln!(output, "```\n").unwrap();
        }
    }
}

impl Formatter for MarkdownFormatter {
    fn format_answer(&self, answer: &Answer, show_context: bool) -> String {
        let mut output = String::new();
        writeln!(output, "## {}\n", answer.question).unwrap();
        writeln!(output, "{}\n", answer.text.trim_end()).unwrap();

        if show_context {
            if answer.used_context() {
                writeln!(output, "## Context\n").unwrap();
                Self::write_hits(&mut output, &answer.retrieval);
            } else {
                writeln!(output, "*Answered without document context.*\n").unwrap();
            }
        }
        output
    }

    fn format_retrieval(&self, question: &str, results: &RetrievalResult) -> String {
        if results.is_empty() {
            return format!("## No matching chunks\n\nQuestion: `{}`\n", question);
        }

        let mut output = String::new();
        writeln!(output, "## Context\n").unwrap();
        writeln!(output, "**Question:** `{}`\n", question).unwrap();
        Self::write_hits(&mut output, results);
        output
    }

    fn format_chunks(&self, document: &str, chunks: &[Chunk]) -> String {
        let mut output = String::new();
        writeln!(output, "## Chunks of `{}`\n", document).unwrap();
        writeln!(output, "| # | Start | End | Preview |").unwrap();
        writeln!(output, "|---|-------|-----|---------|").unwrap();
        for chunk in chunks {
            let text = preview(&chunk.text, 60)
                .replace('\n', " ")
                .replace('|', "\\|");
            writeln!(
                output,
                "| {} | {} | {} | {} |",
                chunk.chunk_index, chunk.start_offset, chunk.end_offset, text
            )
            .unwrap();
        }
        output
    }

    fn format_ingest(&self, report: &IngestReport) -> String {
        if report.skipped {
            return format!("> `{}` already indexed, skipped\n", report.document);
        }
        let mut output = String::new();
        writeln!(output, "| Document | Chunks | Total | Duration |").unwrap();
        writeln!(output, "|----------|--------|-------|----------|").unwrap();
        writeln!(
            output,
            "| `{}` | {} | {} | {}ms |",
            report.document, report.chunks, report.total_chunks, report.duration_ms
        )
        .unwrap();
        output
    }

    fn format_history(&self, log: &ConversationLog) -> String {
        if log.is_empty() {
            return "*No messages yet.*\n".to_string();
        }

        let mut output = String::new();
        for turn in log.turns() {
            writeln!(output, "**{}:** {}\n", role_label(turn.role), turn.content.trim_end())
                .unwrap();
        }
        output
    }

    fn format_session(&self, stats: &SessionStats) -> String {
        let mut output = String::new();
        writeln!(output, "## Session\n").unwrap();
        for doc in &stats.documents {
            writeln!(output, "- `{}`: {} chunks", doc.id, doc.chunks).unwrap();
        }
        writeln!(output, "\n- **Chunks:** {}", stats.chunks).unwrap();
        writeln!(output, "- **Messages:** {}", stats.turns).unwrap();
        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "## Status\n").unwrap();

        for (label, backend) in [
            ("Embedding", &status.embedding),
            ("Generation", &status.generation),
        ] {
            let icon = if backend.state.is_ready() { "✅" } else { "❌" };
            writeln!(output, "### {} {}\n", label, icon).unwrap();
            writeln!(output, "- **Model:** {}", backend.model).unwrap();
            writeln!(output, "- **URL:** `{}`", backend.url).unwrap();
            match &backend.state {
                BackendState::Ready => {}
                BackendState::ModelMissing => {
                    writeln!(output, "- **Problem:** model not installed").unwrap();
                }
                BackendState::Unreachable(e) => {
                    writeln!(output, "- **Problem:** {}", e).unwrap();
                }
            }
            writeln!(output).unwrap();
        }

        if let Some(ref m) = status.metrics {
            writeln!(output, "### Usage\n").unwrap();
            writeln!(output, "- **Questions:** {}", m.total_questions).unwrap();
            writeln!(output, "- **Avg Latency:** {}ms", m.avg_latency_ms).unwrap();
            if m.error_rate > 0.0 {
                writeln!(output, "- **Error Rate:** {:.1}%", m.error_rate).unwrap();
            }
        }

        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("> {}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("> ⚠️ **Error:** {}\n", error)
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
        OutputFormat::Markdown => Box::new(MarkdownFormatter),
    }
}
