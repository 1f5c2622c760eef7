//! Interactive conversation over uploaded documents.

use anyhow::Result;
use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};

use super::setup::{build_session, ingest_paths, load_config, open_metrics, record_answer};
use crate::cli::BackendArgs;
use crate::cli::output::{Formatter, get_formatter};
use crate::models::{Config, OutputFormat};
use crate::services::MetricsStore;
use crate::session::Session;

#[derive(Debug, Args)]
pub struct ChatArgs {
    #[arg(
        long = "doc",
        short = 'd',
        help = "Document file or directory to upload before starting (repeatable)"
    )]
    pub documents: Vec<PathBuf>,

    #[arg(long, short = 'c', help = "Show the retrieved context with each answer")]
    pub show_context: bool,
}

/// One line of user input.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Question(&'a str),
    Upload(&'a str),
    History,
    Stats,
    Reset,
    Help,
    Quit,
    Unknown(&'a str),
}

fn parse_input(line: &str) -> Option<Input<'_>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Some(Input::Question(line));
    };

    let (name, rest) = command
        .split_once(char::is_whitespace)
        .map_or((command, ""), |(n, r)| (n, r.trim()));

    Some(match name {
        "upload" | "u" if !rest.is_empty() => Input::Upload(rest),
        "history" | "h" => Input::History,
        "stats" | "s" => Input::Stats,
        "reset" => Input::Reset,
        "help" | "?" => Input::Help,
        "quit" | "exit" | "q" => Input::Quit,
        _ => Input::Unknown(line),
    })
}

const HELP: &str = "\
Commands:
  /upload <path>  add a file or directory to the conversation
  /history        show the conversation so far
  /stats          show indexed documents
  /reset          forget all uploaded documents
  /quit           leave
Anything else is sent as a question.";

struct Chat {
    session: Session,
    config: Config,
    formatter: Box<dyn Formatter>,
    metrics: Option<MetricsStore>,
    show_context: bool,
    interactive: bool,
    verbose: bool,
}

impl Chat {
    async fn ask(&self, question: &str) {
        let spinner = self.interactive.then(|| {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} {msg}")
                    .unwrap(),
            );
            pb.set_message("Thinking...");
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        });

        let start = Instant::now();
        let result = self.session.ask(question).await;
        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }
        record_answer(
            self.metrics.as_ref(),
            &result,
            start.elapsed().as_millis() as u64,
        );

        match result {
            Ok(answer) => print!(
                "{}",
                self.formatter.format_answer(&answer, self.show_context)
            ),
            Err(e) => {
                eprint!("{}", self.formatter.format_error(&e.user_message()));
                self.session.acknowledge_error();
            }
        }
    }

    async fn upload(&self, path: &str) {
        let paths = [PathBuf::from(path)];
        match ingest_paths(
            &self.session,
            &paths,
            &self.config,
            self.formatter.as_ref(),
            self.verbose,
        )
        .await
        {
            Ok(reports) if reports.is_empty() => {
                eprint!("{}", self.formatter.format_error("no documents were indexed"));
            }
            Ok(reports) => {
                for report in &reports {
                    print!("{}", self.formatter.format_ingest(report));
                }
            }
            Err(e) => eprint!("{}", self.formatter.format_error(&format!("{e:#}"))),
        }
    }

    /// Handle one input. Returns `false` when the user wants to leave.
    async fn handle(&self, input: Input<'_>) -> bool {
        match input {
            Input::Question(q) => self.ask(q).await,
            Input::Upload(path) => self.upload(path).await,
            Input::History => {
                print!(
                    "{}",
                    self.formatter.format_history(&self.session.conversation().await)
                );
            }
            Input::Stats => print!("{}", self.formatter.format_session(&self.session.stats().await)),
            Input::Reset => {
                self.session.reset_index().await;
                print!("{}", self.formatter.format_message("All documents removed."));
            }
            Input::Help => println!("{HELP}"),
            Input::Quit => return false,
            Input::Unknown(cmd) => {
                eprint!(
                    "{}",
                    self.formatter
                        .format_error(&format!("unknown command: {cmd} (try /help)"))
                );
            }
        }
        true
    }
}

pub async fn handle_chat(
    args: ChatArgs,
    backend: &BackendArgs,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let config = load_config(backend)?;
    let formatter = get_formatter(format);
    let session = build_session(&config)?;

    ingest_paths(
        &session,
        &args.documents,
        &config,
        formatter.as_ref(),
        verbose,
    )
    .await?;

    let interactive = format == OutputFormat::Text && console::user_attended();
    let chat = Chat {
        metrics: open_metrics(&config),
        session,
        config,
        formatter,
        show_context: args.show_context,
        interactive,
        verbose,
    };

    if interactive {
        let stats = chat.session.stats().await;
        println!(
            "{} {} documents, {} chunks. Type {} for commands.",
            style("docqa").bold().cyan(),
            stats.documents.len(),
            stats.chunks,
            style("/help").yellow()
        );
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        if interactive {
            print!("{} ", style(">").green().bold());
            std::io::stdout().flush()?;
        }

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let Some(input) = parse_input(&line) else {
            continue;
        };
        if !chat.handle(input).await {
            break;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_a_question() {
        assert_eq!(
            parse_input("  what is this?  "),
            Some(Input::Question("what is this?"))
        );
        assert_eq!(parse_input("   "), None);
    }

    #[test]
    fn test_commands() {
        assert_eq!(parse_input("/quit"), Some(Input::Quit));
        assert_eq!(parse_input("/q"), Some(Input::Quit));
        assert_eq!(parse_input("/history"), Some(Input::History));
        assert_eq!(parse_input("/reset"), Some(Input::Reset));
        assert_eq!(
            parse_input("/upload docs/My Notes.md"),
            Some(Input::Upload("docs/My Notes.md"))
        );
    }

    #[test]
    fn test_upload_without_path_is_unknown() {
        assert_eq!(parse_input("/upload"), Some(Input::Unknown("/upload")));
        assert_eq!(parse_input("/frobnicate"), Some(Input::Unknown("/frobnicate")));
    }
}
