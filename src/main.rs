use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Notify;

use brew_oracle::config::Config;
use brew_oracle::errors::OracleError;
use brew_oracle::logging;
use brew_oracle::search::{SearchHit, SearchOrchestrator, SearchOutcome, SearchRequest};

/// Characters of content shown per evidence line
const SNIPPET_CHARS: usize = 240;

#[derive(Parser)]
#[command(name = "brew-oracle", version, about = "Fused retrieval over brewing books and recipes")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one query and print the ranked evidence
    Search {
        /// Question to search for
        query: String,
        /// Maximum number of results (defaults to retrieval.top_k)
        #[arg(long)]
        top_k: Option<usize>,
        /// Re-score results with the cross-encoder
        #[arg(long)]
        rerank: bool,
        /// Combine dense and sparse retrieval inside each backend
        #[arg(long)]
        hybrid: bool,
        /// Print the full outcome as JSON
        #[arg(long)]
        json: bool,
    },
    /// Read questions from stdin until "exit", "quit" or EOF
    Repl {
        #[arg(long)]
        rerank: bool,
        #[arg(long)]
        hybrid: bool,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Parse CLI args
    let cli = Cli::parse();

    // 2. Load configuration
    let mut config = Config::load().unwrap_or_else(|e| {
        eprintln!("Config error (using defaults): {}", e);
        Config::default()
    });

    // 3. Initialize logging before anything else writes output
    logging::init_logging(&config);

    match cli.command {
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }

        Commands::Search { query, top_k, rerank, hybrid, json } => {
            config.rerank.enabled |= rerank;
            config.retrieval.hybrid |= hybrid;
            let orchestrator = SearchOrchestrator::from_config(&config)?;

            let mut request = orchestrator.request(query);
            if let Some(top_k) = top_k {
                request.top_k = top_k;
            }

            let outcome = orchestrator
                .search_until(&request, async {
                    let _ = tokio::signal::ctrl_c().await;
                })
                .await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print!("{}", render(&outcome));
            }
        }

        Commands::Repl { rerank, hybrid } => {
            config.rerank.enabled |= rerank;
            config.retrieval.hybrid |= hybrid;
            let orchestrator = SearchOrchestrator::from_config(&config)?;
            let interrupted = forward_interrupts();
            repl(&orchestrator, BufReader::new(tokio::io::stdin()), &interrupted).await?;
        }
    }

    Ok(())
}

/// One Ctrl-C listener for the whole session. A press with nobody waiting
/// leaves a stored permit, so it is seen at the next prompt or search.
fn forward_interrupts() -> Arc<Notify> {
    let interrupted = Arc::new(Notify::new());
    let notify = interrupted.clone();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            notify.notify_one();
        }
    });
    interrupted
}

/// Read questions until "exit", "quit", EOF or an interrupt.
async fn repl<R>(orchestrator: &SearchOrchestrator, input: R, interrupted: &Notify) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut stdout = tokio::io::stdout();

    println!("Type a question (or 'exit' to quit):");
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let line = tokio::select! {
            _ = interrupted.notified() => None,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            println!();
            break;
        };
        let question = line.trim();
        if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
            break;
        }
        if question.is_empty() {
            continue;
        }

        let request: SearchRequest = orchestrator.request(question);
        let result = orchestrator.search_until(&request, interrupted.notified()).await;

        match result {
            Ok(outcome) => print!("{}", render(&outcome)),
            Err(OracleError::Cancelled) => {
                println!();
                break;
            }
            Err(e) => {
                tracing::error!(error = %e, "Search failed");
                println!("Search failed: {}", e);
            }
        }
    }
    println!("Bye!");
    Ok(())
}

/// Evidence listing: `N. score=S | source p.page: snippet`
fn render(outcome: &SearchOutcome) -> String {
    let mut out = String::new();
    if outcome.hits.is_empty() {
        out.push_str("No evidence found.\n");
    }
    for (idx, hit) in outcome.hits.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", idx + 1, evidence_line(hit)));
    }
    for failure in &outcome.unavailable {
        out.push_str(&format!("(backend '{}' unavailable: {})\n", failure.backend, failure.reason));
    }
    out
}

fn evidence_line(hit: &SearchHit) -> String {
    let score = hit
        .rerank_score
        .map(f64::from)
        .unwrap_or(hit.fusion_score);
    let source = hit.candidate.source().unwrap_or_else(|| "?".to_string());
    let page = hit
        .candidate
        .page()
        .map(|p| p.to_string())
        .unwrap_or_else(|| "?".to_string());
    let snippet: String = hit
        .candidate
        .content
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(SNIPPET_CHARS)
        .collect();
    format!("score={:.4} | {} p.{}: {}", score, source, page, snippet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use brew_oracle::backend::{BackendError, SearchIndex};
    use brew_oracle::search::{meta, Candidate};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingIndex(AtomicUsize);

    #[async_trait]
    impl SearchIndex for CountingIndex {
        fn tag(&self) -> &str {
            "documents"
        }

        async fn dense_search(&self, _query: &str, _limit: usize) -> Result<Vec<Candidate>, BackendError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(vec![Candidate::new("documents", "1", "Mash at 67C", 0.8)])
        }
    }

    fn orchestrator(index: Arc<CountingIndex>) -> SearchOrchestrator {
        SearchOrchestrator::builder().index(index).build().unwrap()
    }

    #[tokio::test]
    async fn test_repl_interrupt_at_prompt_ends_session() {
        let index = Arc::new(CountingIndex::default());
        let orchestrator = orchestrator(index.clone());
        let interrupted = Notify::new();
        // pressed while nothing was waiting on it
        interrupted.notify_one();

        let (_writer, reader) = tokio::io::duplex(64);
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            repl(&orchestrator, BufReader::new(reader), &interrupted),
        )
        .await;

        assert!(matches!(result, Ok(Ok(()))));
        assert_eq!(index.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_repl_interrupt_after_a_query_ends_session() {
        let index = Arc::new(CountingIndex::default());
        let orchestrator = orchestrator(index.clone());
        let interrupted = Notify::new();
        let (mut writer, reader) = tokio::io::duplex(64);

        let session = repl(&orchestrator, BufReader::new(reader), &interrupted);
        let user = async {
            writer.write_all(b"mash temperature\n").await.unwrap();
            while index.0.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            interrupted.notify_one();
        };

        let (result, ()) = tokio::time::timeout(Duration::from_secs(5), async { tokio::join!(session, user) })
            .await
            .unwrap();
        result.unwrap();
        assert_eq!(index.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_repl_stops_at_exit() {
        let index = Arc::new(CountingIndex::default());
        let orchestrator = orchestrator(index.clone());
        let input: &[u8] = b"\n  \nexit\nhop schedule\n";

        repl(&orchestrator, input, &Notify::new()).await.unwrap();
        assert_eq!(index.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_evidence_line_format() {
        let hit = SearchHit {
            candidate: Candidate::new("documents", "1", "Mash   at\n67C\tfor body", 0.4)
                .with_meta(meta::SOURCE, "basics.pdf")
                .with_meta(meta::PAGE, 9i64),
            fusion_score: 1.0 / 60.0,
            rerank_score: Some(0.91234),
        };
        assert_eq!(evidence_line(&hit), "score=0.9123 | basics.pdf p.9: Mash at 67C for body");
    }

    #[test]
    fn test_evidence_line_without_provenance() {
        let hit = SearchHit {
            candidate: Candidate::new("recipes", "r", "Citra Pale", 0.4),
            fusion_score: 0.5,
            rerank_score: None,
        };
        assert_eq!(evidence_line(&hit), "score=0.5000 | ? p.?: Citra Pale");
    }
}
