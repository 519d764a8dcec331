use anyhow::Context;
use clap::{Parser, Subcommand};
use fournil::agents::{FinancialsAgent, RecipeAgent, SafetyAgent};
use fournil::llm::ChatClient;
use fournil::metrics::AssistantMetrics;
use fournil::pipeline::{Assistant, Pipeline};
use fournil::retrieval::{RetrievalService, load_documents};
use fournil::tools::{TavilyClient, ToolRegistry};
use fournil::{api, config, logging};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(name = "fournil", version, about = "Document-grounded bakery assistant")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Answer questions interactively on stdin.
    Repl,
    /// Serve the HTTP prediction API.
    Serve,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    config::init_config();
    logging::init_tracing();

    let result = match cli.command.unwrap_or(Command::Repl) {
        Command::Repl => run_repl().await,
        Command::Serve => run_server().await,
    };
    if let Err(error) = result {
        eprintln!("Error running bakery assistant: {error:#}");
        std::process::exit(1);
    }
}

/// Build the full assistant: reset the index, ingest the document corpus, and wire
/// the three pipeline stages.
async fn bootstrap() -> anyhow::Result<Assistant> {
    let config = config::get_config();
    let metrics = Arc::new(AssistantMetrics::new());

    let retrieval = Arc::new(
        RetrievalService::new(metrics.clone()).context("Failed to build retrieval service")?,
    );
    retrieval
        .reset_index()
        .await
        .context("Failed to reset the vector index")?;

    let documents = load_documents(Path::new(&config.documents_dir));
    if documents.is_empty() {
        tracing::warn!(
            dir = %config.documents_dir,
            "No documents found; every question will fall back to the not-found reply"
        );
    }
    let summary = retrieval.ingest_documents(&documents).await;
    tracing::info!(
        documents = summary.documents,
        chunks = summary.chunks,
        failures = summary.failures,
        "Document ingestion complete"
    );

    let chat = Arc::new(ChatClient::new().context("Failed to build chat client")?);
    let tavily = match &config.tavily_api_key {
        Some(key) => Some(
            TavilyClient::new(config.tavily_base_url.clone(), key.clone())
                .context("Failed to build Tavily client")?,
        ),
        None => {
            tracing::warn!("TAVILY_API_KEY not set; price lookups fall back to model knowledge");
            None
        }
    };
    let tools = Arc::new(ToolRegistry::new(tavily).context("Tool catalog verification failed")?);

    let pipeline = Pipeline::new(
        RecipeAgent::new(retrieval, chat.clone()),
        FinancialsAgent::new(chat.clone(), tools),
        SafetyAgent::new(chat),
    );
    Ok(Assistant::new(pipeline, metrics))
}

async fn run_repl() -> anyhow::Result<()> {
    let assistant = bootstrap().await?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    println!("Fournil bakery assistant. Ask a question, or 'quit' to exit.");
    loop {
        stdout.write_all(b"\n> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.eq_ignore_ascii_case("quit") {
            break;
        }
        if question.is_empty() {
            continue;
        }

        match assistant
            .answer_streamed(question, |stage| println!("[{stage}] done"))
            .await
        {
            Ok(report) => println!("\n{}", report.render_text()),
            Err(error) => eprintln!("Error running bakery assistant: {error}"),
        }
    }
    Ok(())
}

async fn run_server() -> anyhow::Result<()> {
    let assistant = Arc::new(bootstrap().await?);
    let app = api::create_router(assistant);

    let (listener, port) = bind_listener()
        .await
        .context("Failed to bind listener")?;
    tracing::info!("Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app)
        .await
        .context("HTTP server terminated")?;
    Ok(())
}

async fn bind_listener() -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    let config = config::get_config();
    if let Some(port) = config.server_port {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map(|listener| (listener, port));
    }

    const PORT_RANGE: std::ops::RangeInclusive<u16> = 7860..=7869;
    for port in PORT_RANGE {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "No available port found in range 7860-7869",
    ))
}
