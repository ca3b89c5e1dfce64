use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use pdq_service::{PdqService, QaEvent, QaRequest, SearchFilters, SearchRequest};
use pdq_storage::{db::Db, search::SearchStore};

#[derive(Debug, Parser)]
#[command(
	version = pdq_cli::VERSION,
	rename_all = "kebab",
	styles = pdq_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	#[command(subcommand)]
	pub cmd: Cmd,
}

#[derive(Debug, Subcommand)]
pub enum Cmd {
	/// Answer a question from the project documents, with citations.
	Ask {
		question: String,
		#[arg(long)]
		project: String,
		#[arg(long)]
		doc: Option<String>,
		#[arg(long)]
		doc_type: Option<String>,
		#[arg(long)]
		discipline: Option<String>,
		/// Emit incremental status and answer events instead of one result.
		#[arg(long)]
		stream: bool,
	},
	/// Hybrid chunk search without answer generation.
	Search {
		query: String,
		#[arg(long)]
		project: String,
		#[arg(long)]
		doc: Option<String>,
		#[arg(long)]
		doc_type: Option<String>,
		#[arg(long)]
		discipline: Option<String>,
		#[arg(long)]
		size: Option<u32>,
	},
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = pdq_config::load(&args.config)?;

	init_tracing(&config);

	let search = SearchStore::new(&config.storage.search)?;
	let db = Db::connect(&config.storage.postgres).await?;
	let service = PdqService::new(config, search, db);

	match args.cmd {
		Cmd::Ask { question, project, doc, doc_type, discipline, stream } => {
			let req = QaRequest {
				question,
				filters: filters(project, doc, doc_type, discipline),
				size: None,
			};

			if stream {
				let (tx, mut rx) = mpsc::channel(16);
				let streaming = service.answer_stream(&req, tx);
				let printing = async {
					while let Some(event) = rx.recv().await {
						print_event(&event);
					}
				};

				tokio::join!(streaming, printing);
			} else {
				let result = service.answer(&req).await?;

				println!("{}", serde_json::to_string_pretty(&result)?);
			}
		},
		Cmd::Search { query, project, doc, doc_type, discipline, size } => {
			let req = SearchRequest {
				query,
				filters: filters(project, doc, doc_type, discipline),
				size,
			};
			let hits = service.search_chunks(req).await?;

			println!("{}", serde_json::to_string_pretty(&hits)?);
		},
	}

	Ok(())
}

fn filters(
	project: String,
	doc: Option<String>,
	doc_type: Option<String>,
	discipline: Option<String>,
) -> SearchFilters {
	SearchFilters {
		project_id: project,
		doc_id: doc.map(pdq_service::FilterValue::One),
		doc_type: doc_type.map(pdq_service::FilterValue::One),
		discipline: discipline.map(pdq_service::FilterValue::One),
	}
}

fn print_event(event: &QaEvent) {
	match event {
		QaEvent::Status { message } => eprintln!("* {message}"),
		QaEvent::Chunk { content } => print!("{content}"),
		QaEvent::Done { answer, citations, suggestions } => {
			println!();
			println!(
				"{}",
				serde_json::json!({
					"answer": answer,
					"citations": citations,
					"suggestions": suggestions,
				})
			);
		},
		QaEvent::Error { message } => eprintln!("error: {message}"),
	}
}

fn init_tracing(config: &pdq_config::Config) {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();
}
