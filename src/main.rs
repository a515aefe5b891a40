use std::num::NonZeroUsize;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use clap::Parser;

mod build;
mod cli;
mod config;
mod ingest;
mod semantic;
#[cfg(test)]
mod tests;
mod web;

use cli::Command;
use config::Config;
use semantic::{
    ArtifactLoader, Embedder, EmbeddingModel, IndexRegistry, PageRequest, QueryPipeline,
};

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_embedder(config: &Config) -> anyhow::Result<Arc<EmbeddingModel>> {
    let model = EmbeddingModel::new(&config.embedding.model, config.models_cache_dir())
        .with_context(|| format!("failed to load model '{}'", config.embedding.model))?;

    Ok(Arc::new(model))
}

/// Wire the registry and the query pipeline over the built artifacts.
fn compose(config: &Config, embedder: Arc<dyn Embedder>) -> QueryPipeline {
    let loader = ArtifactLoader::new(
        config.index_dir(),
        config.records_paths(),
        embedder.model_name(),
        embedder.dimensions(),
    );
    let registry = IndexRegistry::new(Arc::new(loader), config.corpora.keys().cloned());

    QueryPipeline::new(Arc::new(registry), embedder)
}

fn default_per_page(config: &Config) -> anyhow::Result<NonZeroUsize> {
    NonZeroUsize::new(config.default_per_page)
        .ok_or_else(|| anyhow!("default_per_page must be greater than 0"))
}

fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();

    init_logging();

    match args.command {
        Command::Preprocess { input, output } => {
            let output =
                output.unwrap_or_else(|| ingest::default_output_path(&args.base_path, &input));

            let report = ingest::preprocess_file(&input, &output)?;
            println!(
                "{} of {} critiques written to {}",
                report.kept,
                report.read,
                output.display()
            );

            Ok(())
        }

        Command::Build {
            corpus,
            clean_csv,
            batch_size,
        } => {
            let config = Config::load_with(&args.base_path)?;

            let (corpus, records) = match (corpus, clean_csv) {
                (_, Some(path)) => {
                    let name = build::corpus_name_from_path(&path).ok_or_else(|| {
                        anyhow!("cannot derive a corpus name from {}", path.display())
                    })?;
                    (name, path)
                }
                (Some(name), None) => {
                    let records = config
                        .records_paths()
                        .remove(&name)
                        .ok_or_else(|| anyhow!("corpus '{name}' is not configured"))?;
                    (name, records)
                }
                (None, None) => bail!("either --corpus or --clean-csv is required"),
            };

            let embedder = load_embedder(&config)?;
            let report = build::build_index(
                embedder.as_ref(),
                &build::BuildOptions {
                    corpus: corpus.clone(),
                    records,
                    index_dir: config.index_dir(),
                    batch_size,
                    show_progress: true,
                },
            )?;

            println!(
                "Built corpus '{}': {} critiques x {} dimensions in {}",
                corpus,
                report.rows,
                report.dimensions,
                report.artifacts.vectors.display()
            );

            Ok(())
        }

        Command::Query {
            corpus,
            text,
            page,
            per_page,
            limit,
        } => {
            let config = Config::load_with(&args.base_path)?;

            let per_page = match per_page {
                Some(per_page) => per_page,
                None => default_per_page(&config)?,
            };
            let corpus = corpus.unwrap_or_else(|| config.default_corpus.clone());
            let request = PageRequest::new(corpus, text, per_page)
                .with_page(page)
                .with_limit(limit);

            let pipeline = compose(&config, load_embedder(&config)?);
            let result = pipeline.query(&request)?;

            println!("{}", serde_json::to_string_pretty(&result)?);

            Ok(())
        }

        Command::Serve { listen } => {
            let config = Config::load_with(&args.base_path)?;
            let listen = listen.unwrap_or_else(|| config.server.listen.clone());

            let pipeline = Arc::new(compose(&config, load_embedder(&config)?));

            if config.server.preload {
                for err in pipeline.registry().preload_all() {
                    log::warn!("{err}");
                }
            }

            web::start_daemon(web::SharedState::new(pipeline, Arc::new(config)), &listen)
        }
    }
}
