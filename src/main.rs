use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use homedir::my_home;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::Instrument;
use tracing_subscriber::EnvFilter;

use mindsift::config::{Config, SimilarityThresholds};
#[cfg(feature = "fastembed")]
use mindsift::embeddings::FastEmbedProvider;
use mindsift::embeddings::{backfill_embeddings, EmbeddingProvider, SyntheticProvider};
use mindsift::layout::{Canvas, Edge, LayoutDriver, LayoutEngine, PositionMap, TickUpdate};
use mindsift::notes::{Category, Note, NoteId};
use mindsift::search::HybridRanker;
use mindsift::store::{JsonNoteStore, NoteStore};

mod cli;

/// Provider picked at startup.
enum Provider {
    Synthetic(SyntheticProvider),
    #[cfg(feature = "fastembed")]
    Model(FastEmbedProvider),
}

impl EmbeddingProvider for Provider {
    fn dimensions(&self) -> usize {
        match self {
            Provider::Synthetic(provider) => provider.dimensions(),
            #[cfg(feature = "fastembed")]
            Provider::Model(provider) => provider.dimensions(),
        }
    }

    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        match self {
            Provider::Synthetic(provider) => provider.embed(text).await,
            #[cfg(feature = "fastembed")]
            Provider::Model(provider) => provider.embed(text).await,
        }
    }
}

impl Provider {
    fn is_synthetic(&self) -> bool {
        matches!(self, Provider::Synthetic(_))
    }

    /// Similarity thresholds matching the kind of embeddings produced.
    fn thresholds(&self, config: &Config) -> SimilarityThresholds {
        if self.is_synthetic() {
            SimilarityThresholds::synthetic()
        } else {
            config.thresholds
        }
    }
}

fn create_provider(config: &Config, args: &cli::ProviderArgs) -> anyhow::Result<Provider> {
    let synthetic = Provider::Synthetic(SyntheticProvider::new(config.embedding.dimensions));
    if args.synthetic {
        return Ok(synthetic);
    }

    #[cfg(feature = "fastembed")]
    {
        let provider = FastEmbedProvider::load(&config.embedding, config.base_path().to_path_buf())
            .context("Failed to load embedding model")?;
        log::info!("Using embedding model '{}'", provider.name());
        Ok(Provider::Model(provider))
    }

    #[cfg(not(feature = "fastembed"))]
    {
        log::warn!("Built without the fastembed feature, using synthetic embeddings");
        Ok(synthetic)
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("mindsift={level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn base_path(arg: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    if let Some(path) = arg {
        return Ok(path);
    }
    if let Ok(path) = std::env::var("MINDSIFT_BASE_PATH") {
        return Ok(PathBuf::from(path));
    }
    match my_home() {
        Ok(Some(home)) => Ok(home.join(".local/share/mindsift")),
        _ => bail!("Could not determine home directory, pass --base-path"),
    }
}

fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")
}

#[derive(Serialize)]
struct SearchHit<'a> {
    id: &'a NoteId,
    title: Option<&'a str>,
    category: Category,
    score: f32,
}

fn search(
    config: &Config,
    notes: &[Note],
    query: &str,
    category: Option<Category>,
    provider: Provider,
) -> anyhow::Result<()> {
    let thresholds = provider.thresholds(config);
    let ranker = HybridRanker::new(&provider, &thresholds);

    let results = runtime()?.block_on(
        ranker
            .search_scored(query, notes, category)
            .instrument(tracing::info_span!("search", notes = notes.len())),
    );

    let hits: Vec<SearchHit> = results
        .iter()
        .map(|scored| SearchHit {
            id: &scored.note.id,
            title: scored.note.title.as_deref(),
            category: scored.note.category,
            score: scored.score,
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&hits)?);
    Ok(())
}

#[derive(Serialize)]
struct LayoutReport {
    generation: u64,
    ticks: usize,
    completed: bool,
    positions: PositionMap,
    edges: Vec<Edge>,
}

fn layout(
    config: &Config,
    notes: &[Note],
    canvas: Canvas,
    stream: bool,
    seed: Option<u64>,
    thresholds: SimilarityThresholds,
) -> anyhow::Result<()> {
    let layout_config = config.layout.clone();
    let engine = match seed {
        Some(seed) => LayoutEngine::with_seed(layout_config, thresholds, seed),
        None => LayoutEngine::new(layout_config, thresholds),
    };

    let report = runtime()?.block_on(
        async {
            let driver = LayoutDriver::new(engine);

            let handle = driver.handle();
            ctrlc::set_handler(move || {
                log::info!("Received interrupt, stopping layout");
                handle.cancel();
            })
            .context("Failed to set Ctrl+C handler")?;

            // unbounded so a slow stdout never drops a tick
            let mut updates = stream.then(|| driver.stream());
            let (generation, mut task) = driver.start(notes, canvas);
            let print = |update: TickUpdate| -> anyhow::Result<()> {
                if update.generation == generation {
                    println!("{}", serde_json::to_string(&update)?);
                }
                Ok(())
            };

            let outcome = loop {
                tokio::select! {
                    outcome = &mut task => break outcome.context("Layout task failed")?,
                    Some(update) = async {
                        match updates.as_mut() {
                            Some(updates) => updates.recv().await,
                            None => None,
                        }
                    }, if stream => print(update)?,
                }
            };

            // ticks published just before the task returned
            if let Some(updates) = updates.as_mut() {
                while let Ok(update) = updates.try_recv() {
                    print(update)?;
                }
            }

            let engine = driver.engine();
            let engine = engine
                .lock()
                .map_err(|_| anyhow::anyhow!("layout engine lock poisoned"))?;

            anyhow::Ok(LayoutReport {
                generation,
                ticks: outcome.ticks,
                completed: outcome.completed,
                positions: engine.positions(),
                edges: engine.edges(),
            })
        }
        .instrument(tracing::info_span!("layout", notes = notes.len())),
    )?;

    if !report.completed {
        log::warn!("Layout stopped early after {} ticks", report.ticks);
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn embed(
    config: &Config,
    store: &JsonNoteStore,
    mut notes: Vec<Note>,
    provider: Provider,
) -> anyhow::Result<()> {
    let progress = ProgressBar::new(notes.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
            .context("Invalid progress bar template")?,
    );

    let report = runtime()?.block_on(
        backfill_embeddings(
            &provider,
            &mut notes,
            config.embedding.max_content_length,
            |note| {
                progress.set_message(note.id.to_string());
                progress.inc(1);
            },
        )
        .instrument(tracing::info_span!("embed")),
    );
    progress.finish_and_clear();

    if report.embedded > 0 {
        store
            .save_all(&notes)
            .with_context(|| format!("Failed to save {}", store.path().display()))?;
    }

    println!(
        "{} embedded, {} up to date, {} without text, {} failed",
        report.embedded, report.up_to_date, report.without_text, report.failed
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();
    init_logging(args.verbose);

    let base_path = base_path(args.base_path)?;
    let config = Config::load_with(&base_path)
        .with_context(|| format!("Failed to load config from {}", base_path.display()))?;
    let store = JsonNoteStore::new(&base_path)?;
    let notes = store
        .list()
        .with_context(|| format!("Failed to read {}", store.path().display()))?;

    log::debug!("Loaded {} notes from {}", notes.len(), store.path().display());

    match args.command {
        cli::Command::Search {
            query,
            category,
            provider,
        } => {
            let provider = create_provider(&config, &provider)?;
            search(&config, &notes, &query, category, provider)
        }

        cli::Command::Layout {
            width,
            height,
            ticks,
            stream,
            seed,
            provider,
        } => {
            let mut config = config;
            if let Some(ticks) = ticks {
                config.layout.tick_count = ticks;
            }
            // layout only reads stored embeddings, no model needed
            let thresholds = if provider.synthetic {
                SimilarityThresholds::synthetic()
            } else {
                config.thresholds
            };
            layout(
                &config,
                &notes,
                Canvas::new(width, height),
                stream,
                seed,
                thresholds,
            )
        }

        cli::Command::Embed { provider } => {
            let provider = create_provider(&config, &provider)?;
            embed(&config, &store, notes, provider)
        }
    }
}
