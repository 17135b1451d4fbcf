mod episode;

#[cfg(test)]
mod tests;

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cli::{Cli, Command, MigrateArgs};
use crate::config::{self, Config, SourceConfig};
use crate::db::{Database, StarredShowRecord, StarredStore};
use crate::migrate::{AggregateOptions, MigrationSession, MigrationState};
use crate::paths::database_file_path;
use crate::source::{ShowCover, SourceRegistry};

use self::episode::{
    describe_position, describe_progress, format_star_time, parse_confirmation, preview_labels,
    truncate,
};

const CANDIDATES_SHOWN: usize = 5;

pub async fn run(cli: Cli) -> Result<()> {
    let config = config::load(cli.config.as_deref())?;
    let sources = Arc::new(SourceRegistry::from_config(&config));
    debug!(sources = ?sources, "source registry ready");

    match cli.command {
        Command::Sources => run_sources(&config, &sources),
        Command::Search { source, query } => run_search(&sources, &source, &query.join(" ")).await,
        Command::Star {
            source,
            query,
            pick,
        } => {
            let db = open_db(&config)?;
            run_star(&db, &sources, &source, &query.join(" "), pick).await
        }
        Command::List => run_list(&open_db(&config)?),
        Command::Progress {
            row,
            line,
            episode,
        } => run_progress(&open_db(&config)?, &sources, row, &line, episode).await,
        Command::Unstar { row } => run_unstar(&open_db(&config)?, row),
        Command::Migrate(args) => {
            let db = Arc::new(open_db(&config)?);
            run_migrate(&config, sources, db, args).await
        }
    }
}

fn run_sources(config: &Config, sources: &SourceRegistry) -> Result<()> {
    println!("{:<4} {:<20} {:<10} {:<40}", "#", "SOURCE", "KIND", "DETAIL");
    for (idx, id) in config.priority().iter().enumerate() {
        let declared = config.sources.iter().find(|source| source.id() == id);
        let (kind, detail) = match declared {
            Some(SourceConfig::Allanime { mode, .. }) => ("allanime", format!("mode {mode}")),
            Some(SourceConfig::Catalog { base_url, .. }) => ("catalog", base_url.clone()),
            None => ("?", "not declared in config".to_string()),
        };
        let marker = if sources.get(id).is_some() { "" } else { " (inactive)" };
        println!(
            "{:<4} {:<20} {:<10} {}{}",
            idx + 1,
            truncate(id, 20),
            kind,
            truncate(&detail, 40),
            marker
        );
    }
    Ok(())
}

async fn first_page_covers(
    sources: &SourceRegistry,
    source_id: &str,
    query: &str,
) -> Result<Vec<ShowCover>> {
    let source = sources
        .get(source_id)
        .ok_or_else(|| anyhow!("unknown source '{source_id}' (see `anishift sources`)"))?;
    let page = source
        .search_page(source.first_page(query), query)
        .await
        .with_context(|| format!("search on {source_id} failed"))?;
    Ok(page.covers)
}

async fn run_search(sources: &SourceRegistry, source_id: &str, query: &str) -> Result<()> {
    let covers = first_page_covers(sources, source_id, query).await?;
    if covers.is_empty() {
        println!("No results for '{query}' on {source_id}.");
        return Ok(());
    }

    println!("{:<4} {:<24} {:<50}", "#", "ID", "TITLE");
    for (idx, cover) in covers.iter().enumerate() {
        println!(
            "{:<4} {:<24} {:<50}",
            idx + 1,
            truncate(&cover.id, 24),
            truncate(&cover.title, 50)
        );
    }
    Ok(())
}

async fn run_star(
    db: &Database,
    sources: &SourceRegistry,
    source_id: &str,
    query: &str,
    pick: usize,
) -> Result<()> {
    let covers = first_page_covers(sources, source_id, query).await?;
    let Some(cover) = pick.checked_sub(1).and_then(|idx| covers.get(idx)) else {
        bail!(
            "no result #{pick} for '{query}' on {source_id} ({} found)",
            covers.len()
        );
    };

    let summary = cover.summary();
    if let Some(existing) = db.get_starred(&summary)? {
        println!("Already starred: {} ({})", existing.title, existing.source_id);
        return Ok(());
    }
    db.upsert_starred(&StarredShowRecord::starred_now(cover))?;
    println!("Starred: {} ({})", cover.title, summary);
    Ok(())
}

fn run_list(db: &Database) -> Result<()> {
    let items = db.list_starred()?;
    if items.is_empty() {
        println!("No starred shows yet. Run `anishift star <SOURCE> <QUERY>` first.");
        return Ok(());
    }

    println!(
        "{:<4} {:<16} {:<36} {:<24} {:<24}",
        "#", "SOURCE", "TITLE", "PROGRESS", "STARRED"
    );
    for (idx, item) in items.iter().enumerate() {
        println!(
            "{:<4} {:<16} {:<36} {:<24} {:<24}",
            idx + 1,
            truncate(&item.source_id, 16),
            truncate(&item.title, 36),
            truncate(&describe_progress(item), 24),
            format_star_time(item.star_time)
        );
    }
    Ok(())
}

async fn run_progress(
    db: &Database,
    sources: &SourceRegistry,
    row: usize,
    line_name: &str,
    order: i64,
) -> Result<()> {
    let mut record = starred_at(db, row)?;
    let source = sources
        .get(&record.source_id)
        .ok_or_else(|| anyhow!("source '{}' is not configured", record.source_id))?;
    let lines = source
        .play_lines(&record.summary())
        .await
        .with_context(|| format!("failed to load play lines for {}", record.title))?;

    let Some(line) = lines.into_iter().find(|line| line.name == line_name) else {
        bail!("{} has no play line named '{line_name}'", record.title);
    };
    let Some(episode) = line.episodes.iter().find(|ep| ep.order == order).cloned() else {
        bail!("play line '{line_name}' has no episode with order {order}");
    };

    record.watch_process = line.progress_label(&episode);
    record.last_episode = Some(episode);
    record.last_play_line = Some(line);
    db.upsert_starred(&record)?;
    println!("Updated progress: {} -> {}", record.title, describe_progress(&record));
    Ok(())
}

fn run_unstar(db: &Database, row: usize) -> Result<()> {
    let record = starred_at(db, row)?;
    if db.delete_starred(&record.summary())? {
        println!("Unstarred: {} ({})", record.title, record.source_id);
    }
    Ok(())
}

async fn run_migrate(
    config: &Config,
    sources: Arc<SourceRegistry>,
    db: Arc<Database>,
    args: MigrateArgs,
) -> Result<()> {
    let record = starred_at(db.as_ref(), args.row)?;
    let priority = migration_priority(config, &record, &args.to);
    if priority.is_empty() {
        bail!("no other source to migrate {} to", record.title);
    }
    let options = AggregateOptions {
        min_results: args.min_results.unwrap_or(config.min_results),
        max_pages: config.max_pages,
    };

    println!("Migrating: {} ({})", record.title, record.source_id);
    println!("  From:       {}", describe_progress(&record));
    println!("  Searching:  {}", priority.join(", "));

    let store: Arc<dyn StarredStore> = db;
    let session = MigrationSession::new(record, sources, store)
        .with_priority(priority)
        .with_options(options);

    let Some(pass) = session.start_migration() else {
        println!("No watch progress recorded. Run `anishift progress` first.");
        return Ok(());
    };
    let mut state = settle(&session, pass).await?;
    print_candidates(&state);

    if let Some(pick) = args.pick {
        let Some(candidate) = pick.checked_sub(1).and_then(|idx| state.candidates.get(idx)) else {
            bail!("no candidate #{pick} ({} found)", state.candidates.len());
        };
        if state.chosen_cover.as_ref() != Some(&candidate.cover) {
            let pass = session.choose_target_show(candidate.cover.clone());
            state = settle(&session, pass).await?;
        }
    }

    let Some(cover) = state.chosen_cover.clone() else {
        if let Some(err) = &state.last_error {
            println!("{err}");
        }
        return Ok(());
    };
    if let Some(err) = &state.last_error {
        warn!("{err}");
        println!("Progress cannot be carried over: {err}");
    }

    if let Some(line_name) = &args.line {
        let Some(line) = state
            .play_lines
            .iter()
            .find(|line| &line.name == line_name)
            .cloned()
        else {
            let names = state
                .play_lines
                .iter()
                .map(|line| line.name.as_str())
                .collect::<Vec<_>>();
            bail!("no play line '{line_name}' (available: {})", names.join(", "));
        };
        let episode = match args.episode {
            Some(order) => {
                let Some(episode) = line.episodes.iter().find(|ep| ep.order == order).cloned()
                else {
                    bail!("play line '{line_name}' has no episode with order {order}");
                };
                Some(episode)
            }
            None => None,
        };
        session.choose_episode(&session.record().sort_key, line, episode);
        state = session.state();
    }

    let old = session.record();
    println!("  Target:     {} ({})", cover.title, cover.summary());
    for line in &state.play_lines {
        println!(
            "    {:<12} {}",
            truncate(&line.name, 12),
            preview_labels(line, &state.sort_key, old.reversal)
        );
    }
    println!(
        "  Resume at:  {}",
        describe_position(state.chosen_play_line.as_ref(), state.chosen_episode.as_ref())
    );

    if !args.yes && !ask("Save migration? [y/N] ")? {
        println!("Migration discarded.");
        return Ok(());
    }
    let migrated = session.confirm_migration()?;
    println!(
        "Migrated: {} -> {} ({})",
        old.title,
        migrated.title,
        describe_progress(&migrated)
    );
    Ok(())
}

// Explicit --to sources win; otherwise every configured source except the
// show's own, in configured priority.
fn migration_priority(config: &Config, record: &StarredShowRecord, to: &[String]) -> Vec<String> {
    if !to.is_empty() {
        return to.to_vec();
    }
    config
        .priority()
        .into_iter()
        .filter(|id| *id != record.source_id)
        .collect()
}

async fn settle(session: &MigrationSession, pass: JoinHandle<()>) -> Result<MigrationState> {
    let mut updates = session.subscribe();
    updates
        .wait_for(MigrationState::is_settled)
        .await
        .context("migration session closed")?;
    pass.await.context("migration task failed")?;
    Ok(session.state())
}

fn print_candidates(state: &MigrationState) {
    if state.candidates.is_empty() {
        return;
    }
    println!("  Candidates:");
    for (idx, candidate) in state.candidates.iter().take(CANDIDATES_SHOWN).enumerate() {
        println!(
            "    {:<3} {:<16} {:<40} distance {}",
            idx + 1,
            truncate(&candidate.cover.source_id, 16),
            truncate(&candidate.cover.title, 40),
            candidate.edit_distance
        );
    }
    if state.candidates.len() > CANDIDATES_SHOWN {
        println!("    ... {} more", state.candidates.len() - CANDIDATES_SHOWN);
    }
}

fn ask(prompt: &str) -> Result<bool> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("failed to read answer")?;
    Ok(parse_confirmation(&answer))
}

fn starred_at(db: &Database, row: usize) -> Result<StarredShowRecord> {
    let items = db.list_starred()?;
    let count = items.len();
    row.checked_sub(1)
        .and_then(|idx| items.into_iter().nth(idx))
        .ok_or_else(|| anyhow!("no starred show #{row} ({count} starred, see `anishift list`)"))
}

fn open_db(config: &Config) -> Result<Database> {
    let db_path = match &config.database_path {
        Some(path) => path.clone(),
        None => database_file_path()?,
    };
    let db = Database::open(&db_path)?;
    db.migrate()?;
    Ok(db)
}
