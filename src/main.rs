use std::{process, sync::Arc};

use stoa::{
    application::{
        error::AppError,
        pagination::PageQuery,
        repos::{
            CreateQuestionParams, CreateUserParams, QuestionsRepo, UpdateQuestionParams, UsersRepo,
        },
    },
    cache::{
        CacheConfig, CachedRepositories,
        families::{FAMILIES, validate_entry},
        keys,
    },
    config::{self, Command, FlushArgs, InspectArgs, PurgeArgs},
    domain::types::SortOrder,
    infra::{ConfiguredStore, memory::MemoryRepositories, telemetry},
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(error.exit_code());
    }
}

fn report_application_error(error: &AppError) {
    let messages = error.messages();
    if dispatcher::has_been_set() {
        error!(error = %error, chain = ?messages, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, chain = ?messages, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    telemetry::init(&settings.logging)?;

    let store = ConfiguredStore::connect(&settings.cache).await?;
    info!(
        backend = store.backend(),
        enabled = settings.cache.enabled,
        "Cache store ready"
    );

    match cli_args.command {
        Command::Ping => run_ping(&store).await,
        Command::Inspect(args) => run_inspect(&store, args).await,
        Command::Flush(args) => run_flush(&store, args).await,
        Command::Purge(args) => run_purge(&store, args).await,
        Command::Demo => run_demo(&store, CacheConfig::from(&settings.cache)).await,
    }
}

async fn run_ping(store: &ConfiguredStore) -> Result<(), AppError> {
    store.ping().await?;
    println!("{}: ok", store.backend());
    Ok(())
}

async fn run_inspect(store: &ConfiguredStore, args: InspectArgs) -> Result<(), AppError> {
    let Some(raw) = store.as_store().get(&args.key).await? else {
        println!("{}: (absent)", args.key);
        return Ok(());
    };

    println!("{raw}");
    match validate_entry(&args.key, &raw) {
        Ok((kind, key_kind)) => println!("valid {kind} {} entry", key_kind.as_str()),
        Err(err) => {
            warn!(key = %args.key, error = %err, "Cached value does not decode");
            println!("invalid entry: {err}");
        }
    }
    Ok(())
}

async fn run_flush(store: &ConfiguredStore, args: FlushArgs) -> Result<(), AppError> {
    if !FAMILIES.contains(&args.family.as_str()) {
        return Err(AppError::validation(format!(
            "unknown family `{}`; expected one of {}",
            args.family,
            FAMILIES.join(", ")
        )));
    }

    let pattern = keys::namespace_pattern(&args.family);
    let removed = store.as_store().delete_by_pattern(&pattern).await?;
    info!(family = %args.family, removed, "Flushed cache family");
    println!("removed {removed} keys");
    Ok(())
}

async fn run_purge(store: &ConfiguredStore, args: PurgeArgs) -> Result<(), AppError> {
    let removed = store.as_store().delete_by_pattern(&args.pattern).await?;
    info!(pattern = %args.pattern, removed, "Purged cache keys");
    println!("removed {removed} keys");
    Ok(())
}

/// Create a question, list it, rename it, and show that title lookups follow.
async fn run_demo(store: &ConfiguredStore, cache: CacheConfig) -> Result<(), AppError> {
    let source = Arc::new(MemoryRepositories::new());
    let repos = CachedRepositories::new(source.clone(), store.as_store(), cache);

    let author = repos
        .users
        .create_user(CreateUserParams {
            username: "demo".to_string(),
            email: "demo@example.com".to_string(),
            display_name: "Demo".to_string(),
        })
        .await?;

    let question = repos
        .questions
        .create_question(CreateQuestionParams {
            author_id: author.id,
            title: "Intro to X".to_string(),
            body: "What is X?".to_string(),
        })
        .await?;
    info!(id = %question.id, slug = %question.slug, "Created question");

    let page = PageQuery::new(1, 10, SortOrder::Desc);
    let listed = repos.questions.list_questions(page).await?;
    info!(total = listed.total_items, "Listed questions page 1");

    let renamed = repos
        .questions
        .update_question(UpdateQuestionParams {
            id: question.id,
            title: Some("Intro to Y".to_string()),
            body: None,
        })
        .await?;
    info!(slug = %renamed.slug, "Renamed question");

    if repos.questions.find_by_title("Intro to X").await?.is_some() {
        return Err(AppError::unexpected("old title still resolves after rename"));
    }
    let found = repos
        .questions
        .find_by_title("Intro to Y")
        .await?
        .ok_or_else(|| AppError::unexpected("new title does not resolve after rename"))?;
    if found.id != question.id {
        return Err(AppError::unexpected("new title resolves to another question"));
    }

    let relisted = repos.questions.list_questions(page).await?;
    let titles: Vec<&str> = relisted.items.iter().map(|q| q.title.as_str()).collect();
    info!(?titles, reads = source.read_count(), "Demo finished");
    println!("ok: `{}` now resolves by its new title", renamed.slug);
    Ok(())
}
