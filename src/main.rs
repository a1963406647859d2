use std::{process, sync::Arc, time::Duration};

use the_archive::{
    application::{
        content::ContentRepository,
        error::AppError,
        import::import_directory,
        notify::{ChangeNotifier, RELOAD_MESSAGE},
        render::ComrakRenderService,
        repos::PostStore,
    },
    cache::RenderCache,
    config::{self, ContentBackend},
    domain::posts::UserId,
    infra::{
        cache_warmer::CacheWarmer,
        db::PostgresPostStore,
        fs::FsPostStore,
        http::{self, HttpState},
        memory::MemoryPostStore,
        telemetry,
    },
};
use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Import(args) => run_import(settings, args).await,
    }
}

async fn open_store(settings: &config::Settings) -> Result<Arc<dyn PostStore>, AppError> {
    let store: Arc<dyn PostStore> = match settings.content.backend {
        ContentBackend::Postgres => {
            let url = settings
                .database
                .url
                .as_deref()
                .ok_or_else(|| AppError::validation("database url is required"))?;
            let pool =
                PostgresPostStore::connect(url, settings.database.max_connections.get()).await?;
            PostgresPostStore::run_migrations(&pool).await?;
            Arc::new(PostgresPostStore::new(pool))
        }
        ContentBackend::Filesystem => {
            Arc::new(FsPostStore::open(&settings.content.directory).await?)
        }
        ContentBackend::Memory => Arc::new(MemoryPostStore::new()),
    };

    info!(
        target = "the_archive::bootstrap",
        backend = %settings.content.backend,
        "content store ready"
    );
    Ok(store)
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let store = open_store(&settings).await?;
    let content = Arc::new(ContentRepository::new(
        store,
        settings.content.refresh_interval,
    ));
    let notifier = Arc::new(ChangeNotifier::new(
        settings.live.channel_capacity.get() as usize,
    ));
    let renders = Arc::new(RenderCache::new(Arc::new(ComrakRenderService::new())));

    {
        let notifier = Arc::clone(&notifier);
        content.set_change_callback(move |post_id| {
            notifier.notify(&post_id, RELOAD_MESSAGE);
        });
    }

    let refresh_loop = content.start().await?;

    if settings.render.warm_on_start {
        let warmer = CacheWarmer::new(Arc::clone(&content), Arc::clone(&renders));
        let theme = settings.render.default_theme.clone();
        tokio::spawn(async move {
            if let Err(err) = warmer.warm_snapshot(&theme).await {
                warn!(
                    target = "the_archive::bootstrap",
                    error = %err,
                    "startup render warm failed"
                );
            }
        });
    }

    let state = HttpState::new(
        content,
        renders,
        notifier,
        settings.render.default_theme.as_str(),
    );
    let served = serve_http(&settings, state).await;

    refresh_loop.abort();
    served
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(the_archive::infra::error::InfraError::from(err)))?;

    info!(
        target = "the_archive::bootstrap",
        addr = %settings.server.addr,
        "listening"
    );

    let stopping = Arc::new(Notify::new());
    let signal = {
        let stopping = Arc::clone(&stopping);
        async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(
                    target = "the_archive::bootstrap",
                    error = %err,
                    "failed to listen for shutdown signal"
                );
                std::future::pending::<()>().await;
            }
            info!(target = "the_archive::bootstrap", "shutdown requested");
            stopping.notify_one();
        }
    };
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown(signal);

    // Live streams never end on their own, so draining is bounded.
    let grace = settings.server.graceful_shutdown;
    let deadline = wait_for_deadline(stopping, grace);

    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        () = deadline => {
            warn!(
                target = "the_archive::bootstrap",
                grace_seconds = grace.as_secs(),
                "graceful shutdown timed out; closing remaining connections"
            );
        }
    }
    Ok(())
}

async fn wait_for_deadline(stopping: Arc<Notify>, grace: Duration) {
    stopping.notified().await;
    tokio::time::sleep(grace).await;
}

async fn run_import(settings: config::Settings, args: config::ImportArgs) -> Result<(), AppError> {
    let owner = args.owner.trim();
    if owner.is_empty() {
        return Err(AppError::validation("--owner must not be empty"));
    }

    let store = open_store(&settings).await?;
    let content = ContentRepository::new(store, settings.content.refresh_interval);
    let report = import_directory(&content, &args.directory, &UserId::new(owner)).await?;

    println!(
        "Imported {} posts from {} ({} skipped)",
        report.imported,
        args.directory.display(),
        report.skipped.len()
    );
    for path in &report.skipped {
        println!("  skipped {}", path.display());
    }
    Ok(())
}
