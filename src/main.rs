use std::{io::Read, path::PathBuf, process, sync::Arc};

use naskah::{
    application::{
        chat::ChatService,
        error::AppError,
        export::ExportService,
        render::{DocumentVariant, render_service},
        sessions::SessionService,
    },
    config,
    infra::{
        error::InfraError,
        gemini::GeminiClient,
        http::{self, HttpState, StaffGate},
        store::SessionStore,
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
        config::Command::RenderDocument(args) => run_render(settings, args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let profile = Arc::new(settings.school.clone());
    let store = Arc::new(SessionStore::open(settings.sessions.file.clone()).await?);

    let mut client = GeminiClient::new(
        settings.ai.model.clone(),
        settings.ai.temperature,
        settings.ai.timeout,
    )?;
    if let Some(base_url) = settings.ai.base_url.as_ref() {
        client = client.with_base_url(base_url);
    }

    let export = Arc::new(ExportService::new(render_service()));
    let chat = Arc::new(ChatService::new(
        client,
        Arc::clone(&store),
        Arc::clone(&profile),
        &settings.ai,
        &settings.uploads,
    ));
    let sessions = Arc::new(SessionService::new(Arc::clone(&store), Arc::clone(&profile)));
    let gate = Arc::new(StaffGate::new(settings.server.staff_passphrase.as_deref()));

    let state = HttpState {
        sessions,
        chat,
        export,
        store,
        profile,
        gate,
    };
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(addr = %settings.server.addr, "listening");

    // After the shutdown signal, in-flight requests get the configured
    // grace window to drain before the process exits.
    let grace = settings.server.graceful_shutdown;
    let shutdown_started = Arc::new(Notify::new());
    let notify = Arc::clone(&shutdown_started);
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown(
        async move {
            shutdown_signal().await;
            notify.notify_one();
        },
    );

    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = async {
            shutdown_started.notified().await;
            tokio::time::sleep(grace).await;
        } => {
            warn!(
                grace_secs = grace.as_secs(),
                "graceful shutdown window elapsed, closing remaining connections"
            );
        }
    }

    Ok(())
}

/// Render the Download-variant document for a raw reply, offline.
async fn run_render(settings: config::Settings, args: config::RenderArgs) -> Result<(), AppError> {
    let raw = read_input(args.input.as_ref()).await?;

    let document = render_service().assemble(
        &raw,
        DocumentVariant::Download,
        &settings.school.letterhead(),
    );

    match args.output {
        Some(path) => tokio::fs::write(&path, document.html)
            .await
            .map_err(|err| AppError::from(InfraError::from(err)))?,
        None => println!("{}", document.html),
    }

    Ok(())
}

async fn read_input(input: Option<&PathBuf>) -> Result<String, AppError> {
    match input {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .map_err(|err| AppError::from(InfraError::from(err))),
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|err| AppError::from(InfraError::from(err)))?;
            Ok(buffer)
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
    }
}
