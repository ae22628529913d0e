use std::{future::IntoFuture, io, process};

use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use verso::{
    application::{error::AppError, site::Site},
    config::{self, EncodePasswordArgs, PasswordScheme},
    infra::{error::InfraError, http, telemetry},
    security::password,
};

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
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    if let config::Command::EncodePassword(args) = &command {
        return run_encode_password(args);
    }

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Check(_) => run_check(settings),
        config::Command::EncodePassword(args) => run_encode_password(&args),
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let (site, _) = Site::assemble(&settings)?;
    let router = http::build_router(site);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "verso::server",
        addr = %settings.server.addr,
        mode = settings.site.mode.as_str(),
        "Listening for connections"
    );

    let (stop_tx, mut stop_rx) = tokio::sync::watch::channel(false);
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = stop_tx.send(true);
        })
        .into_future();

    let grace = settings.server.graceful_shutdown;
    let drain_deadline = async move {
        if stop_rx.wait_for(|stopped| *stopped).await.is_err() {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = drain_deadline => {
            warn!(
                target = "verso::server",
                grace_seconds = grace.as_secs(),
                "Connections still open after the shutdown grace period; exiting"
            );
        }
    }

    info!(target = "verso::server", "Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(target = "verso::server", error = %err, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(target = "verso::server", error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!(target = "verso::server", "Shutdown signal received");
}

fn run_check(settings: config::Settings) -> Result<(), AppError> {
    let (_, report) = Site::assemble(&settings)?;

    println!(
        "pages: {} loaded, {} skipped",
        report.pages.loaded, report.pages.skipped
    );
    println!("users: {}", report.users);
    println!("access rules: {}", report.access_rules);
    println!("reload listeners: {}", report.listeners);
    Ok(())
}

fn run_encode_password(args: &EncodePasswordArgs) -> Result<(), AppError> {
    let cleartext = match args.password.as_ref() {
        Some(password) => password.clone(),
        None => {
            let mut line = String::new();
            io::stdin()
                .read_line(&mut line)
                .map_err(|err| AppError::from(InfraError::from(err)))?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };

    if cleartext.is_empty() {
        return Err(AppError::validation("password must not be empty"));
    }

    let encoded = match args.scheme {
        PasswordScheme::Sha256 => password::hash_sha256(&cleartext),
        PasswordScheme::Base64 => password::encode_base64(&cleartext),
    };
    println!("{encoded}");
    Ok(())
}
