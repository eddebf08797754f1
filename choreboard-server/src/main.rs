use choreboard_server::photos::FsPhotoStore;
use choreboard_server::report::Report;
use choreboard_server::{server, storage};
mod cli;

use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    use clap::Parser;
    let args = cli::Cli::parse();

    // Console-only logging with env-driven level
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .init();

    let config = match server::AppConfig::load() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error=%e, "Failed to load config");
            std::process::exit(2);
        }
    };

    let db_path = std::env::var("DB_PATH").unwrap_or_else(|_| "data/chores.db".into());
    // Ensure data dir exists when using default
    if let Some(parent) = std::path::Path::new(&db_path).parent()
        && !parent.as_os_str().is_empty()
    {
        let _ = std::fs::create_dir_all(parent);
    }
    let store = match storage::Store::connect_sqlite(&db_path).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error=%e, path=%db_path, "Failed to connect DB");
            std::process::exit(3);
        }
    };

    if let Some(cmd) = args.command {
        if let Err(e) = run_admin(cmd, &store).await {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
        return;
    }

    if let Err(e) = store.seed(&config.people, &config.chores).await {
        tracing::error!(error=%e, "Failed to seed DB");
        std::process::exit(4);
    }

    // Decide listen port: env PORT overrides config.listen_port, default 5151
    let port = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .or(config.listen_port)
        .unwrap_or(5151);

    let photo_dir = config.photo_dir();
    tracing::info!(photo_dir = %photo_dir.display(), "photo storage");
    let photos = Arc::new(FsPhotoStore::new(photo_dir));
    let state = server::AppState::new(config, store, photos);
    let app = server::router(state);

    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    tracing::info!(%addr, "Starting server");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(error=%e, %addr, "Failed to bind listener");
            std::process::exit(5);
        }
    };

    let shutdown_token = CancellationToken::new();
    let shutdown_token_for_server = shutdown_token.clone();
    let mut server_task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_token_for_server.cancelled_owned())
            .await
    });

    // Wait for OS signal; then trigger graceful, and if it hangs beyond timeout, force abort.
    shutdown_signal().await;
    tracing::info!("shutdown: initiating graceful stop");
    shutdown_token.cancel();
    match tokio::time::timeout(std::time::Duration::from_secs(3), &mut server_task).await {
        Ok(join_res) => match join_res {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::error!(%err, "server error"),
            Err(e) => tracing::error!(error=%e, "server task join error"),
        },
        Err(_) => {
            tracing::warn!("shutdown: forcing server abort due to timeout");
            server_task.abort();
        }
    }
}

async fn run_admin(
    cmd: cli::Command,
    store: &storage::Store,
) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        cli::Command::AddPerson { name } => {
            let p = store.add_person(&name).await?;
            println!("added person {} (id {})", p.name, p.id);
        }
        cli::Command::AddChore {
            room,
            task,
            frequency,
            minutes,
        } => {
            let c = store.add_chore(&room, &task, frequency, minutes).await?;
            println!("added chore {} / {} (id {})", c.room, c.task, c.id);
        }
        cli::Command::Export { start, end, out } => {
            let report = Report::load(store, start, end).await?;
            let csv = report.to_csv();
            match out {
                Some(path) => {
                    std::fs::write(&path, csv)?;
                    eprintln!(
                        "wrote {} rows ({:.1}% complete) to {}",
                        report.summary.total,
                        report.summary.completion_rate,
                        path.display()
                    );
                }
                None => print!("{}", csv),
            }
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigint = match signal(SignalKind::interrupt()) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error=%e, "failed to listen for SIGINT");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error=%e, "failed to listen for SIGTERM");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = sigint.recv() => {
                tracing::info!("shutdown: received SIGINT");
            }
            _ = sigterm.recv() => {
                tracing::info!("shutdown: received SIGTERM");
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown: received Ctrl+C");
    }
}
