//! CRUD Board Entry Point

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crud_board::config::{AppConfig, BackendConfig, ConfigError};
use crud_board::notice::NoticeBoard;
use crud_board::repository::hosted::{
    sign_in_with_password, Endpoint, RealtimeClient, RestClient, StorageClient,
};
use crud_board::repository::local::{LocalBackend, LocalStore, MemoryStorage};
use crud_board::repository::BackendError;
use crud_board::session::{Session, SessionHandle, SessionProvider};
use crud_board::Board;

const APP_NAME: &str = "crud-board";
const LOCAL_USER: &str = "local-user";

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Logger(#[from] rolling_logger::LoggerError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        tracing::error!("{}", e);
        eprintln!("{}: {}", APP_NAME, e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    let config = AppConfig::from_env()?;
    rolling_logger::init_logger(config.log_path(), APP_NAME)?;
    tracing::info!("starting {} with data in {}", APP_NAME, config.data_dir.display());

    let session = SessionHandle::signed_out();
    let board = match &config.backend {
        Some(backend) => hosted_board(backend, &session).await?,
        None => local_board(&config, &session)?,
    };

    board.mount();
    watch_lists(&board).await;
    board.unmount();
    tracing::info!("{} stopped", APP_NAME);
    Ok(())
}

async fn hosted_board(backend: &BackendConfig, session: &SessionHandle) -> Result<Board, AppError> {
    let endpoint = Endpoint::new(&backend.url, &backend.anon_key);
    match (std::env::var("BOARD_EMAIL"), std::env::var("BOARD_PASSWORD")) {
        (Ok(email), Ok(password)) => {
            let signed_in = sign_in_with_password(&endpoint, &email, &password).await?;
            session.sign_in(signed_in);
        }
        _ => tracing::warn!("BOARD_EMAIL/BOARD_PASSWORD not set; browsing signed out"),
    }

    let provider: Arc<dyn SessionProvider> = Arc::new(session.clone());
    let records = Arc::new(RestClient::new(endpoint.clone(), provider.clone()));
    let storage = Arc::new(StorageClient::new(endpoint.clone(), provider.clone()));
    let feed = Arc::new(RealtimeClient::connect(&endpoint, provider.clone()).await?);
    Ok(Board::new(records, feed, storage, provider, NoticeBoard::new()))
}

fn local_board(config: &AppConfig, session: &SessionHandle) -> Result<Board, AppError> {
    std::fs::create_dir_all(&config.data_dir).map_err(|source| ConfigError::Io {
        path: config.data_dir.clone(),
        source,
    })?;
    let store = LocalStore::open(&config.db_path())?;
    let user = std::env::var("BOARD_USER").unwrap_or_else(|_| LOCAL_USER.to_string());
    session.sign_in(Session::for_user(&user));
    tracing::info!("local store at {} as {}", config.db_path().display(), user);

    let provider: Arc<dyn SessionProvider> = Arc::new(session.clone());
    let backend = Arc::new(LocalBackend::new(store, provider.clone()));
    Ok(Board::new(
        backend.clone(),
        backend,
        Arc::new(MemoryStorage::new()),
        provider,
        NoticeBoard::new(),
    ))
}

/// Log list sizes until ctrl-c
async fn watch_lists(board: &Board) {
    let mut ticker = tokio::time::interval(Duration::from_secs(2));
    let mut last = String::new();
    let mut shutdown = std::pin::pin!(tokio::signal::ctrl_c());
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("shutdown requested");
                return;
            }
            _ = ticker.tick() => {
                let summary = format!(
                    "todos={} foods={} pokemon={} photos={} notes={}",
                    board.todos.store().len(),
                    board.foods.store().len(),
                    board.pokemon.store().len(),
                    board.drive.store().len(),
                    board.notes.store().len(),
                );
                if summary != last {
                    tracing::info!("{}", summary);
                    last = summary;
                }
                // notices are logged as they are raised
                board.notices.clear();
            }
        }
    }
}
