pub mod features;
pub mod server;
pub mod shared;

use crate::features::auth::session::SessionManager;
use crate::features::receipts::storage::R2Client;
use crate::shared::config::environment::{AppConfig, Environment};
use crate::shared::database::connection;
use crate::shared::errors::AppResult;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

/// アプリケーション全体で共有する状態
pub struct AppState {
    /// SQLiteコネクション
    pub db: Arc<Mutex<Connection>>,
    /// セッション管理
    pub sessions: SessionManager,
    /// オブジェクトストレージクライアント
    pub storage: R2Client,
    /// 実行環境（プロダクションではCookieにSecure属性を付ける）
    pub environment: Environment,
}

impl AppState {
    pub fn new(conn: Connection, storage: R2Client, config: &AppConfig) -> Self {
        let db = Arc::new(Mutex::new(conn));
        let sessions = SessionManager::new(Arc::clone(&db), &config.session_secret);
        Self {
            db,
            sessions,
            storage,
            environment: config.environment,
        }
    }
}

/// データベースとストレージを初期化してサーバーを起動する
pub async fn run(config: AppConfig) -> AppResult<()> {
    log::info!("実行環境: {:?}", config.environment);

    let conn = connection::initialize_database(&config)?;

    let storage = R2Client::new(&config.storage, config.environment).await?;

    // 起動時の疎通確認。失敗してもサーバー自体は起動する
    if let Err(e) = storage.test_connection().await {
        log::warn!("R2への疎通確認に失敗しました（アップロードは失敗する可能性があります）: {e}");
    }

    let state = Arc::new(AppState::new(conn, storage, &config));

    server::serve(state, config.port).await
}
