use crate::shared::config::environment::{get_database_filename, AppConfig};
use crate::shared::errors::AppResult;
use rusqlite::Connection;

/// データベース接続を初期化し、テーブルを作成する
///
/// # 処理内容
/// 1. データベースディレクトリの確保
/// 2. 環境に応じたデータベースファイルパスの決定
/// 3. データベース接続の開設
/// 4. テーブルとインデックスの作成
pub fn initialize_database(config: &AppConfig) -> AppResult<Connection> {
    if !config.database_dir.exists() {
        std::fs::create_dir_all(&config.database_dir)?;
        log::info!(
            "データベースディレクトリを作成しました: {:?}",
            config.database_dir
        );
    }

    let database_path = config
        .database_dir
        .join(get_database_filename(config.environment));

    let conn = Connection::open(&database_path)?;
    create_tables(&conn)?;

    log::info!("データベースを初期化しました: {:?}", database_path);

    Ok(conn)
}

/// テスト用のインメモリデータベース接続を作成する
pub fn create_in_memory_connection() -> AppResult<Connection> {
    let conn = Connection::open_in_memory()?;
    create_tables(&conn)?;
    Ok(conn)
}

/// すべてのテーブルとインデックスを作成する（冪等）
pub fn create_tables(conn: &Connection) -> AppResult<()> {
    // ユーザーテーブル
    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // 旅行テーブル（同一ユーザー内で名前は一意）
    conn.execute(
        "CREATE TABLE IF NOT EXISTS trips (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            description TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(user_id, name)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_trips_user ON trips(user_id)",
        [],
    )?;

    // 経費テーブル（旅行とは (user_id, trip_name) で論理的に関連付ける）
    conn.execute(
        "CREATE TABLE IF NOT EXISTS expenses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            category TEXT NOT NULL,
            date TEXT NOT NULL,
            vendor TEXT NOT NULL,
            location TEXT,
            cost REAL NOT NULL CHECK(cost >= 0),
            trip_name TEXT NOT NULL,
            receipt_key TEXT,
            comments TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_expenses_user_trip ON expenses(user_id, trip_name)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_expenses_date ON expenses(date)",
        [],
    )?;

    // セッションテーブル
    conn.execute(
        "CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL,
            expires_at TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id)",
        [],
    )?;

    Ok(())
}
