use ryohi_server::shared::config::environment::AppConfig;
use std::process;

/// ログシステムを初期化する
fn initialize_logging_system() {
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "error" => log::LevelFilter::Error,
        "warn" => log::LevelFilter::Warn,
        "info" => log::LevelFilter::Info,
        "debug" => log::LevelFilter::Debug,
        "trace" => log::LevelFilter::Trace,
        _ => log::LevelFilter::Info,
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp_secs()
        .format_module_path(false)
        .format_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    // .envファイルの読み込み（ない場合は環境変数のみ）
    let dotenv_result = dotenv::dotenv();

    initialize_logging_system();

    match dotenv_result {
        Ok(path) => log::info!(".envファイルを読み込みました: {}", path.display()),
        Err(_) => log::warn!(".envファイルが見つかりません。環境変数のみを使用します"),
    }

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("設定の読み込みに失敗しました: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = ryohi_server::run(config).await {
        log::error!("サーバーの起動に失敗しました: {e}");
        process::exit(1);
    }
}
