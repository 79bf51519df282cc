use crate::shared::errors::{AppError, AppResult};
use std::env;
use std::path::PathBuf;

/// アプリケーションの実行環境を表す列挙型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// 開発環境
    Development,
    /// プロダクション環境
    Production,
}

/// 現在の実行環境を判定する
///
/// # 判定ロジック
/// 1. 実行時環境変数 ENVIRONMENT を確認
/// 2. デバッグビルドの場合は Development
/// 3. リリースビルドの場合は Production
pub fn get_environment() -> Environment {
    if let Ok(env_var) = env::var("ENVIRONMENT") {
        let env = match env_var.as_str() {
            "production" => Environment::Production,
            _ => Environment::Development,
        };
        log::debug!("環境判定: 実行時環境変数を使用 -> {env_var} -> {env:?}");
        return env;
    }

    // フォールバック: ビルド設定に基づく判定
    let env = if cfg!(debug_assertions) {
        Environment::Development
    } else {
        Environment::Production
    };
    log::debug!(
        "環境判定: ビルド設定を使用 -> debug_assertions={} -> {env:?}",
        cfg!(debug_assertions)
    );
    env
}

/// 環境に応じたデータベースファイル名を取得する
///
/// # ファイル名の規則
/// - 開発環境: "dev_ryohi.db"
/// - プロダクション環境: "ryohi.db"
pub fn get_database_filename(env: Environment) -> &'static str {
    match env {
        Environment::Development => "dev_ryohi.db",
        Environment::Production => "ryohi.db",
    }
}

/// R2（S3互換）オブジェクトストレージの設定
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub account_id: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket_name: String,
    pub region: String,
}

impl StorageConfig {
    /// 環境変数から設定を読み込む
    pub fn from_env() -> AppResult<Self> {
        let account_id = env::var("R2_ACCOUNT_ID")
            .map_err(|_| AppError::configuration("R2_ACCOUNT_IDが設定されていません"))?;
        let access_key = env::var("R2_ACCESS_KEY")
            .map_err(|_| AppError::configuration("R2_ACCESS_KEYが設定されていません"))?;
        let secret_key = env::var("R2_SECRET_KEY")
            .map_err(|_| AppError::configuration("R2_SECRET_KEYが設定されていません"))?;
        let bucket_name = env::var("R2_BUCKET_NAME")
            .map_err(|_| AppError::configuration("R2_BUCKET_NAMEが設定されていません"))?;
        let region = env::var("R2_REGION").unwrap_or_else(|_| "auto".to_string());

        Ok(Self {
            account_id,
            access_key,
            secret_key,
            bucket_name,
            region,
        })
    }

    /// 設定の検証
    pub fn validate(&self) -> AppResult<()> {
        if self.account_id.is_empty() {
            return Err(AppError::configuration("R2アカウントIDが空です"));
        }
        if self.access_key.is_empty() || self.secret_key.is_empty() {
            return Err(AppError::configuration("R2認証情報が空です"));
        }
        if self.bucket_name.is_empty() {
            return Err(AppError::configuration("R2バケット名が空です"));
        }
        Ok(())
    }

    /// S3互換APIのエンドポイントURLを取得する
    pub fn endpoint_url(&self) -> String {
        format!("https://{}.r2.cloudflarestorage.com", self.account_id)
    }

    /// 環境別のバケット名を取得する
    ///
    /// 開発環境では本番データと混ざらないよう "-dev" サフィックスを付ける
    pub fn environment_bucket_name(&self, env: Environment) -> String {
        match env {
            Environment::Development => format!("{}-dev", self.bucket_name),
            Environment::Production => self.bucket_name.clone(),
        }
    }
}

/// アプリケーション全体の設定
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// 実行環境
    pub environment: Environment,
    /// HTTPサーバーの待ち受けポート
    pub port: u16,
    /// データベースファイルを置くディレクトリ
    pub database_dir: PathBuf,
    /// セッショントークン暗号化キー
    pub session_secret: String,
    /// オブジェクトストレージ設定
    pub storage: StorageConfig,
}

impl AppConfig {
    /// 環境変数から設定を読み込む
    ///
    /// SESSION_SECRETは本番環境では必須。開発環境では未設定の場合に
    /// 固定の開発用キーへフォールバックする（警告ログ付き）。
    pub fn from_env() -> AppResult<Self> {
        let environment = get_environment();

        let port = match env::var("PORT") {
            Ok(value) => value
                .parse::<u16>()
                .map_err(|_| AppError::configuration(format!("PORTが不正です: {value}")))?,
            Err(_) => 3000,
        };

        let database_dir = env::var("DATABASE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));

        let session_secret = match env::var("SESSION_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ => {
                if environment == Environment::Production {
                    return Err(AppError::configuration(
                        "本番環境ではSESSION_SECRETの設定が必須です",
                    ));
                }
                log::warn!("SESSION_SECRETが未設定のため、開発用キーを使用します");
                "dev_session_secret_not_for_production".to_string()
            }
        };

        let storage = StorageConfig::from_env()?;

        Ok(Self {
            environment,
            port,
            database_dir,
            session_secret,
            storage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_database_filename() {
        // 開発環境のデータベースファイル名をテスト
        assert_eq!(
            get_database_filename(Environment::Development),
            "dev_ryohi.db"
        );

        // プロダクション環境のデータベースファイル名をテスト
        assert_eq!(get_database_filename(Environment::Production), "ryohi.db");
    }

    fn test_storage_config() -> StorageConfig {
        StorageConfig {
            account_id: "abc123".to_string(),
            access_key: "key".to_string(),
            secret_key: "secret".to_string(),
            bucket_name: "ryohi-receipts".to_string(),
            region: "auto".to_string(),
        }
    }

    #[test]
    fn test_endpoint_url() {
        let config = test_storage_config();
        assert_eq!(
            config.endpoint_url(),
            "https://abc123.r2.cloudflarestorage.com"
        );
    }

    #[test]
    fn test_environment_bucket_name() {
        let config = test_storage_config();

        // 開発環境ではサフィックス付き
        assert_eq!(
            config.environment_bucket_name(Environment::Development),
            "ryohi-receipts-dev"
        );

        // 本番環境ではそのまま
        assert_eq!(
            config.environment_bucket_name(Environment::Production),
            "ryohi-receipts"
        );
    }

    #[test]
    fn test_storage_config_validation() {
        let config = test_storage_config();
        assert!(config.validate().is_ok());

        let mut invalid = test_storage_config();
        invalid.bucket_name = String::new();
        assert!(invalid.validate().is_err());

        let mut invalid = test_storage_config();
        invalid.access_key = String::new();
        assert!(invalid.validate().is_err());
    }
}
