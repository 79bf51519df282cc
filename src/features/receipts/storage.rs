use crate::shared::config::environment::{Environment, StorageConfig};
use crate::shared::errors::{AppError, AppResult};
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::config::{Credentials, SharedCredentialsProvider};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::{Client, Config};
use log::{debug, error, info, warn};
use std::time::Duration;

/// アップロード可能な最大ファイルサイズ（10MB）
pub const MAX_RECEIPT_SIZE: u64 = 10 * 1024 * 1024;

/// R2（S3互換）オブジェクトストレージのクライアント
///
/// 領収書ファイルは非公開バケットに置き、取得は常にPresigned URL経由で行う。
#[derive(Clone)]
pub struct R2Client {
    client: Client,
    bucket_name: String,
}

impl R2Client {
    /// R2クライアントを初期化する
    pub async fn new(config: &StorageConfig, environment: Environment) -> AppResult<Self> {
        info!("R2クライアントを初期化しています...");

        // 設定を検証
        config.validate().map_err(|e| {
            error!("R2設定の検証に失敗しました: {e}");
            e
        })?;

        // 認証情報を設定（ログには出力しない）
        debug!("認証情報を設定中...");
        let credentials =
            Credentials::new(&config.access_key, &config.secret_key, None, None, "r2");

        // S3互換設定を構築
        debug!("AWS設定を構築中... エンドポイント: {}", config.endpoint_url());
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .endpoint_url(config.endpoint_url())
            .region(Region::new(config.region.clone()))
            .credentials_provider(SharedCredentialsProvider::new(credentials))
            .load()
            .await;

        let s3_config = Config::from(&aws_config);
        let client = Client::from_conf(s3_config);

        // 環境別バケット名を使用
        let bucket_name = config.environment_bucket_name(environment);

        info!("R2クライアントの初期化が完了しました。バケット: {bucket_name}");

        Ok(Self {
            client,
            bucket_name,
        })
    }

    /// ファイルをR2にアップロードする
    pub async fn upload_file(
        &self,
        key: &str,
        file_data: Vec<u8>,
        content_type: &str,
    ) -> AppResult<()> {
        let file_size = file_data.len();
        info!(
            "ファイルアップロード開始: key={key}, size={file_size} bytes, content_type={content_type}"
        );

        let start_time = std::time::Instant::now();

        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(key)
            .body(file_data.into())
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                error!(
                    "ファイルアップロード失敗: key={}, bucket={}, error={}",
                    key, self.bucket_name, e
                );
                AppError::storage(format!("アップロードエラー: {e}"))
            })?;

        info!(
            "ファイルアップロード成功: key={key}, duration={:?}",
            start_time.elapsed()
        );

        Ok(())
    }

    /// リトライ機能付きファイルアップロード
    ///
    /// 失敗時は指数バックオフ（2^attempts秒）で再試行する。
    pub async fn upload_file_with_retry(
        &self,
        key: &str,
        file_data: Vec<u8>,
        content_type: &str,
        max_retries: u32,
    ) -> AppResult<()> {
        let mut attempts = 0;

        loop {
            match self.upload_file(key, file_data.clone(), content_type).await {
                Ok(()) => {
                    if attempts > 0 {
                        info!("リトライ後にアップロード成功: key={key}, attempts={attempts}");
                    }
                    return Ok(());
                }
                Err(_e) if attempts < max_retries => {
                    attempts += 1;
                    let delay = Duration::from_secs(2_u64.pow(attempts));
                    warn!(
                        "アップロード失敗、リトライします: key={key}, attempt={attempts}/{max_retries}, delay={delay:?}"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!(
                        "アップロード最終失敗: key={key}, total_attempts={}",
                        attempts + 1
                    );
                    return Err(e);
                }
            }
        }
    }

    /// Presigned URLを生成する（ダウンロード用）
    pub async fn generate_presigned_url(
        &self,
        key: &str,
        expires_in: Duration,
    ) -> AppResult<String> {
        let presigning_config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| AppError::storage(format!("Presigned URL設定エラー: {e}")))?;

        let presigned_request = self
            .client
            .get_object()
            .bucket(&self.bucket_name)
            .key(key)
            .presigned(presigning_config)
            .await
            .map_err(|e| AppError::storage(format!("Presigned URL生成エラー: {e}")))?;

        Ok(presigned_request.uri().to_string())
    }

    /// ファイルをR2から削除する
    pub async fn delete_file(&self, key: &str) -> AppResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::storage(format!("削除エラー: {e}")))?;

        Ok(())
    }

    /// 接続テスト（バケットの存在確認）
    pub async fn test_connection(&self) -> AppResult<()> {
        info!("R2接続テストを開始します: bucket={}", self.bucket_name);

        let start_time = std::time::Instant::now();

        self.client
            .head_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
            .map_err(|e| {
                error!(
                    "R2接続テスト失敗: bucket={}, error={}",
                    self.bucket_name, e
                );
                AppError::storage(format!("接続テスト失敗: {e}"))
            })?;

        info!(
            "R2接続テスト成功: bucket={}, duration={:?}",
            self.bucket_name,
            start_time.elapsed()
        );

        Ok(())
    }
}

/// ファイル形式を検証する（PNG、JPG、JPEG、PDFのみ対応）
pub fn validate_file_format(filename: &str) -> AppResult<()> {
    let extension = std::path::Path::new(filename)
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase())
        .ok_or_else(|| AppError::validation("ファイル拡張子が取得できません"))?;

    if !matches!(extension.as_str(), "png" | "jpg" | "jpeg" | "pdf") {
        return Err(AppError::validation(
            "サポートされていないファイル形式です（PNG、JPG、JPEG、PDFのみ対応）",
        ));
    }

    Ok(())
}

/// ファイルサイズを検証する
pub fn validate_file_size(file_size: u64) -> AppResult<()> {
    if file_size == 0 {
        return Err(AppError::validation("ファイルが空です"));
    }
    if file_size > MAX_RECEIPT_SIZE {
        return Err(AppError::validation("ファイルサイズが10MBを超えています"));
    }

    Ok(())
}

/// ファイル名からContent-Typeを推定する
pub fn content_type_for(filename: &str) -> &'static str {
    let extension = std::path::Path::new(filename)
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}
