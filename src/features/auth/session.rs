use crate::features::auth::models::Session;
use crate::shared::errors::{AppError, AppResult};
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

/// セッションの有効期間（日数）
const SESSION_LIFETIME_DAYS: i64 = 30;

/// セッション管理を行う構造体
///
/// セッションIDはDBに平文で保存し、クライアントへはAES-256-GCMで
/// 暗号化したトークンとしてCookieで渡す。
#[derive(Clone)]
pub struct SessionManager {
    /// データベース接続
    db: Arc<Mutex<Connection>>,
    /// 暗号化キー（32バイト）
    encryption_key: Vec<u8>,
}

impl SessionManager {
    /// 新しいSessionManagerを作成する
    ///
    /// # 引数
    /// * `db` - データベース接続
    /// * `secret` - セッション暗号化用のシークレット
    pub fn new(db: Arc<Mutex<Connection>>, secret: &str) -> Self {
        // 暗号化キーを32バイトに調整（不足分は0で埋める）
        let mut key_bytes = secret.as_bytes().to_vec();
        key_bytes.resize(32, 0);

        Self {
            db,
            encryption_key: key_bytes,
        }
    }

    /// セッションを作成し、暗号化トークンを返す
    pub fn create_session(&self, user_id: i64) -> AppResult<(Session, String)> {
        let session_id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let expires_at = now + Duration::days(SESSION_LIFETIME_DAYS);

        let session = Session {
            id: session_id.clone(),
            user_id,
            expires_at,
            created_at: now,
        };

        {
            let conn = self.db.lock().unwrap();
            conn.execute(
                "INSERT INTO sessions (id, user_id, expires_at, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    session_id,
                    user_id,
                    expires_at.to_rfc3339(),
                    now.to_rfc3339()
                ],
            )?;
        }

        let token = self.encrypt_session_id(&session_id)?;

        log::info!("セッションを作成しました: user_id={user_id}, session_id={session_id}");
        Ok((session, token))
    }

    /// トークンを検証し、有効なセッションを返す
    ///
    /// トークンの復号失敗・未登録・期限切れはいずれも認証エラーになる。
    pub fn validate_session(&self, token: &str) -> AppResult<Session> {
        let session_id = self
            .decrypt_token(token)
            .map_err(|e| AppError::unauthorized(format!("トークン復号失敗: {e}")))?;

        let session = {
            let conn = self.db.lock().unwrap();
            let result = conn.query_row(
                "SELECT id, user_id, expires_at, created_at FROM sessions WHERE id = ?1",
                params![session_id],
                |row| {
                    let expires_at_str: String = row.get(2)?;
                    let created_at_str: String = row.get(3)?;
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?, expires_at_str, created_at_str))
                },
            );

            match result {
                Ok((id, user_id, expires_at_str, created_at_str)) => Session {
                    id,
                    user_id,
                    expires_at: parse_timestamp(&expires_at_str)?,
                    created_at: parse_timestamp(&created_at_str)?,
                },
                Err(rusqlite::Error::QueryReturnedNoRows) => {
                    return Err(AppError::unauthorized("セッションが見つかりません"));
                }
                Err(e) => return Err(AppError::Database(e)),
            }
        };

        // セッションの有効期限をチェック
        if session.expires_at < Utc::now() {
            // 期限切れセッションを削除
            let _ = self.invalidate_session(&session.id);
            return Err(AppError::unauthorized("セッションが期限切れです"));
        }

        log::debug!(
            "セッションを検証しました: user_id={}, session_id={}",
            session.user_id,
            session.id
        );
        Ok(session)
    }

    /// セッションを無効化する
    pub fn invalidate_session(&self, session_id: &str) -> AppResult<()> {
        let conn = self.db.lock().unwrap();
        let affected_rows =
            conn.execute("DELETE FROM sessions WHERE id = ?1", params![session_id])?;

        if affected_rows > 0 {
            log::info!("セッションを無効化しました: session_id={session_id}");
        } else {
            log::warn!("無効化対象のセッションが見つかりませんでした: session_id={session_id}");
        }

        Ok(())
    }

    /// トークンからセッションを特定して無効化する（ログアウト用）
    pub fn invalidate_by_token(&self, token: &str) -> AppResult<()> {
        let session_id = self
            .decrypt_token(token)
            .map_err(|e| AppError::unauthorized(format!("トークン復号失敗: {e}")))?;
        self.invalidate_session(&session_id)
    }

    /// 期限切れセッションをクリーンアップする
    ///
    /// # 戻り値
    /// 削除されたセッション数
    pub fn cleanup_expired_sessions(&self) -> AppResult<usize> {
        let now = Utc::now();
        let conn = self.db.lock().unwrap();

        let affected_rows = conn.execute(
            "DELETE FROM sessions WHERE expires_at < ?1",
            params![now.to_rfc3339()],
        )?;

        if affected_rows > 0 {
            log::info!("期限切れセッションを{affected_rows}件削除しました");
        }

        Ok(affected_rows)
    }

    /// セッションIDを暗号化してトークンを生成する
    pub fn encrypt_session_id(&self, session_id: &str) -> AppResult<String> {
        let cipher = Aes256Gcm::new_from_slice(&self.encryption_key)
            .map_err(|e| AppError::security(format!("暗号化キーエラー: {e}")))?;

        // ランダムなナンス（12バイト）を生成
        let mut nonce_bytes = [0u8; 12];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, session_id.as_bytes())
            .map_err(|e| AppError::security(format!("暗号化エラー: {e}")))?;

        // ナンスと暗号文を結合してBase64エンコード
        let mut token_bytes = nonce_bytes.to_vec();
        token_bytes.extend_from_slice(&ciphertext);
        Ok(general_purpose::URL_SAFE_NO_PAD.encode(&token_bytes))
    }

    /// トークンを復号化してセッションIDを取得する
    fn decrypt_token(&self, token: &str) -> AppResult<String> {
        let token_bytes = general_purpose::URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|e| AppError::security(format!("Base64デコードエラー: {e}")))?;

        if token_bytes.len() < 12 {
            return Err(AppError::security("トークンが短すぎます"));
        }

        // ナンスと暗号文を分離
        let (nonce_bytes, ciphertext) = token_bytes.split_at(12);
        let nonce = Nonce::from_slice(nonce_bytes);

        let cipher = Aes256Gcm::new_from_slice(&self.encryption_key)
            .map_err(|e| AppError::security(format!("暗号化キーエラー: {e}")))?;

        let plaintext = cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| AppError::security(format!("復号エラー: {e}")))?;

        String::from_utf8(plaintext).map_err(|e| AppError::security(format!("UTF-8変換エラー: {e}")))
    }
}

/// RFC 3339形式のタイムスタンプを解析する
fn parse_timestamp(value: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::security(format!("タイムスタンプ解析エラー: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::database::connection::create_in_memory_connection;

    fn setup_test_session_manager() -> SessionManager {
        let conn = create_in_memory_connection().unwrap();
        SessionManager::new(Arc::new(Mutex::new(conn)), "test_encryption_key")
    }

    #[test]
    fn test_create_session() {
        let manager = setup_test_session_manager();

        let (session, token) = manager.create_session(1).unwrap();

        assert_eq!(session.user_id, 1);
        assert!(!session.id.is_empty());
        assert!(!token.is_empty());
        assert!(session.expires_at > Utc::now());
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let manager = setup_test_session_manager();
        let session_id = "test-session-id";

        let token = manager.encrypt_session_id(session_id).unwrap();
        let decrypted = manager.decrypt_token(&token).unwrap();

        assert_eq!(session_id, decrypted);
    }

    #[test]
    fn test_validate_session() {
        let manager = setup_test_session_manager();

        let (session, token) = manager.create_session(7).unwrap();
        let validated = manager.validate_session(&token).unwrap();

        assert_eq!(validated.id, session.id);
        assert_eq!(validated.user_id, 7);
    }

    #[test]
    fn test_validate_rejects_garbage_token() {
        let manager = setup_test_session_manager();

        let result = manager.validate_session("garbage-token");
        assert!(matches!(result.unwrap_err(), AppError::Unauthorized(_)));
    }

    #[test]
    fn test_invalidate_session() {
        let manager = setup_test_session_manager();

        let (_, token) = manager.create_session(1).unwrap();
        manager.invalidate_by_token(&token).unwrap();

        let result = manager.validate_session(&token);
        assert!(matches!(result.unwrap_err(), AppError::Unauthorized(_)));
    }

    #[test]
    fn test_expired_session_is_rejected_and_removed() {
        let manager = setup_test_session_manager();

        // 期限切れのセッションを直接挿入
        let session_id = "expired-session";
        let past = Utc::now() - Duration::days(1);
        {
            let conn = manager.db.lock().unwrap();
            conn.execute(
                "INSERT INTO sessions (id, user_id, expires_at, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![session_id, 1, past.to_rfc3339(), past.to_rfc3339()],
            )
            .unwrap();
        }

        let token = manager.encrypt_session_id(session_id).unwrap();
        let result = manager.validate_session(&token);
        assert!(matches!(result.unwrap_err(), AppError::Unauthorized(_)));

        // 期限切れセッションは削除されている
        let count: i64 = {
            let conn = manager.db.lock().unwrap();
            conn.query_row(
                "SELECT COUNT(*) FROM sessions WHERE id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .unwrap()
        };
        assert_eq!(count, 0);
    }

    #[test]
    fn test_cleanup_expired_sessions() {
        let manager = setup_test_session_manager();

        let past = Utc::now() - Duration::days(1);
        {
            let conn = manager.db.lock().unwrap();
            for i in 0..3 {
                conn.execute(
                    "INSERT INTO sessions (id, user_id, expires_at, created_at) VALUES (?1, ?2, ?3, ?4)",
                    params![format!("old-{i}"), 1, past.to_rfc3339(), past.to_rfc3339()],
                )
                .unwrap();
            }
        }
        manager.create_session(1).unwrap();

        let removed = manager.cleanup_expired_sessions().unwrap();
        assert_eq!(removed, 3);

        // 有効なセッションは残っている
        let count: i64 = {
            let conn = manager.db.lock().unwrap();
            conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
                .unwrap()
        };
        assert_eq!(count, 1);
    }
}
