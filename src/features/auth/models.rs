use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// ユーザー情報を表す構造体（password_hashを含むため外部には返さない）
#[derive(Debug, Clone)]
pub struct User {
    /// ユーザーID
    pub id: i64,
    /// ユーザー名（一意）
    pub username: String,
    /// パスワードハッシュ（Argon2id）
    pub password_hash: String,
    /// メールアドレス（一意）
    pub email: String,
    /// 名
    pub first_name: String,
    /// 姓
    pub last_name: String,
    /// 作成日時
    pub created_at: String,
    /// 更新日時
    pub updated_at: String,
}

/// APIレスポンス用のユーザー情報（機密フィールドなし）
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            created_at: user.created_at.clone(),
        }
    }
}

/// ユーザー登録リクエスト
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// ログインリクエスト
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// セッション情報を表す構造体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// セッションID
    pub id: String,
    /// ユーザーID
    pub user_id: i64,
    /// 有効期限
    pub expires_at: DateTime<Utc>,
    /// 作成日時
    pub created_at: DateTime<Utc>,
}
