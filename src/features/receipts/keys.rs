use crate::shared::errors::{AppError, AppResult};
use once_cell::sync::Lazy;
use regex::Regex;

static USER_KEY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^user_(\d+)/").expect("キーパターンが不正"));

static UNSAFE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]").expect("ファイル名パターンが不正"));

/// ファイル名をオブジェクトキーに使える形へ正規化する
///
/// パス区切りを含む場合は最後の要素のみを使い、英数字と「. _ -」以外は
/// アンダースコアに置き換える。
pub fn sanitize_filename(filename: &str) -> String {
    let basename = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .trim_start_matches('.');

    let sanitized = UNSAFE_CHARS.replace_all(basename, "_").to_string();
    if sanitized.is_empty() {
        "receipt".to_string()
    } else {
        sanitized
    }
}

/// 領収書オブジェクトのキーを生成する
///
/// # 戻り値
/// `user_{user_id}/{timestamp}_{filename}` 形式のキー
pub fn generate_receipt_key(user_id: i64, filename: &str) -> String {
    let timestamp = chrono::Utc::now().timestamp();
    format!("user_{user_id}/{timestamp}_{}", sanitize_filename(filename))
}

/// キーからユーザーIDを抽出する
pub fn extract_user_id(key: &str) -> AppResult<i64> {
    if let Some(captures) = USER_KEY_PATTERN.captures(key) {
        captures[1]
            .parse::<i64>()
            .map_err(|_| AppError::validation("キーのユーザーID解析に失敗"))
    } else {
        Err(AppError::validation(format!("キー形式が無効です: {key}")))
    }
}

/// ユーザーがキーにアクセス権限を持つかチェックする
///
/// 自分の `user_{id}/` プレフィックス配下のキーのみ許可する。
pub fn validate_user_access(user_id: i64, key: &str) -> AppResult<()> {
    let key_user_id = extract_user_id(key)?;
    if user_id == key_user_id {
        Ok(())
    } else {
        log::warn!(
            "他ユーザーの領収書キーへのアクセスを拒否: user_id={user_id}, key={key}"
        );
        Err(AppError::forbidden(format!(
            "キーの所有者が一致しません: {key}"
        )))
    }
}
