use crate::features::auth::handlers::{authenticate, ensure_owner};
use crate::features::expenses::models::Expense;
use crate::features::expenses::repository as expenses_repository;
use crate::features::receipts::{keys, storage};
use crate::server::response;
use crate::shared::errors::{AppError, AppResult};
use crate::AppState;
use futures::stream;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::http::request::Parts;
use hyper::{Response, StatusCode};
use multer::Multipart;
use serde::Serialize;
use std::convert::Infallible;
use std::time::Duration;

/// Presigned URLの有効期間（15分）
const PRESIGN_EXPIRY: Duration = Duration::from_secs(15 * 60);

/// アップロード時の最大リトライ回数
const UPLOAD_MAX_RETRIES: u32 = 3;

/// multipartフォームのファイルフィールド名
const RECEIPT_FIELD: &str = "receipt";

/// 領収書APIのレスポンス
#[derive(Debug, Serialize)]
struct ReceiptResponse {
    /// 経費ID
    expense_id: i64,
    /// オブジェクトキー
    receipt_key: String,
    /// 時限付き署名URL
    url: String,
    /// URLの有効期間（秒）
    expires_in: u64,
}

/// 経費を取得して所有者を検証する
fn load_owned_expense(state: &AppState, parts: &Parts, id: i64) -> AppResult<Expense> {
    let user = authenticate(state, parts)?;
    let expense = {
        let conn = state.db.lock().unwrap();
        expenses_repository::find_by_id(&conn, id)?
    };
    ensure_owner(&user, expense.user_id, "経費")?;
    Ok(expense)
}

/// multipart/form-dataボディから領収書ファイルを取り出す
///
/// # 戻り値
/// (ファイル名, ファイルデータ)
async fn extract_receipt_file(parts: &Parts, body: Bytes) -> AppResult<(String, Bytes)> {
    let content_type = parts
        .headers
        .get(hyper::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::validation("Content-Typeヘッダーがありません"))?;

    let boundary = multer::parse_boundary(content_type)
        .map_err(|e| AppError::validation(format!("multipart境界の解析に失敗しました: {e}")))?;

    let body_stream = stream::once(async move { Ok::<Bytes, Infallible>(body) });
    let mut multipart = Multipart::new(body_stream, boundary);

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::validation(format!("multipartの解析に失敗しました: {e}")))?
    {
        if field.name() != Some(RECEIPT_FIELD) {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::validation("ファイル名がありません"))?;

        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::validation(format!("ファイルデータの読み込みに失敗しました: {e}")))?;

        return Ok((filename, data));
    }

    Err(AppError::validation(format!(
        "multipartに{RECEIPT_FIELD}フィールドがありません"
    )))
}

/// POST /api/expenses/{id}/receipt - 領収書のアップロード（置き換え）
///
/// 既存の領収書がある場合は、先に旧オブジェクトをベストエフォートで削除
/// してから新しいファイルをアップロードし、キーを保存する。旧オブジェクト
/// の削除失敗はログのみで致命的エラーにはしない。
pub async fn upload(
    state: &AppState,
    parts: &Parts,
    id: i64,
    body: Bytes,
) -> AppResult<Response<Full<Bytes>>> {
    let expense = load_owned_expense(state, parts, id)?;

    let (filename, data) = extract_receipt_file(parts, body).await?;
    storage::validate_file_format(&filename)?;
    storage::validate_file_size(data.len() as u64)?;

    // 旧オブジェクトをベストエフォートで削除
    if let Some(old_key) = &expense.receipt_key {
        if let Err(e) = state.storage.delete_file(old_key).await {
            log::warn!("旧領収書オブジェクトの削除に失敗しました: key={old_key}, {e}");
        } else {
            log::info!("旧領収書オブジェクトを削除しました: key={old_key}");
        }
    }

    let key = keys::generate_receipt_key(expense.user_id, &filename);
    let content_type = storage::content_type_for(&filename);

    state
        .storage
        .upload_file_with_retry(&key, data.to_vec(), content_type, UPLOAD_MAX_RETRIES)
        .await?;

    {
        let conn = state.db.lock().unwrap();
        expenses_repository::set_receipt_key(&conn, id, Some(&key))?;
    }

    let url = state.storage.generate_presigned_url(&key, PRESIGN_EXPIRY).await?;

    log::info!("領収書をアップロードしました: expense_id={id}, key={key}");
    Ok(response::json(
        StatusCode::OK,
        &ReceiptResponse {
            expense_id: id,
            receipt_key: key,
            url,
            expires_in: PRESIGN_EXPIRY.as_secs(),
        },
    ))
}

/// GET /api/expenses/{id}/receipt - 領収書の署名URL取得
pub async fn get_url(
    state: &AppState,
    parts: &Parts,
    id: i64,
) -> AppResult<Response<Full<Bytes>>> {
    let expense = load_owned_expense(state, parts, id)?;

    let key = expense
        .receipt_key
        .ok_or_else(|| AppError::not_found("領収書"))?;

    // 自分のプレフィックス配下のキーであることを確認
    keys::validate_user_access(expense.user_id, &key)?;

    let url = state.storage.generate_presigned_url(&key, PRESIGN_EXPIRY).await?;

    Ok(response::json(
        StatusCode::OK,
        &ReceiptResponse {
            expense_id: id,
            receipt_key: key,
            url,
            expires_in: PRESIGN_EXPIRY.as_secs(),
        },
    ))
}

/// DELETE /api/expenses/{id}/receipt - 領収書の削除
pub async fn delete(
    state: &AppState,
    parts: &Parts,
    id: i64,
) -> AppResult<Response<Full<Bytes>>> {
    let expense = load_owned_expense(state, parts, id)?;

    let key = expense
        .receipt_key
        .ok_or_else(|| AppError::not_found("領収書"))?;

    // オブジェクトの削除はベストエフォート
    if let Err(e) = state.storage.delete_file(&key).await {
        log::warn!("領収書オブジェクトの削除に失敗しました: key={key}, {e}");
    }

    {
        let conn = state.db.lock().unwrap();
        expenses_repository::set_receipt_key(&conn, id, None)?;
    }

    log::info!("領収書を削除しました: expense_id={id}, key={key}");
    Ok(response::empty(StatusCode::NO_CONTENT))
}
