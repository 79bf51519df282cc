use crate::features::auth::handlers::{authenticate, ensure_owner};
use crate::features::expenses::models::{self, CreateExpenseRequest, UpdateExpenseRequest};
use crate::features::expenses::repository;
use crate::features::trips;
use crate::server::{request, response};
use crate::shared::errors::{AppError, AppResult};
use crate::AppState;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::http::request::Parts;
use hyper::{Response, StatusCode};

/// GET /api/expenses - 自分の経費一覧（trip / month / category で絞り込み可能）
pub fn list(state: &AppState, parts: &Parts) -> AppResult<Response<Full<Bytes>>> {
    let user = authenticate(state, parts)?;

    let trip = request::query_param(parts, "trip");
    let month = request::query_param(parts, "month");
    let category = request::query_param(parts, "category");

    if let Some(m) = &month {
        models::validate_month(m)?;
    }

    let expenses = {
        let conn = state.db.lock().unwrap();
        repository::find_all(
            &conn,
            user.id,
            trip.as_deref(),
            month.as_deref(),
            category.as_deref(),
        )?
    };

    Ok(response::json(StatusCode::OK, &expenses))
}

/// POST /api/expenses - 経費の作成
pub fn create(state: &AppState, parts: &Parts, body: &Bytes) -> AppResult<Response<Full<Bytes>>> {
    let user = authenticate(state, parts)?;
    let req: CreateExpenseRequest = request::parse_json(body)?;
    req.validate()?;

    let expense = {
        let conn = state.db.lock().unwrap();

        // 参照先の旅行が存在することを確認する
        match trips::repository::find_by_name(&conn, user.id, &req.trip_name) {
            Ok(_) => {}
            Err(AppError::NotFound(_)) => {
                return Err(AppError::validation(format!(
                    "旅行が存在しません: {}",
                    req.trip_name
                )));
            }
            Err(e) => return Err(e),
        }

        repository::create(&conn, user.id, &req)?
    };

    log::info!(
        "経費を作成しました: expense_id={}, user_id={}, trip={}",
        expense.id,
        user.id,
        expense.trip_name
    );
    Ok(response::json(StatusCode::CREATED, &expense))
}

/// GET /api/expenses/{id} - 経費の取得
pub fn get(state: &AppState, parts: &Parts, id: i64) -> AppResult<Response<Full<Bytes>>> {
    let user = authenticate(state, parts)?;

    let expense = {
        let conn = state.db.lock().unwrap();
        repository::find_by_id(&conn, id)?
    };
    ensure_owner(&user, expense.user_id, "経費")?;

    Ok(response::json(StatusCode::OK, &expense))
}

/// PUT /api/expenses/{id} - 経費の部分更新
pub fn update(
    state: &AppState,
    parts: &Parts,
    id: i64,
    body: &Bytes,
) -> AppResult<Response<Full<Bytes>>> {
    let user = authenticate(state, parts)?;
    let req: UpdateExpenseRequest = request::parse_json(body)?;
    req.validate()?;

    let updated = {
        let conn = state.db.lock().unwrap();
        let expense = repository::find_by_id(&conn, id)?;
        ensure_owner(&user, expense.user_id, "経費")?;

        // 付け替え先の旅行が存在することを確認する
        if let Some(trip_name) = &req.trip_name {
            match trips::repository::find_by_name(&conn, user.id, trip_name) {
                Ok(_) => {}
                Err(AppError::NotFound(_)) => {
                    return Err(AppError::validation(format!(
                        "旅行が存在しません: {trip_name}"
                    )));
                }
                Err(e) => return Err(e),
            }
        }

        repository::update(&conn, id, &req)?
    };

    Ok(response::json(StatusCode::OK, &updated))
}

/// DELETE /api/expenses/{id} - 経費の削除
///
/// 領収書が残っている場合はオブジェクトもベストエフォートで削除する
/// （失敗してもログのみで、経費の削除自体は成功させる）。
pub async fn delete(state: &AppState, parts: &Parts, id: i64) -> AppResult<Response<Full<Bytes>>> {
    let user = authenticate(state, parts)?;

    let receipt_key = {
        let conn = state.db.lock().unwrap();
        let expense = repository::find_by_id(&conn, id)?;
        ensure_owner(&user, expense.user_id, "経費")?;
        repository::delete(&conn, id)?;
        expense.receipt_key
    };

    if let Some(key) = receipt_key {
        if let Err(e) = state.storage.delete_file(&key).await {
            log::warn!("経費削除に伴う領収書オブジェクトの削除に失敗しました: key={key}, {e}");
        }
    }

    Ok(response::empty(StatusCode::NO_CONTENT))
}
