use crate::features::auth::models::{LoginRequest, RegisterRequest, User, UserResponse};
use crate::features::auth::{password, repository};
use crate::server::{request, response};
use crate::shared::config::environment::Environment;
use crate::shared::errors::{AppError, AppResult};
use crate::AppState;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::http::request::Parts;
use hyper::{Response, StatusCode};
use once_cell::sync::Lazy;
use regex::Regex;

/// セッションCookie名
pub const SESSION_COOKIE: &str = "session";

/// セッションCookieの有効期間（秒）
const SESSION_COOKIE_MAX_AGE: i64 = 30 * 24 * 60 * 60;

static USERNAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]{3,32}$").expect("ユーザー名パターンが不正"));

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("メールパターンが不正"));

/// リクエストを認証し、ログイン中のユーザーを返す
///
/// Cookieのセッショントークンを検証し、復号失敗・期限切れ・未登録は
/// すべて401として扱う。
pub fn authenticate(state: &AppState, parts: &Parts) -> AppResult<User> {
    let token = request::cookie_value(parts, SESSION_COOKIE).ok_or_else(|| {
        log::debug!(
            "セッションCookieがありません: path={}",
            parts.uri.path()
        );
        AppError::unauthorized("セッションCookieがありません")
    })?;

    let session = state.sessions.validate_session(&token)?;

    let conn = state.db.lock().unwrap();
    repository::find_by_id(&conn, session.user_id).map_err(|e| match e {
        // セッションは有効だがユーザーが消えている場合も認証エラー扱い
        AppError::NotFound(_) => AppError::unauthorized("ユーザーが存在しません"),
        e => e,
    })
}

/// 所有者チェック（他ユーザーのリソースへのアクセスは403）
pub fn ensure_owner(user: &User, resource_user_id: i64, resource: &str) -> AppResult<()> {
    if user.id != resource_user_id {
        log::warn!(
            "他ユーザーのリソースへのアクセスを拒否: user_id={}, resource={resource}, owner={resource_user_id}",
            user.id
        );
        return Err(AppError::forbidden(format!(
            "{resource}の所有者が一致しません"
        )));
    }
    Ok(())
}

/// POST /api/users - ユーザー登録
pub fn register(state: &AppState, body: &Bytes) -> AppResult<Response<Full<Bytes>>> {
    let req: RegisterRequest = request::parse_json(body)?;

    if !USERNAME_PATTERN.is_match(&req.username) {
        return Err(AppError::validation(
            "ユーザー名は3〜32文字の英数字とアンダースコアのみ使用できます",
        ));
    }
    if !EMAIL_PATTERN.is_match(&req.email) {
        return Err(AppError::validation("メールアドレスの形式が不正です"));
    }
    if req.first_name.trim().is_empty() || req.last_name.trim().is_empty() {
        return Err(AppError::validation("氏名は必須です"));
    }
    password::validate_password(&req.password)?;

    let password_hash = password::hash_password(&req.password)?;

    let user = {
        let conn = state.db.lock().unwrap();
        repository::create(&conn, &req, &password_hash)?
    };

    log::info!("ユーザーを登録しました: user_id={}, username={}", user.id, user.username);
    Ok(response::json(StatusCode::CREATED, &UserResponse::from(&user)))
}

/// POST /api/session - ログイン
pub fn login(state: &AppState, body: &Bytes) -> AppResult<Response<Full<Bytes>>> {
    let req: LoginRequest = request::parse_json(body)?;

    let user = {
        let conn = state.db.lock().unwrap();
        match repository::find_by_username(&conn, &req.username) {
            Ok(user) => user,
            Err(AppError::NotFound(_)) => {
                // ユーザーの存在有無を漏らさない
                return Err(AppError::unauthorized(
                    "ユーザー名またはパスワードが正しくありません",
                ));
            }
            Err(e) => return Err(e),
        }
    };

    if !password::verify_password(&req.password, &user.password_hash)? {
        log::warn!("パスワード照合に失敗しました: username={}", req.username);
        return Err(AppError::unauthorized(
            "ユーザー名またはパスワードが正しくありません",
        ));
    }

    // ついでに期限切れセッションを掃除する（失敗しても続行）
    if let Err(e) = state.sessions.cleanup_expired_sessions() {
        log::warn!("期限切れセッションの削除に失敗しました: {e}");
    }

    let (_, token) = state.sessions.create_session(user.id)?;

    let mut cookie = format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={SESSION_COOKIE_MAX_AGE}"
    );
    // プロダクションではHTTPS経由以外でCookieを送らせない
    if state.environment == Environment::Production {
        cookie.push_str("; Secure");
    }
    Ok(response::json_with_cookie(
        StatusCode::OK,
        &UserResponse::from(&user),
        &cookie,
    ))
}

/// DELETE /api/session - ログアウト
pub fn logout(state: &AppState, parts: &Parts) -> AppResult<Response<Full<Bytes>>> {
    let token = request::cookie_value(parts, SESSION_COOKIE)
        .ok_or_else(|| AppError::unauthorized("セッションCookieがありません"))?;

    // 壊れたトークンでもCookieは破棄させる
    if let Err(e) = state.sessions.invalidate_by_token(&token) {
        log::warn!("ログアウト時のセッション無効化に失敗しました: {e}");
    }

    let mut response = response::empty(StatusCode::NO_CONTENT);
    let mut clear_cookie = format!("{SESSION_COOKIE}=; Path=/; HttpOnly; Max-Age=0");
    if state.environment == Environment::Production {
        clear_cookie.push_str("; Secure");
    }
    match clear_cookie.parse() {
        Ok(value) => {
            response
                .headers_mut()
                .insert(hyper::header::SET_COOKIE, value);
        }
        Err(e) => log::error!("Cookie破棄ヘッダーの構築に失敗しました: {e}"),
    }
    Ok(response)
}

/// GET /api/session - ログイン中のユーザー情報
pub fn current_user(state: &AppState, parts: &Parts) -> AppResult<Response<Full<Bytes>>> {
    let user = authenticate(state, parts)?;
    Ok(response::json(StatusCode::OK, &UserResponse::from(&user)))
}
