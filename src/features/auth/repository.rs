use crate::features::auth::models::{RegisterRequest, User};
use crate::shared::errors::{AppError, AppResult};
use chrono::Utc;
use chrono_tz::Asia::Tokyo;
use rusqlite::{params, Connection};

/// 行からUser構造体を組み立てる
fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        email: row.get(3)?,
        first_name: row.get(4)?,
        last_name: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

/// ユーザーを作成する
///
/// username/emailの一意制約違反はバリデーションエラーとして返す。
pub fn create(conn: &Connection, req: &RegisterRequest, password_hash: &str) -> AppResult<User> {
    // JSTで現在時刻を取得
    let now = Utc::now().with_timezone(&Tokyo).to_rfc3339();

    let result = conn.execute(
        "INSERT INTO users (username, password_hash, email, first_name, last_name, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            req.username,
            password_hash,
            req.email,
            req.first_name,
            req.last_name,
            now,
            now
        ],
    );

    match result {
        Ok(_) => find_by_id(conn, conn.last_insert_rowid()),
        Err(e) if is_unique_violation(&e) => Err(AppError::validation(
            "ユーザー名またはメールアドレスは既に使用されています",
        )),
        Err(e) => Err(AppError::Database(e)),
    }
}

/// IDでユーザーを取得する
pub fn find_by_id(conn: &Connection, id: i64) -> AppResult<User> {
    conn.query_row(
        "SELECT id, username, password_hash, email, first_name, last_name, created_at, updated_at
         FROM users WHERE id = ?1",
        params![id],
        row_to_user,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => AppError::not_found("ユーザー"),
        _ => AppError::Database(e),
    })
}

/// ユーザー名でユーザーを取得する
pub fn find_by_username(conn: &Connection, username: &str) -> AppResult<User> {
    conn.query_row(
        "SELECT id, username, password_hash, email, first_name, last_name, created_at, updated_at
         FROM users WHERE username = ?1",
        params![username],
        row_to_user,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => AppError::not_found("ユーザー"),
        _ => AppError::Database(e),
    })
}

/// SQLiteの一意制約違反かどうかを判定する
fn is_unique_violation(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::database::connection::create_in_memory_connection;

    fn test_request(username: &str, email: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            password: "password123".to_string(),
            email: email.to_string(),
            first_name: "太郎".to_string(),
            last_name: "山田".to_string(),
        }
    }

    #[test]
    fn test_create_and_find_user() {
        let conn = create_in_memory_connection().unwrap();

        let user = create(&conn, &test_request("taro", "taro@example.com"), "hash").unwrap();
        assert_eq!(user.username, "taro");
        assert_eq!(user.email, "taro@example.com");
        assert_eq!(user.password_hash, "hash");

        let by_id = find_by_id(&conn, user.id).unwrap();
        assert_eq!(by_id.id, user.id);

        let by_name = find_by_username(&conn, "taro").unwrap();
        assert_eq!(by_name.id, user.id);
    }

    #[test]
    fn test_duplicate_username_is_validation_error() {
        let conn = create_in_memory_connection().unwrap();

        create(&conn, &test_request("taro", "taro@example.com"), "hash").unwrap();

        let result = create(&conn, &test_request("taro", "other@example.com"), "hash");
        assert!(matches!(result.unwrap_err(), AppError::Validation(_)));
    }

    #[test]
    fn test_duplicate_email_is_validation_error() {
        let conn = create_in_memory_connection().unwrap();

        create(&conn, &test_request("taro", "taro@example.com"), "hash").unwrap();

        let result = create(&conn, &test_request("jiro", "taro@example.com"), "hash");
        assert!(matches!(result.unwrap_err(), AppError::Validation(_)));
    }

    #[test]
    fn test_find_missing_user() {
        let conn = create_in_memory_connection().unwrap();

        assert!(matches!(
            find_by_id(&conn, 999).unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            find_by_username(&conn, "ghost").unwrap_err(),
            AppError::NotFound(_)
        ));
    }
}
