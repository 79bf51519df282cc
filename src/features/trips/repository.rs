use crate::features::trips::models::{CreateTripRequest, Trip, UpdateTripRequest};
use crate::shared::errors::{AppError, AppResult};
use chrono::Utc;
use chrono_tz::Asia::Tokyo;
use rusqlite::{params, Connection};

/// 行からTrip構造体を組み立てる
fn row_to_trip(row: &rusqlite::Row) -> rusqlite::Result<Trip> {
    Ok(Trip {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

/// 旅行を作成する
pub fn create(conn: &Connection, user_id: i64, req: &CreateTripRequest) -> AppResult<Trip> {
    // JSTで現在時刻を取得
    let now = Utc::now().with_timezone(&Tokyo).to_rfc3339();

    let result = conn.execute(
        "INSERT INTO trips (user_id, name, description, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![user_id, req.name, req.description, now, now],
    );

    match result {
        Ok(_) => find_by_id(conn, conn.last_insert_rowid()),
        Err(e) if is_unique_violation(&e) => {
            Err(AppError::validation("同名の旅行が既に存在します"))
        }
        Err(e) => Err(AppError::Database(e)),
    }
}

/// IDで旅行を取得する
pub fn find_by_id(conn: &Connection, id: i64) -> AppResult<Trip> {
    conn.query_row(
        "SELECT id, user_id, name, description, created_at, updated_at
         FROM trips WHERE id = ?1",
        params![id],
        row_to_trip,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => AppError::not_found("旅行"),
        _ => AppError::Database(e),
    })
}

/// ユーザーと旅行名で旅行を取得する
pub fn find_by_name(conn: &Connection, user_id: i64, name: &str) -> AppResult<Trip> {
    conn.query_row(
        "SELECT id, user_id, name, description, created_at, updated_at
         FROM trips WHERE user_id = ?1 AND name = ?2",
        params![user_id, name],
        row_to_trip,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => AppError::not_found("旅行"),
        _ => AppError::Database(e),
    })
}

/// ユーザーの旅行一覧を取得する
pub fn find_all_by_user(conn: &Connection, user_id: i64) -> AppResult<Vec<Trip>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, name, description, created_at, updated_at
         FROM trips WHERE user_id = ?1 ORDER BY created_at DESC",
    )?;

    let trips = stmt.query_map(params![user_id], row_to_trip)?;
    trips
        .collect::<Result<Vec<_>, _>>()
        .map_err(AppError::Database)
}

/// 旅行を部分更新する
///
/// 旅行名の変更は、その旅行に属する経費のtrip_nameにも同一トランザクション内で
/// 反映する。経費が (user_id, trip_name) で旅行を参照しているため。
pub fn update(conn: &mut Connection, id: i64, req: &UpdateTripRequest) -> AppResult<Trip> {
    // JSTで現在時刻を取得
    let now = Utc::now().with_timezone(&Tokyo).to_rfc3339();

    let tx = conn.transaction()?;

    let existing = find_by_id(&tx, id)?;
    let name = req.name.clone().unwrap_or_else(|| existing.name.clone());
    let description = req.description.clone().or_else(|| existing.description.clone());

    let result = tx.execute(
        "UPDATE trips SET name = ?1, description = ?2, updated_at = ?3 WHERE id = ?4",
        params![name, description, now, id],
    );

    match result {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            return Err(AppError::validation("同名の旅行が既に存在します"));
        }
        Err(e) => return Err(AppError::Database(e)),
    }

    // 旅行名の変更を経費へ伝播
    if name != existing.name {
        let moved = tx.execute(
            "UPDATE expenses SET trip_name = ?1, updated_at = ?2
             WHERE user_id = ?3 AND trip_name = ?4",
            params![name, now, existing.user_id, existing.name],
        )?;
        log::info!(
            "旅行名の変更を経費に反映しました: trip_id={id}, {}件",
            moved
        );
    }

    let updated = find_by_id(&tx, id)?;
    tx.commit()?;
    Ok(updated)
}

/// 旅行を所属する経費ごと削除する
///
/// 1トランザクションで「旅行の取得 → 経費の削除 → 旅行行の削除」を行い、
/// 途中で失敗した場合は全体をロールバックする。
///
/// # 戻り値
/// 一緒に削除された経費の件数
pub fn delete_with_expenses(conn: &mut Connection, id: i64) -> AppResult<usize> {
    let tx = conn.transaction()?;

    let trip = find_by_id(&tx, id)?;

    let removed_expenses = tx.execute(
        "DELETE FROM expenses WHERE user_id = ?1 AND trip_name = ?2",
        params![trip.user_id, trip.name],
    )?;

    let affected = tx.execute("DELETE FROM trips WHERE id = ?1", params![id])?;
    if affected == 0 {
        return Err(AppError::not_found("旅行"));
    }

    tx.commit()?;

    log::info!(
        "旅行を削除しました: trip_id={id}, 経費{removed_expenses}件も削除"
    );
    Ok(removed_expenses)
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

    fn create_request(name: &str) -> CreateTripRequest {
        CreateTripRequest {
            name: name.to_string(),
            description: Some("テスト旅行".to_string()),
        }
    }

    fn insert_expense(conn: &Connection, user_id: i64, trip_name: &str) -> i64 {
        conn.execute(
            "INSERT INTO expenses (user_id, category, date, vendor, location, cost, trip_name, created_at, updated_at)
             VALUES (?1, '交通費', '2024-01-01', 'JR', '東京', 1000.0, ?2, 'now', 'now')",
            params![user_id, trip_name],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    #[test]
    fn test_trip_crud() {
        let mut conn = create_in_memory_connection().unwrap();

        let trip = create(&conn, 1, &create_request("大阪出張")).unwrap();
        assert_eq!(trip.name, "大阪出張");
        assert_eq!(trip.user_id, 1);

        let found = find_by_id(&conn, trip.id).unwrap();
        assert_eq!(found.id, trip.id);

        let updated = update(
            &mut conn,
            trip.id,
            &UpdateTripRequest {
                name: None,
                description: Some("更新済み".to_string()),
            },
        )
        .unwrap();
        assert_eq!(updated.name, "大阪出張");
        assert_eq!(updated.description, Some("更新済み".to_string()));

        let all = find_all_by_user(&conn, 1).unwrap();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn test_duplicate_name_per_user() {
        let conn = create_in_memory_connection().unwrap();

        create(&conn, 1, &create_request("出張")).unwrap();

        // 同一ユーザーの同名旅行は拒否
        let result = create(&conn, 1, &create_request("出張"));
        assert!(matches!(result.unwrap_err(), AppError::Validation(_)));

        // 別ユーザーなら同名でも作成できる
        assert!(create(&conn, 2, &create_request("出張")).is_ok());
    }

    #[test]
    fn test_rename_propagates_to_expenses() {
        let mut conn = create_in_memory_connection().unwrap();

        let trip = create(&conn, 1, &create_request("旧名")).unwrap();
        insert_expense(&conn, 1, "旧名");
        insert_expense(&conn, 1, "旧名");
        // 別ユーザーの同名経費は対象外
        insert_expense(&conn, 2, "旧名");

        update(
            &mut conn,
            trip.id,
            &UpdateTripRequest {
                name: Some("新名".to_string()),
                description: None,
            },
        )
        .unwrap();

        let moved: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM expenses WHERE user_id = 1 AND trip_name = '新名'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(moved, 2);

        // 別ユーザーの経費は変更されない
        let untouched: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM expenses WHERE user_id = 2 AND trip_name = '旧名'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(untouched, 1);
    }

    #[test]
    fn test_delete_cascades_only_own_expenses() {
        let mut conn = create_in_memory_connection().unwrap();

        let trip = create(&conn, 1, &create_request("出張")).unwrap();
        insert_expense(&conn, 1, "出張");
        insert_expense(&conn, 1, "出張");
        // 同名だが別ユーザーの経費と、同一ユーザーの別旅行の経費
        insert_expense(&conn, 2, "出張");
        insert_expense(&conn, 1, "別の旅行");

        let removed = delete_with_expenses(&mut conn, trip.id).unwrap();
        assert_eq!(removed, 2);

        // 旅行本体が消えていること
        assert!(matches!(
            find_by_id(&conn, trip.id).unwrap_err(),
            AppError::NotFound(_)
        ));

        // 残るべき経費はちょうど2件
        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM expenses", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 2);
    }

    #[test]
    fn test_delete_missing_trip() {
        let mut conn = create_in_memory_connection().unwrap();

        let result = delete_with_expenses(&mut conn, 999);
        assert!(matches!(result.unwrap_err(), AppError::NotFound(_)));
    }
}
