use crate::features::expenses::models::{CreateExpenseRequest, Expense, UpdateExpenseRequest};
use crate::shared::errors::{AppError, AppResult};
use chrono::Utc;
use chrono_tz::Asia::Tokyo;
use rusqlite::{params, Connection};

const EXPENSE_COLUMNS: &str =
    "id, user_id, category, date, vendor, location, cost, trip_name, receipt_key, comments, created_at, updated_at";

/// 行からExpense構造体を組み立てる
fn row_to_expense(row: &rusqlite::Row) -> rusqlite::Result<Expense> {
    Ok(Expense {
        id: row.get(0)?,
        user_id: row.get(1)?,
        category: row.get(2)?,
        date: row.get(3)?,
        vendor: row.get(4)?,
        location: row.get(5)?,
        cost: row.get(6)?,
        trip_name: row.get(7)?,
        receipt_key: row.get(8)?,
        comments: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

/// 経費を作成する
pub fn create(conn: &Connection, user_id: i64, req: &CreateExpenseRequest) -> AppResult<Expense> {
    // JSTで現在時刻を取得
    let now = Utc::now().with_timezone(&Tokyo).to_rfc3339();

    conn.execute(
        "INSERT INTO expenses (user_id, category, date, vendor, location, cost, trip_name, receipt_key, comments, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, ?8, ?9, ?10)",
        params![
            user_id,
            req.category,
            req.date,
            req.vendor,
            req.location,
            req.cost,
            req.trip_name,
            req.comments,
            now,
            now
        ],
    )?;

    find_by_id(conn, conn.last_insert_rowid())
}

/// IDで経費を取得する
pub fn find_by_id(conn: &Connection, id: i64) -> AppResult<Expense> {
    conn.query_row(
        &format!("SELECT {EXPENSE_COLUMNS} FROM expenses WHERE id = ?1"),
        params![id],
        row_to_expense,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => AppError::not_found("経費"),
        _ => AppError::Database(e),
    })
}

/// 経費一覧を取得する（旅行・月・費目でフィルタリング可能）
///
/// # 引数
/// * `trip_name` - 旅行名フィルター（オプション）
/// * `month` - 月フィルター（YYYY-MM形式、オプション）
/// * `category` - 費目フィルター（オプション）
pub fn find_all(
    conn: &Connection,
    user_id: i64,
    trip_name: Option<&str>,
    month: Option<&str>,
    category: Option<&str>,
) -> AppResult<Vec<Expense>> {
    let mut query = format!("SELECT {EXPENSE_COLUMNS} FROM expenses WHERE user_id = ?");
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(user_id)];

    // 旅行名フィルター
    if let Some(t) = trip_name {
        query.push_str(" AND trip_name = ?");
        params.push(Box::new(t.to_string()));
    }

    // 月フィルター
    if let Some(m) = month {
        query.push_str(" AND date LIKE ?");
        params.push(Box::new(format!("{m}%")));
    }

    // 費目フィルター
    if let Some(c) = category {
        query.push_str(" AND category = ?");
        params.push(Box::new(c.to_string()));
    }

    query.push_str(" ORDER BY date DESC, id DESC");

    let mut stmt = conn.prepare(&query)?;
    let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

    let expenses = stmt.query_map(param_refs.as_slice(), row_to_expense)?;
    expenses
        .collect::<Result<Vec<_>, _>>()
        .map_err(AppError::Database)
}

/// 経費を部分更新する
pub fn update(conn: &Connection, id: i64, req: &UpdateExpenseRequest) -> AppResult<Expense> {
    // JSTで現在時刻を取得
    let now = Utc::now().with_timezone(&Tokyo).to_rfc3339();

    // 既存の経費を取得し、指定されたフィールドのみ差し替える
    let existing = find_by_id(conn, id)?;
    let category = req.category.clone().unwrap_or(existing.category);
    let date = req.date.clone().unwrap_or(existing.date);
    let vendor = req.vendor.clone().unwrap_or(existing.vendor);
    let location = req.location.clone().or(existing.location);
    let cost = req.cost.unwrap_or(existing.cost);
    let trip_name = req.trip_name.clone().unwrap_or(existing.trip_name);
    let comments = req.comments.clone().or(existing.comments);

    conn.execute(
        "UPDATE expenses SET category = ?1, date = ?2, vendor = ?3, location = ?4, cost = ?5, trip_name = ?6, comments = ?7, updated_at = ?8
         WHERE id = ?9",
        params![category, date, vendor, location, cost, trip_name, comments, now, id],
    )?;

    find_by_id(conn, id)
}

/// 経費を削除する
pub fn delete(conn: &Connection, id: i64) -> AppResult<()> {
    let affected_rows = conn.execute("DELETE FROM expenses WHERE id = ?1", params![id])?;

    if affected_rows == 0 {
        return Err(AppError::not_found("経費"));
    }

    Ok(())
}

/// 経費に領収書キーを設定する（Noneでクリア）
pub fn set_receipt_key(conn: &Connection, id: i64, receipt_key: Option<&str>) -> AppResult<Expense> {
    // JSTで現在時刻を取得
    let now = Utc::now().with_timezone(&Tokyo).to_rfc3339();

    let affected_rows = conn.execute(
        "UPDATE expenses SET receipt_key = ?1, updated_at = ?2 WHERE id = ?3",
        params![receipt_key, now, id],
    )?;

    if affected_rows == 0 {
        return Err(AppError::not_found("経費"));
    }

    find_by_id(conn, id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::database::connection::create_in_memory_connection;

    fn create_request(trip_name: &str, date: &str, category: &str) -> CreateExpenseRequest {
        CreateExpenseRequest {
            category: category.to_string(),
            date: date.to_string(),
            vendor: "JR東日本".to_string(),
            location: Some("東京".to_string()),
            cost: 1320.0,
            trip_name: trip_name.to_string(),
            comments: None,
        }
    }

    #[test]
    fn test_expense_crud() {
        let conn = create_in_memory_connection().unwrap();

        let expense = create(&conn, 1, &create_request("出張", "2024-01-10", "交通費")).unwrap();
        assert_eq!(expense.cost, 1320.0);
        assert_eq!(expense.trip_name, "出張");
        assert_eq!(expense.receipt_key, None);

        let found = find_by_id(&conn, expense.id).unwrap();
        assert_eq!(found.id, expense.id);

        let updated = update(
            &conn,
            expense.id,
            &UpdateExpenseRequest {
                category: None,
                date: None,
                vendor: None,
                location: None,
                cost: Some(2500.0),
                trip_name: None,
                comments: Some("領収書あり".to_string()),
            },
        )
        .unwrap();
        assert_eq!(updated.cost, 2500.0);
        assert_eq!(updated.comments, Some("領収書あり".to_string()));
        // 未指定フィールドは保持される
        assert_eq!(updated.vendor, "JR東日本");
        assert_eq!(updated.trip_name, "出張");

        // 別の旅行への付け替え
        let moved = update(
            &conn,
            expense.id,
            &UpdateExpenseRequest {
                category: None,
                date: None,
                vendor: None,
                location: None,
                cost: None,
                trip_name: Some("帰省".to_string()),
                comments: None,
            },
        )
        .unwrap();
        assert_eq!(moved.trip_name, "帰省");
        assert_eq!(moved.cost, 2500.0);

        delete(&conn, expense.id).unwrap();
        assert!(find_by_id(&conn, expense.id).is_err());
    }

    #[test]
    fn test_filtering() {
        let conn = create_in_memory_connection().unwrap();

        create(&conn, 1, &create_request("出張", "2024-01-10", "交通費")).unwrap();
        create(&conn, 1, &create_request("出張", "2024-01-20", "宿泊費")).unwrap();
        create(&conn, 1, &create_request("帰省", "2024-02-05", "交通費")).unwrap();
        // 別ユーザーの経費は一覧に含まれない
        create(&conn, 2, &create_request("出張", "2024-01-10", "交通費")).unwrap();

        let all = find_all(&conn, 1, None, None, None).unwrap();
        assert_eq!(all.len(), 3);

        let by_trip = find_all(&conn, 1, Some("出張"), None, None).unwrap();
        assert_eq!(by_trip.len(), 2);

        let by_month = find_all(&conn, 1, None, Some("2024-01"), None).unwrap();
        assert_eq!(by_month.len(), 2);

        let by_category = find_all(&conn, 1, None, None, Some("交通費")).unwrap();
        assert_eq!(by_category.len(), 2);

        let combined = find_all(&conn, 1, Some("出張"), Some("2024-01"), Some("宿泊費")).unwrap();
        assert_eq!(combined.len(), 1);

        // 日付降順に並ぶこと
        assert_eq!(all[0].date, "2024-02-05");
    }

    #[test]
    fn test_receipt_key_roundtrip() {
        let conn = create_in_memory_connection().unwrap();

        let expense = create(&conn, 1, &create_request("出張", "2024-01-10", "交通費")).unwrap();

        let with_key =
            set_receipt_key(&conn, expense.id, Some("user_1/1700000000_receipt.pdf")).unwrap();
        assert_eq!(
            with_key.receipt_key.as_deref(),
            Some("user_1/1700000000_receipt.pdf")
        );

        let cleared = set_receipt_key(&conn, expense.id, None).unwrap();
        assert_eq!(cleared.receipt_key, None);
    }

    #[test]
    fn test_not_found_errors() {
        let conn = create_in_memory_connection().unwrap();

        assert!(matches!(
            find_by_id(&conn, 999).unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            delete(&conn, 999).unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            set_receipt_key(&conn, 999, None).unwrap_err(),
            AppError::NotFound(_)
        ));
    }
}
