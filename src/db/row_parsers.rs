use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::rbac::{Action, Group, Permission, Role};
use crate::models::user::{DbUser, UserStatus};

pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, AppError> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // sqlx writes "YYYY-MM-DD HH:MM:SS.f+00:00", SQLite's own default has no offset
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    if let Ok(naive_date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let ndt = naive_date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| AppError::internal("invalid datetime: date out of range"))?;
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    Err(AppError::internal(format!("invalid datetime: {}", s)))
}

pub fn parse_uuid(s: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(s.trim()).map_err(|e| AppError::internal(format!("invalid uuid '{}': {}", s, e)))
}

fn get<'r, T>(row: &'r SqliteRow, column: &str) -> Result<T, AppError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(column)
        .map_err(|e| AppError::internal(format!("missing {}: {}", column, e)))
}

fn get_uuid(row: &SqliteRow, column: &str) -> Result<Uuid, AppError> {
    let s: String = get(row, column)?;
    parse_uuid(&s)
}

fn get_opt_uuid(row: &SqliteRow, column: &str) -> Result<Option<Uuid>, AppError> {
    let s: Option<String> = get(row, column)?;
    s.as_deref().map(parse_uuid).transpose()
}

fn get_datetime(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>, AppError> {
    let s: String = get(row, column)?;
    parse_datetime(&s)
}

fn get_action(row: &SqliteRow, column: &str) -> Result<Action, AppError> {
    let s: String = get(row, column)?;
    s.parse()
        .map_err(|_| AppError::internal(format!("invalid action in {}: {}", column, s)))
}

pub fn permission_from_row(row: &SqliteRow) -> Result<Permission, AppError> {
    Ok(Permission {
        id: get_uuid(row, "id")?,
        name: get(row, "name")?,
        resource: get(row, "resource")?,
        action: get_action(row, "action")?,
        description: get(row, "description")?,
        created_at: get_datetime(row, "created_at")?,
        updated_at: get_datetime(row, "updated_at")?,
    })
}

pub fn role_from_row(row: &SqliteRow) -> Result<Role, AppError> {
    Ok(Role {
        id: get_uuid(row, "id")?,
        name: get(row, "name")?,
        description: get(row, "description")?,
        created_at: get_datetime(row, "created_at")?,
        updated_at: get_datetime(row, "updated_at")?,
    })
}

pub fn group_from_row(row: &SqliteRow) -> Result<Group, AppError> {
    Ok(Group {
        id: get_uuid(row, "id")?,
        name: get(row, "name")?,
        description: get(row, "description")?,
        is_admin: get(row, "is_admin")?,
        created_at: get_datetime(row, "created_at")?,
        updated_at: get_datetime(row, "updated_at")?,
    })
}

pub fn db_user_from_row(row: &SqliteRow) -> Result<DbUser, AppError> {
    let status_s: String = get(row, "status")?;
    let status: UserStatus = status_s
        .parse()
        .map_err(|_| AppError::internal(format!("invalid user status: {}", status_s)))?;

    Ok(DbUser {
        id: get_uuid(row, "id")?,
        email: get(row, "email")?,
        password_hash: get(row, "password_hash")?,
        name: get(row, "name")?,
        status,
        is_admin: get(row, "is_admin")?,
        group_id: get_opt_uuid(row, "group_id")?,
        created_at: get_datetime(row, "created_at")?,
        updated_at: get_datetime(row, "updated_at")?,
    })
}

/// Access-graph row: user columns are always present, the rest is NULL past
/// the first missing hop of the LEFT JOIN chain.
#[derive(Debug)]
pub struct AccessRow {
    pub user_id: Uuid,
    pub user_is_admin: bool,
    pub group: Option<(Uuid, String, bool)>,
    pub role: Option<(Uuid, String)>,
    pub permission: Option<Permission>,
}

pub fn access_row_from_row(row: &SqliteRow) -> Result<AccessRow, AppError> {
    let group = match get_opt_uuid(row, "group_id")? {
        Some(id) => Some((id, get(row, "group_name")?, get(row, "group_is_admin")?)),
        None => None,
    };

    let role = match get_opt_uuid(row, "role_id")? {
        Some(id) => Some((id, get(row, "role_name")?)),
        None => None,
    };

    let permission = match get_opt_uuid(row, "permission_id")? {
        Some(id) => Some(Permission {
            id,
            name: get(row, "permission_name")?,
            resource: get(row, "permission_resource")?,
            action: get_action(row, "permission_action")?,
            description: get(row, "permission_description")?,
            created_at: get_datetime(row, "permission_created_at")?,
            updated_at: get_datetime(row, "permission_updated_at")?,
        }),
        None => None,
    };

    Ok(AccessRow {
        user_id: get_uuid(row, "user_id")?,
        user_is_admin: get(row, "user_is_admin")?,
        group,
        role,
        permission,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rfc3339_and_sqlite_formats() {
        assert!(parse_datetime("2025-11-19T12:34:56Z").is_ok());
        assert!(parse_datetime("2025-11-19 12:34:56.123456+00:00").is_ok());
        assert!(parse_datetime("2025-11-19 12:34:56").is_ok());
        assert!(parse_datetime("2025-11-19").is_ok());
        assert!(parse_datetime("yesterday").is_err());
    }

    #[test]
    fn bad_uuid_is_an_internal_error() {
        assert!(matches!(parse_uuid("nope"), Err(AppError::Internal(_))));
    }
}
