//! User account query operations.

use chrono::Utc;
use rusqlite::{params, Connection};
use vidmill_common::{Error, Result, UserId};

use crate::models::User;
use crate::queries::{parse_ts, parse_uuid};

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: UserId::from(parse_uuid(0, &row.get::<_, String>(0)?)?),
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        is_admin: row.get(4)?,
        created_at: parse_ts(5, &row.get::<_, String>(5)?)?,
    })
}

const USER_COLUMNS: &str = "id, username, email, password_hash, is_admin, created_at";

/// Create a new user. Duplicate usernames or emails are a conflict.
pub fn create_user(
    conn: &Connection,
    username: &str,
    email: &str,
    password_hash: &str,
    is_admin: bool,
) -> Result<User> {
    let user = User {
        id: UserId::new(),
        username: username.to_string(),
        email: email.to_string(),
        password_hash: password_hash.to_string(),
        is_admin,
        created_at: Utc::now(),
    };

    conn.execute(
        "INSERT INTO users (id, username, email, password_hash, is_admin, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
        params![
            user.id.to_string(),
            user.username,
            user.email,
            user.password_hash,
            user.is_admin,
            user.created_at.to_rfc3339(),
        ],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Error::conflict("Username or email already exists")
        }
        _ => Error::database(e.to_string()),
    })?;

    // Every account starts with a default preferences row.
    conn.execute(
        "INSERT INTO user_preferences (user_id) VALUES (?)",
        [user.id.to_string()],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(user)
}

/// Get a user by ID.
pub fn get_user(conn: &Connection, id: UserId) -> Result<User> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS),
        [id.to_string()],
        user_from_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => Error::not_found("user"),
        _ => Error::database(e.to_string()),
    })
}

/// Get a user by username.
pub fn get_by_username(conn: &Connection, username: &str) -> Result<User> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE username = ?", USER_COLUMNS),
        [username],
        user_from_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => Error::not_found("user"),
        _ => Error::database(e.to_string()),
    })
}

/// Total number of user accounts.
pub fn count_users(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
        .map_err(|e| Error::database(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;

    #[test]
    fn test_create_and_get_user() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let user = create_user(&conn, "alice", "alice@example.com", "hash", false).unwrap();
        assert!(!user.is_admin);

        let fetched = get_user(&conn, user.id).unwrap();
        assert_eq!(fetched, user);

        let by_name = get_by_username(&conn, "alice").unwrap();
        assert_eq!(by_name.id, user.id);
    }

    #[test]
    fn test_duplicate_username_is_conflict() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        create_user(&conn, "bob", "bob@example.com", "hash", false).unwrap();
        let err = create_user(&conn, "bob", "bob2@example.com", "hash", false).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn test_unknown_user_is_not_found() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        assert!(matches!(
            get_by_username(&conn, "nobody"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_count_users() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        assert_eq!(count_users(&conn).unwrap(), 0);
        create_user(&conn, "a", "a@example.com", "h", true).unwrap();
        assert_eq!(count_users(&conn).unwrap(), 1);
    }
}
