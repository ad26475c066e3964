// File: gradlink-core/src/test_utils/helpers.rs

use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Connection, PgConnection, Pool, Postgres, Row};

use gradlink_common::models::{User, UserType};

use crate::db::Database;
use crate::Error;

/// Create the test database if it does not exist yet.
pub async fn ensure_test_database_exists() -> Result<(), Error> {
    let admin_url = std::env::var("DATABASE_ADMIN_URL")
        .unwrap_or_else(|_| "postgres://gradlink@localhost/postgres".to_string());

    let mut conn = PgConnection::connect(&admin_url).await?;

    let test_db = "gradlink_test";
    let create_db_sql = format!("CREATE DATABASE {test_db};");
    match sqlx::query(&create_db_sql).execute(&mut conn).await {
        Ok(_) => {
            println!("Created test DB '{test_db}'.");
        }
        Err(e) => {
            // 42P04 => "duplicate_database"
            if let Some(db_err) = e.as_database_error() {
                if db_err.code().as_deref() == Some("42P04") {
                    println!("Test DB '{test_db}' already exists; ignoring.");
                } else {
                    return Err(Error::Database(e));
                }
            } else {
                return Err(Error::Database(e));
            }
        }
    }

    Ok(())
}

/// Create a connection pool to the test DB.
/// By default looks for `TEST_DATABASE_URL` in env,
/// else uses `postgres://gradlink@localhost/gradlink_test`.
pub async fn create_test_db_pool() -> Result<Pool<Postgres>, Error> {
    let url = std::env::var("TEST_DATABASE_URL")
        .unwrap_or_else(|_| "postgres://gradlink@localhost/gradlink_test".to_string());

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await?;

    Ok(pool)
}

/// Wipes out test data so each test can start fresh.
pub async fn clean_database(pool: &Pool<Postgres>) -> Result<(), Error> {
    sqlx::query(
        r#"
        TRUNCATE TABLE
            chat_reports,
            user_blocks,
            user_presence,
            messages,
            chats,
            users
        RESTART IDENTITY CASCADE;
    "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Returns a migrated, empty test DB handle.
pub async fn setup_test_database() -> Result<Database, Error> {
    ensure_test_database_exists().await?;

    let pool = create_test_db_pool().await?;
    let db = Database::from_pool(pool);
    db.migrate().await?;
    clean_database(db.pool()).await?;

    Ok(db)
}

/// Insert a directory user and return it.
pub async fn seed_user(
    pool: &Pool<Postgres>,
    display_name: &str,
    user_type: UserType,
) -> Result<User, Error> {
    let row = sqlx::query(
        r#"
        INSERT INTO users (display_name, user_type)
        VALUES ($1, $2)
        RETURNING user_id
        "#,
    )
    .bind(display_name)
    .bind(user_type.as_str())
    .fetch_one(pool)
    .await?;

    Ok(User {
        user_id: row.try_get("user_id")?,
        display_name: display_name.to_string(),
        user_type,
        is_active: true,
        created_at: Utc::now(),
    })
}
