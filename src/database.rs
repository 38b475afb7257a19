use sqlx::{PgPool, Pool, Postgres};

pub type Database = Pool<Postgres>;

/// Columns the code depends on that were added after the initial schema.
/// Checked once at startup so a half-migrated database fails fast instead of
/// surfacing as per-request insert errors.
const SCHEMA_CONTRACT: &[(&str, &str)] = &[
    ("companies", "created_by"),
    ("products", "show_breakdown"),
    ("quotes", "version_of"),
    ("quotes", "cancelled_at"),
];

pub async fn create_database_pool(database_url: &str) -> Result<Database, sqlx::Error> {
    let pool = PgPool::connect(database_url).await?;

    // Test the connection
    sqlx::query("SELECT 1")
        .fetch_one(&pool)
        .await?;

    verify_schema_contract(&pool).await?;

    println!("Connected to database successfully!");
    Ok(pool)
}

async fn verify_schema_contract(pool: &Database) -> Result<(), sqlx::Error> {
    for (table, column) in SCHEMA_CONTRACT {
        let present = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM information_schema.columns WHERE table_name = $1 AND column_name = $2)",
        )
        .bind(table)
        .bind(column)
        .fetch_one(pool)
        .await?;

        if !present {
            return Err(sqlx::Error::Configuration(
                format!("schema is missing {}.{}; run pending migrations", table, column).into(),
            ));
        }
    }

    Ok(())
}
