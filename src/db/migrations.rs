use anyhow::Context;
use rusqlite::Connection;

/// Ordered, embedded migrations. Embedding the SQL (instead of reading a
/// migrations directory) keeps `:memory:` databases in tests on the same
/// schema path as production files.
const MIGRATIONS: &[(&str, &str)] = &[
    (
        "001_create_shops",
        "CREATE TABLE IF NOT EXISTS shops (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            hours TEXT NOT NULL DEFAULT '{\"days\":[]}',
            bay_count INTEGER NOT NULL DEFAULT 1,
            slot_minutes INTEGER NOT NULL DEFAULT 60,
            auto_confirm INTEGER NOT NULL DEFAULT 0,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );",
    ),
    (
        "002_create_services",
        "CREATE TABLE IF NOT EXISTS services (
            id TEXT PRIMARY KEY,
            shop_id TEXT NOT NULL REFERENCES shops(id),
            name TEXT NOT NULL,
            duration_minutes INTEGER NOT NULL,
            price_cents INTEGER,
            created_at TEXT NOT NULL,
            UNIQUE (shop_id, name)
        );",
    ),
    (
        "003_create_bookings",
        "CREATE TABLE IF NOT EXISTS bookings (
            id TEXT PRIMARY KEY,
            shop_id TEXT NOT NULL REFERENCES shops(id),
            customer_name TEXT NOT NULL,
            customer_phone TEXT NOT NULL,
            customer_email TEXT,
            vehicle_registration TEXT,
            service_name TEXT NOT NULL,
            duration_minutes INTEGER NOT NULL,
            date TEXT NOT NULL,
            start_time TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            notes TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_bookings_shop_date ON bookings (shop_id, date);",
    ),
];

pub fn run_migrations(conn: &Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .context("failed to create migrations table")?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM _migrations WHERE name = ?1",
                [name],
                |row| row.get(0),
            )
            .context("failed to check migration status")?;

        if already_applied {
            continue;
        }

        conn.execute_batch(sql)
            .with_context(|| format!("failed to apply migration: {name}"))?;

        conn.execute("INSERT INTO _migrations (name) VALUES (?1)", [name])
            .with_context(|| format!("failed to record migration: {name}"))?;

        tracing::info!("applied migration: {name}");
    }

    Ok(())
}
