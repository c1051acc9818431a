use rusqlite::Connection;

const MIGRATIONS: &[&str] = &[
    // Migration 1: offers, profiles and the applications join table
    "CREATE TABLE IF NOT EXISTS flats (
        id TEXT PRIMARY KEY NOT NULL,
        company TEXT NOT NULL,
        rent TEXT,
        size TEXT,
        rooms INTEGER,
        wbs INTEGER,
        street TEXT,
        zip TEXT,
        district TEXT,
        expose_url TEXT,
        url TEXT UNIQUE NOT NULL,
        is_new INTEGER NOT NULL DEFAULT 1,
        applied INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS profiles (
        id TEXT PRIMARY KEY NOT NULL,
        gender TEXT NOT NULL,
        name TEXT NOT NULL,
        surname TEXT NOT NULL,
        email TEXT NOT NULL,
        phone TEXT NOT NULL,
        street TEXT NOT NULL,
        zip TEXT NOT NULL,
        city TEXT NOT NULL,
        min_rooms INTEGER NOT NULL,
        max_rooms INTEGER NOT NULL,
        wbs INTEGER NOT NULL DEFAULT 0,
        enabled INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    );

    CREATE TABLE IF NOT EXISTS flats_profiles (
        flat_id TEXT NOT NULL REFERENCES flats(id) ON DELETE CASCADE,
        profile_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
        created_at TEXT NOT NULL,
        PRIMARY KEY (flat_id, profile_id)
    );",
    // Migration 2: new-offer lookups per company
    "CREATE INDEX IF NOT EXISTS idx_flats_company_new ON flats (company, is_new, created_at);",
];

pub fn run_migrations(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS _migrations (version INTEGER PRIMARY KEY)")?;

    let current_version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |row| row.get(0),
    )?;

    for (i, sql) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i64;
        if version > current_version {
            conn.execute_batch(sql)?;
            conn.execute("INSERT INTO _migrations (version) VALUES (?1)", [version])?;
            tracing::info!("Applied migration {version}");
        }
    }

    Ok(())
}
