//! Idempotent schema bootstrap for the embedded store.
//!
//! Every statement is `CREATE ... IF NOT EXISTS`; an existing table is never
//! altered, so an incompatible pre-existing schema shows up as statement
//! errors at first use.

use rusqlite::{params, Connection};

use crate::config::SeedAdmin;

/// Tables that make up the site schema, in dependency order.
pub const TABLES: &[&str] = &[
    "allowed_emails",
    "users",
    "blogs",
    "resources",
    "authors",
    "carousel_images",
];

/// DDL for the site schema, in execution order.
pub const STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS allowed_emails (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT UNIQUE NOT NULL,
        name TEXT NOT NULL,
        role TEXT DEFAULT 'member' CHECK (role IN ('admin', 'member')),
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT UNIQUE NOT NULL,
        password TEXT NOT NULL,
        name TEXT NOT NULL,
        role TEXT DEFAULT 'member' CHECK (role IN ('admin', 'member')),
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY (email) REFERENCES allowed_emails (email)
    )",
    "CREATE TABLE IF NOT EXISTS blogs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        author_id INTEGER NOT NULL,
        competition_date DATE,
        image1_path TEXT,
        image2_path TEXT,
        published BOOLEAN DEFAULT TRUE,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY (author_id) REFERENCES users (id)
    )",
    "CREATE TABLE IF NOT EXISTS resources (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        description TEXT,
        filename TEXT NOT NULL UNIQUE,
        original_filename TEXT NOT NULL,
        file_path TEXT NOT NULL,
        file_size INTEGER NOT NULL,
        file_type TEXT NOT NULL,
        mime_type TEXT NOT NULL,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        last_modified TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        uploaded_by INTEGER NOT NULL,
        download_count INTEGER DEFAULT 0,
        is_active BOOLEAN DEFAULT TRUE,
        FOREIGN KEY (uploaded_by) REFERENCES users (id)
    )",
    "CREATE TABLE IF NOT EXISTS authors (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT UNIQUE NOT NULL,
        user_id INTEGER UNIQUE NOT NULL,
        bio TEXT,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY (user_id) REFERENCES users (id)
    )",
    "CREATE TABLE IF NOT EXISTS carousel_images (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        description TEXT,
        image_path TEXT NOT NULL,
        display_order INTEGER DEFAULT 0,
        active BOOLEAN DEFAULT TRUE,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE INDEX IF NOT EXISTS idx_users_email ON users(email)",
    "CREATE INDEX IF NOT EXISTS idx_blogs_author ON blogs(author_id)",
    "CREATE INDEX IF NOT EXISTS idx_blogs_date ON blogs(competition_date)",
    "CREATE INDEX IF NOT EXISTS idx_resources_active ON resources(is_active)",
    "CREATE INDEX IF NOT EXISTS idx_resources_file_type ON resources(file_type)",
    "CREATE INDEX IF NOT EXISTS idx_carousel_order ON carousel_images(active, display_order)",
];

/// Create any missing tables and indexes in one transaction.
pub fn bootstrap(conn: &mut Connection) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    for ddl in STATEMENTS {
        tx.execute_batch(ddl)?;
    }
    tx.commit()
}

/// Insert the initial administrator, if missing, in one transaction.
/// Rows that already exist are left as they are.
pub fn seed(conn: &mut Connection, admin: &SeedAdmin) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    tx.execute(
        "INSERT OR IGNORE INTO allowed_emails (email, name, role) VALUES (?1, ?2, 'admin')",
        params![admin.email, admin.name],
    )?;
    if let Some(password) = &admin.password {
        tx.execute(
            "INSERT OR IGNORE INTO users (email, password, name, role) VALUES (?1, ?2, ?3, 'admin')",
            params![admin.email, password, admin.name],
        )?;
        tx.execute(
            "INSERT OR IGNORE INTO authors (username, user_id, bio)
             SELECT ?1, id, 'Site administrator' FROM users WHERE email = ?2",
            params![admin.username(), admin.email],
        )?;
    }
    tx.commit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap();
        stmt.query_map([], |row| row.get::<_, String>(0))
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
    }

    #[test]
    fn test_bootstrap_creates_all_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        bootstrap(&mut conn).unwrap();

        let names = table_names(&conn);
        for table in TABLES {
            assert!(names.contains(&table.to_string()), "missing {}", table);
        }
    }

    #[test]
    fn test_bootstrap_is_idempotent_and_keeps_rows() {
        let mut conn = Connection::open_in_memory().unwrap();
        bootstrap(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO allowed_emails (email, name, role) VALUES ('a@b.c', 'A', 'admin')",
            [],
        )
        .unwrap();

        bootstrap(&mut conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM allowed_emails", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    fn count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_seed_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", true).unwrap();
        bootstrap(&mut conn).unwrap();

        let admin = SeedAdmin::new("admin@munsociety.edu", "MUN Admin").with_password("admin123");
        seed(&mut conn, &admin).unwrap();
        seed(&mut conn, &admin).unwrap();

        assert_eq!(count(&conn, "allowed_emails"), 1);
        assert_eq!(count(&conn, "users"), 1);
        assert_eq!(count(&conn, "authors"), 1);
        let (username, role): (String, String) = conn
            .query_row(
                "SELECT a.username, u.role FROM authors a JOIN users u ON u.id = a.user_id",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(username, "admin");
        assert_eq!(role, "admin");
    }

    #[test]
    fn test_seed_without_password_only_allowlists() {
        let mut conn = Connection::open_in_memory().unwrap();
        bootstrap(&mut conn).unwrap();

        seed(&mut conn, &SeedAdmin::new("admin@munsociety.edu", "MUN Admin")).unwrap();

        assert_eq!(count(&conn, "allowed_emails"), 1);
        assert_eq!(count(&conn, "users"), 0);
        assert_eq!(count(&conn, "authors"), 0);
    }

    #[test]
    fn test_seed_keeps_existing_rows() {
        let mut conn = Connection::open_in_memory().unwrap();
        bootstrap(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO allowed_emails (email, name, role) VALUES ('admin@munsociety.edu', 'Old', 'member')",
            [],
        )
        .unwrap();

        seed(&mut conn, &SeedAdmin::new("admin@munsociety.edu", "MUN Admin")).unwrap();

        let (name, role): (String, String) = conn
            .query_row("SELECT name, role FROM allowed_emails", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        assert_eq!((name.as_str(), role.as_str()), ("Old", "member"));
    }

    #[test]
    fn test_bootstrap_leaves_incompatible_table_alone() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE users (id INTEGER PRIMARY KEY, nickname TEXT)")
            .unwrap();

        // The index on users(email) cannot be built against the old table.
        assert!(bootstrap(&mut conn).is_err());

        let columns: Vec<String> = {
            let mut stmt = conn.prepare("PRAGMA table_info(users)").unwrap();
            stmt.query_map([], |row| row.get::<_, String>(1))
                .unwrap()
                .map(|r| r.unwrap())
                .collect()
        };
        assert_eq!(columns, vec!["id".to_string(), "nickname".to_string()]);
    }
}
