use crate::error::{NotificationError, Result};
use anyhow::Context;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

pub mod types;
pub use types::{Booking, Tenant, User};

/// How long a connection waits on a lock held by another topic loop.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const USER_COLUMNS: &str = "id, first_name, last_name, email, tenant_id, created_at, updated_at";
const TENANT_COLUMNS: &str = "id, owner_id, vat_number, business_name, business_email, \
     business_phone, address, description, created_at, updated_at";
const BOOKING_COLUMNS: &str = "id, tenant_id, start_date_time, end_date_time, created_at, updated_at";

/// SQLite replica of users, tenants and bookings
///
/// Every call opens its own connection, so clones can be used from several
/// topic loops at once.
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    db_path: PathBuf,
}

impl SqliteStorage {
    /// Opens (creating if needed) the database at `db_path`.
    ///
    /// # Examples
    ///
    /// ```
    /// use notification_consumer::storage::SqliteStorage;
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let storage = SqliteStorage::new_with_path(dir.path().join("notifications.db")).unwrap();
    /// storage.ping().unwrap();
    /// ```
    pub fn new_with_path<P: Into<PathBuf>>(db_path: P) -> Result<Self> {
        let db_path = db_path.into();

        // Ensure parent directory exists so opening the DB file succeeds.
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create parent directory for database")
                .map_err(|e| NotificationError::Storage(e.to_string()))?;
        }

        let storage = Self { db_path };
        storage.init()?;
        Ok(storage)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn open(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)
            .context("Failed to open database")
            .map_err(|e| NotificationError::Storage(e.to_string()))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .context("Failed to set busy timeout")
            .map_err(|e| NotificationError::Storage(e.to_string()))?;
        Ok(conn)
    }

    /// Initialize the database schema
    fn init(&self) -> Result<()> {
        let conn = self.open()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                tenant_id TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_users_tenant_id ON users (tenant_id);

            CREATE TABLE IF NOT EXISTS tenants (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                vat_number TEXT NOT NULL,
                business_name TEXT NOT NULL,
                business_email TEXT,
                business_phone TEXT,
                address TEXT NOT NULL,
                description TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_tenants_business_name ON tenants (business_name);

            CREATE TABLE IF NOT EXISTS bookings (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                start_date_time TEXT NOT NULL,
                end_date_time TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_bookings_tenant_start
                ON bookings (tenant_id, start_date_time);",
        )
        .context("Failed to create tables")
        .map_err(|e| NotificationError::Storage(e.to_string()))?;

        Ok(())
    }

    /// Checks that the database answers a trivial query.
    pub fn ping(&self) -> Result<()> {
        let conn = self.open()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .context("Database did not answer")
            .map_err(|e| NotificationError::Storage(e.to_string()))?;
        Ok(())
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let conn = self.open()?;
        conn.query_row(
            &format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS),
            params![id.to_string()],
            user_from_row,
        )
        .optional()
        .context("Failed to query user")
        .map_err(|e| NotificationError::Storage(e.to_string()).into())
    }

    pub fn insert_user(&self, user: &User) -> Result<()> {
        let conn = self.open()?;
        conn.execute(
            &format!(
                "INSERT INTO users ({}) VALUES (?, ?, ?, ?, ?, ?, ?)",
                USER_COLUMNS
            ),
            params![
                user.id.to_string(),
                user.first_name,
                user.last_name,
                user.email,
                user.tenant_id.map(|id| id.to_string()),
                user.created_at.to_rfc3339(),
                user.updated_at.to_rfc3339(),
            ],
        )
        .context("Failed to insert user")
        .map_err(|e| NotificationError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Overwrites a user, keeping its original `created_at`.
    ///
    /// Returns `false` if no user with that id exists.
    pub fn update_user(&self, user: &User) -> Result<bool> {
        let conn = self.open()?;
        let changed = conn
            .execute(
                "UPDATE users SET
                    first_name = ?,
                    last_name = ?,
                    email = ?,
                    tenant_id = ?,
                    updated_at = ?
                WHERE id = ?",
                params![
                    user.first_name,
                    user.last_name,
                    user.email,
                    user.tenant_id.map(|id| id.to_string()),
                    user.updated_at.to_rfc3339(),
                    user.id.to_string(),
                ],
            )
            .context("Failed to update user")
            .map_err(|e| NotificationError::Storage(e.to_string()))?;
        Ok(changed > 0)
    }

    /// Returns `false` if the user did not exist.
    pub fn delete_user(&self, id: Uuid) -> Result<bool> {
        let conn = self.open()?;
        let changed = conn
            .execute("DELETE FROM users WHERE id = ?", params![id.to_string()])
            .context("Failed to delete user")
            .map_err(|e| NotificationError::Storage(e.to_string()))?;
        Ok(changed > 0)
    }

    pub fn get_tenant(&self, id: Uuid) -> Result<Option<Tenant>> {
        let conn = self.open()?;
        conn.query_row(
            &format!("SELECT {} FROM tenants WHERE id = ?", TENANT_COLUMNS),
            params![id.to_string()],
            tenant_from_row,
        )
        .optional()
        .context("Failed to query tenant")
        .map_err(|e| NotificationError::Storage(e.to_string()).into())
    }

    pub fn insert_tenant(&self, tenant: &Tenant) -> Result<()> {
        let conn = self.open()?;
        conn.execute(
            &format!(
                "INSERT INTO tenants ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                TENANT_COLUMNS
            ),
            params![
                tenant.id.to_string(),
                tenant.owner_id.to_string(),
                tenant.vat_number,
                tenant.business_name,
                tenant.business_email,
                tenant.business_phone,
                tenant.address,
                tenant.description,
                tenant.created_at.to_rfc3339(),
                tenant.updated_at.to_rfc3339(),
            ],
        )
        .context("Failed to insert tenant")
        .map_err(|e| NotificationError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Overwrites a tenant, keeping its original `created_at`.
    ///
    /// Returns `false` if no tenant with that id exists.
    pub fn update_tenant(&self, tenant: &Tenant) -> Result<bool> {
        let conn = self.open()?;
        let changed = conn
            .execute(
                "UPDATE tenants SET
                    owner_id = ?,
                    vat_number = ?,
                    business_name = ?,
                    business_email = ?,
                    business_phone = ?,
                    address = ?,
                    description = ?,
                    updated_at = ?
                WHERE id = ?",
                params![
                    tenant.owner_id.to_string(),
                    tenant.vat_number,
                    tenant.business_name,
                    tenant.business_email,
                    tenant.business_phone,
                    tenant.address,
                    tenant.description,
                    tenant.updated_at.to_rfc3339(),
                    tenant.id.to_string(),
                ],
            )
            .context("Failed to update tenant")
            .map_err(|e| NotificationError::Storage(e.to_string()))?;
        Ok(changed > 0)
    }

    pub fn get_booking(&self, id: Uuid) -> Result<Option<Booking>> {
        let conn = self.open()?;
        conn.query_row(
            &format!("SELECT {} FROM bookings WHERE id = ?", BOOKING_COLUMNS),
            params![id.to_string()],
            booking_from_row,
        )
        .optional()
        .context("Failed to query booking")
        .map_err(|e| NotificationError::Storage(e.to_string()).into())
    }

    pub fn insert_booking(&self, booking: &Booking) -> Result<()> {
        let conn = self.open()?;
        conn.execute(
            &format!(
                "INSERT INTO bookings ({}) VALUES (?, ?, ?, ?, ?, ?)",
                BOOKING_COLUMNS
            ),
            params![
                booking.id.to_string(),
                booking.tenant_id.to_string(),
                booking.start_date_time.to_rfc3339(),
                booking.end_date_time.to_rfc3339(),
                booking.created_at.to_rfc3339(),
                booking.updated_at.to_rfc3339(),
            ],
        )
        .context("Failed to insert booking")
        .map_err(|e| NotificationError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Returns `false` if the booking did not exist.
    pub fn delete_booking(&self, id: Uuid) -> Result<bool> {
        let conn = self.open()?;
        let changed = conn
            .execute("DELETE FROM bookings WHERE id = ?", params![id.to_string()])
            .context("Failed to delete booking")
            .map_err(|e| NotificationError::Storage(e.to_string()))?;
        Ok(changed > 0)
    }
}

fn uuid_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let text: String = row.get(idx)?;
    Uuid::parse_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn optional_uuid_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|t| {
        Uuid::parse_str(&t)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn time_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: uuid_column(row, 0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        email: row.get(3)?,
        tenant_id: optional_uuid_column(row, 4)?,
        created_at: time_column(row, 5)?,
        updated_at: time_column(row, 6)?,
    })
}

fn tenant_from_row(row: &Row<'_>) -> rusqlite::Result<Tenant> {
    Ok(Tenant {
        id: uuid_column(row, 0)?,
        owner_id: uuid_column(row, 1)?,
        vat_number: row.get(2)?,
        business_name: row.get(3)?,
        business_email: row.get(4)?,
        business_phone: row.get(5)?,
        address: row.get(6)?,
        description: row.get(7)?,
        created_at: time_column(row, 8)?,
        updated_at: time_column(row, 9)?,
    })
}

fn booking_from_row(row: &Row<'_>) -> rusqlite::Result<Booking> {
    Ok(Booking {
        id: uuid_column(row, 0)?,
        tenant_id: uuid_column(row, 1)?,
        start_date_time: time_column(row, 2)?,
        end_date_time: time_column(row, 3)?,
        created_at: time_column(row, 4)?,
        updated_at: time_column(row, 5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use tempfile::tempdir;

    /// Returns both the `SqliteStorage` and the `TempDir` so the caller keeps
    /// the directory alive for the duration of the test.
    fn create_test_storage() -> (SqliteStorage, tempfile::TempDir) {
        let dir = tempdir().expect("failed to create tempdir");
        let storage = SqliteStorage::new_with_path(dir.path().join("notifications.db"))
            .expect("failed to create storage");
        (storage, dir)
    }

    fn sample_user(email: &str) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            email: email.to_string(),
            tenant_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn sample_tenant() -> Tenant {
        let now = Utc::now();
        Tenant {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            vat_number: "IT01234567890".to_string(),
            business_name: "Barber Shop".to_string(),
            business_email: Some("shop@example.com".to_string()),
            business_phone: None,
            address: String::new(),
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_init_creates_tables() {
        let (storage, _dir) = create_test_storage();
        let conn = Connection::open(storage.path()).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();

        assert_eq!(tables, vec!["bookings", "tenants", "users"]);
    }

    #[test]
    fn test_init_is_idempotent() {
        let (storage, _dir) = create_test_storage();
        assert!(SqliteStorage::new_with_path(storage.path()).is_ok());
    }

    #[test]
    fn test_ping() {
        let (storage, _dir) = create_test_storage();
        assert!(storage.ping().is_ok());
    }

    #[test]
    fn test_user_insert_and_get() {
        let (storage, _dir) = create_test_storage();
        let mut user = sample_user("jane@example.com");
        user.tenant_id = Some(Uuid::new_v4());

        storage.insert_user(&user).unwrap();
        let loaded = storage.get_user(user.id).unwrap().unwrap();

        assert_eq!(loaded.email, "jane@example.com");
        assert_eq!(loaded.tenant_id, user.tenant_id);
        assert_eq!(loaded.created_at.timestamp(), user.created_at.timestamp());
    }

    #[test]
    fn test_get_missing_user_is_none() {
        let (storage, _dir) = create_test_storage();
        assert!(storage.get_user(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_email_is_rejected() {
        let (storage, _dir) = create_test_storage();
        storage.insert_user(&sample_user("same@example.com")).unwrap();
        assert!(storage.insert_user(&sample_user("same@example.com")).is_err());
    }

    #[test]
    fn test_update_user_preserves_created_at() {
        let (storage, _dir) = create_test_storage();
        let mut user = sample_user("jane@example.com");
        user.created_at = Utc::now() - ChronoDuration::days(3);
        storage.insert_user(&user).unwrap();

        let mut changed = user.clone();
        changed.first_name = "Janet".to_string();
        changed.created_at = Utc::now();
        changed.updated_at = Utc::now();
        assert!(storage.update_user(&changed).unwrap());

        let loaded = storage.get_user(user.id).unwrap().unwrap();
        assert_eq!(loaded.first_name, "Janet");
        assert_eq!(loaded.created_at.timestamp(), user.created_at.timestamp());
    }

    #[test]
    fn test_update_missing_user_reports_false() {
        let (storage, _dir) = create_test_storage();
        assert!(!storage.update_user(&sample_user("x@example.com")).unwrap());
    }

    #[test]
    fn test_delete_user() {
        let (storage, _dir) = create_test_storage();
        let user = sample_user("jane@example.com");
        storage.insert_user(&user).unwrap();

        assert!(storage.delete_user(user.id).unwrap());
        assert!(!storage.delete_user(user.id).unwrap());
        assert!(storage.get_user(user.id).unwrap().is_none());
    }

    #[test]
    fn test_tenant_insert_update_get() {
        let (storage, _dir) = create_test_storage();
        let tenant = sample_tenant();
        storage.insert_tenant(&tenant).unwrap();

        let mut changed = tenant.clone();
        changed.address = "Via Roma 1".to_string();
        changed.business_phone = Some("+39 000".to_string());
        assert!(storage.update_tenant(&changed).unwrap());

        let loaded = storage.get_tenant(tenant.id).unwrap().unwrap();
        assert_eq!(loaded.address, "Via Roma 1");
        assert_eq!(loaded.business_phone.as_deref(), Some("+39 000"));
        assert_eq!(loaded.business_email.as_deref(), Some("shop@example.com"));
    }

    #[test]
    fn test_booking_insert_get_delete() {
        let (storage, _dir) = create_test_storage();
        let now = Utc::now();
        let booking = Booking {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            start_date_time: now + ChronoDuration::days(1),
            end_date_time: now + ChronoDuration::days(1) + ChronoDuration::minutes(30),
            created_at: now,
            updated_at: now,
        };

        storage.insert_booking(&booking).unwrap();
        let loaded = storage.get_booking(booking.id).unwrap().unwrap();
        assert_eq!(loaded.tenant_id, booking.tenant_id);

        assert!(storage.delete_booking(booking.id).unwrap());
        assert!(storage.get_booking(booking.id).unwrap().is_none());
    }

    #[test]
    fn test_clones_share_database() {
        let (storage, _dir) = create_test_storage();
        let clone = storage.clone();
        let user = sample_user("jane@example.com");

        storage.insert_user(&user).unwrap();

        assert!(clone.get_user(user.id).unwrap().is_some());
    }
}
