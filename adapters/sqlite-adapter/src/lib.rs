//! sqlite-adapter — SQLite implementation of the owner and pet type ports.
//!
//! Purpose
//! - Provide a lightweight, file-based repository to run the customers
//!   service locally without an external database server.
//! - Implements `OwnerRepository` and `PetTypeRepository` from the `domain` crate.
//!
//! Notes
//! - Uses `rusqlite` with the `bundled` feature for portability.
//! - Birth dates are stored as `YYYY-MM-DD` text via rusqlite's chrono support.
//! - Saving an owner writes the owner row and all of its pets in one transaction.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use chrono::NaiveDate;
use domain::{
    default_pet_types, CoreError, Owner, OwnerFields, OwnerId, OwnerRepository, Pet, PetType,
    PetTypeId, PetTypeRepository,
};
use rusqlite::{params, Connection};

const OWNER_COLUMNS: &str = "id, first_name, last_name, address, city, telephone";
const PET_SELECT: &str = "SELECT p.id, p.name, p.birth_date, t.id, t.name, p.owner_id FROM pets p JOIN types t ON t.id = p.type_id";

/// SQLite-backed repository for local development.
pub struct SqliteRepo {
    conn: Mutex<Connection>,
}

impl SqliteRepo {
    /// Open (or create) a SQLite database at the given path and ensure schema.
    /// Missing parent directories are created.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| {
                CoreError::Repository(format!("cannot create {}: {e}", dir.display()))
            })?;
        }
        let conn = Connection::open(path).map_err(map_sqerr)?;
        init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Construct from env var `DB_PATH` (defaults to `./data/customers.db`).
    pub fn from_env() -> Result<Self, CoreError> {
        let path = std::env::var("DB_PATH").unwrap_or_else(|_| "./data/customers.db".to_string());
        Self::new(path)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, CoreError> {
        self.conn.lock().map_err(|_| CoreError::Repository("mutex poisoned".into()))
    }
}

fn init_schema(conn: &Connection) -> Result<(), CoreError> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;
        CREATE TABLE IF NOT EXISTS types (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_types_name ON types(name);
        CREATE TABLE IF NOT EXISTS owners (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            address TEXT NOT NULL,
            city TEXT NOT NULL,
            telephone TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_owners_last_name ON owners(last_name);
        CREATE TABLE IF NOT EXISTS pets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            birth_date TEXT NOT NULL,
            type_id INTEGER NOT NULL REFERENCES types(id),
            owner_id INTEGER NOT NULL REFERENCES owners(id)
        );
        CREATE INDEX IF NOT EXISTS idx_pets_owner ON pets(owner_id);
        "#,
    ).map_err(map_sqerr)?;
    for t in default_pet_types() {
        conn.execute(
            "INSERT OR IGNORE INTO types(id, name) VALUES (?1, ?2)",
            params![t.id, t.name],
        ).map_err(map_sqerr)?;
    }
    Ok(())
}

fn map_sqerr<E: std::fmt::Display>(e: E) -> CoreError { CoreError::Repository(format!("sqlite error: {e}")) }

fn row_to_owner(row: &rusqlite::Row) -> Result<Owner, CoreError> {
    let id: i64 = row.get(0).map_err(map_sqerr)?;
    let mut owner = Owner::new(OwnerFields {
        first_name: row.get(1).map_err(map_sqerr)?,
        last_name: row.get(2).map_err(map_sqerr)?,
        address: row.get(3).map_err(map_sqerr)?,
        city: row.get(4).map_err(map_sqerr)?,
        telephone: row.get(5).map_err(map_sqerr)?,
    });
    owner.id = Some(id);
    Ok(owner)
}

fn row_to_pet(row: &rusqlite::Row) -> Result<Pet, CoreError> {
    let id: i64 = row.get(0).map_err(map_sqerr)?;
    let name: String = row.get(1).map_err(map_sqerr)?;
    let birth_date: NaiveDate = row.get(2).map_err(map_sqerr)?;
    let type_id: i64 = row.get(3).map_err(map_sqerr)?;
    let type_name: String = row.get(4).map_err(map_sqerr)?;
    let owner_id: i64 = row.get(5).map_err(map_sqerr)?;
    let mut pet = Pet::new(name, birth_date, PetType::new(type_id, type_name));
    pet.id = Some(id);
    pet.owner_id = Some(owner_id);
    Ok(pet)
}

fn load_owner(conn: &Connection, id: OwnerId) -> Result<Option<Owner>, CoreError> {
    let mut stmt = conn
        .prepare(&format!("SELECT {OWNER_COLUMNS} FROM owners WHERE id = ?1"))
        .map_err(map_sqerr)?;
    let mut rows = stmt.query(params![id]).map_err(map_sqerr)?;
    let Some(row) = rows.next().map_err(map_sqerr)? else {
        return Ok(None);
    };
    let mut owner = row_to_owner(row)?;

    let mut stmt = conn
        .prepare(&format!("{PET_SELECT} WHERE p.owner_id = ?1 ORDER BY p.id"))
        .map_err(map_sqerr)?;
    let mut rows = stmt.query(params![id]).map_err(map_sqerr)?;
    while let Some(row) = rows.next().map_err(map_sqerr)? {
        owner.add_pet(row_to_pet(row)?);
    }
    Ok(Some(owner))
}

impl OwnerRepository for SqliteRepo {
    fn find_by_id(&self, id: OwnerId) -> Result<Option<Owner>, CoreError> {
        let conn = self.lock()?;
        load_owner(&conn, id)
    }

    fn find_all(&self) -> Result<Vec<Owner>, CoreError> {
        let conn = self.lock()?;
        let mut owners = BTreeMap::new();
        let mut stmt = conn
            .prepare(&format!("SELECT {OWNER_COLUMNS} FROM owners ORDER BY id"))
            .map_err(map_sqerr)?;
        let mut rows = stmt.query([]).map_err(map_sqerr)?;
        while let Some(row) = rows.next().map_err(map_sqerr)? {
            let owner = row_to_owner(row)?;
            owners.insert(owner.id, owner);
        }

        let mut stmt = conn
            .prepare(&format!("{PET_SELECT} ORDER BY p.id"))
            .map_err(map_sqerr)?;
        let mut rows = stmt.query([]).map_err(map_sqerr)?;
        while let Some(row) = rows.next().map_err(map_sqerr)? {
            let pet = row_to_pet(row)?;
            if let Some(owner) = owners.get_mut(&pet.owner_id) {
                owner.add_pet(pet);
            }
        }
        Ok(owners.into_values().collect())
    }

    fn save(&self, owner: Owner) -> Result<Owner, CoreError> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction().map_err(map_sqerr)?;
        let id = match owner.id {
            Some(id) => {
                let changed = tx.execute(
                    "UPDATE owners SET first_name = ?1, last_name = ?2, address = ?3, city = ?4, telephone = ?5 WHERE id = ?6",
                    params![owner.first_name, owner.last_name, owner.address, owner.city, owner.telephone, id],
                ).map_err(map_sqerr)?;
                if changed == 0 {
                    return Err(CoreError::NotFound(format!("Owner {} not found", id)));
                }
                id
            }
            None => {
                tx.execute(
                    "INSERT INTO owners(first_name, last_name, address, city, telephone) VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![owner.first_name, owner.last_name, owner.address, owner.city, owner.telephone],
                ).map_err(map_sqerr)?;
                tx.last_insert_rowid()
            }
        };
        for pet in owner.pets() {
            match pet.id {
                Some(pet_id) => {
                    tx.execute(
                        "UPDATE pets SET name = ?1, birth_date = ?2, type_id = ?3, owner_id = ?4 WHERE id = ?5",
                        params![pet.name, pet.birth_date, pet.pet_type.id, id, pet_id],
                    ).map_err(map_sqerr)?;
                }
                None => {
                    tx.execute(
                        "INSERT INTO pets(name, birth_date, type_id, owner_id) VALUES (?1, ?2, ?3, ?4)",
                        params![pet.name, pet.birth_date, pet.pet_type.id, id],
                    ).map_err(map_sqerr)?;
                }
            }
        }
        tx.commit().map_err(map_sqerr)?;
        load_owner(&conn, id)?
            .ok_or_else(|| CoreError::Repository(format!("owner {id} vanished after save")))
    }
}

impl PetTypeRepository for SqliteRepo {
    fn find_pet_types(&self) -> Result<Vec<PetType>, CoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id, name FROM types ORDER BY name").map_err(map_sqerr)?;
        let mut rows = stmt.query([]).map_err(map_sqerr)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(map_sqerr)? {
            out.push(PetType::new(row.get::<_, i64>(0).map_err(map_sqerr)?, row.get::<_, String>(1).map_err(map_sqerr)?));
        }
        Ok(out)
    }

    fn find_pet_type(&self, id: PetTypeId) -> Result<Option<PetType>, CoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id, name FROM types WHERE id = ?1").map_err(map_sqerr)?;
        let mut rows = stmt.query(params![id]).map_err(map_sqerr)?;
        if let Some(row) = rows.next().map_err(map_sqerr)? {
            Ok(Some(PetType::new(row.get::<_, i64>(0).map_err(map_sqerr)?, row.get::<_, String>(1).map_err(map_sqerr)?)))
        } else {
            Ok(None)
        }
    }
}
