//! Domain library for the petclinic customers service.
//!
//! Holds the owner/pet model, the repository ports (traits), validation and
//! error definitions. The only dependency is `chrono` for calendar dates; keep
//! adapters and IO concerns out of this crate.

use std::error::Error;
use std::fmt::{Display, Formatter};

use chrono::NaiveDate;

pub type OwnerId = i64;
pub type PetId = i64;
pub type PetTypeId = i64;

/// Kind of animal a pet is (cat, dog, ...). Reference data seeded by storage.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PetType {
    pub id: PetTypeId,
    pub name: String,
}

impl PetType {
    pub fn new<S: Into<String>>(id: PetTypeId, name: S) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// The pet types every storage backend starts with.
pub fn default_pet_types() -> Vec<PetType> {
    ["cat", "dog", "lizard", "snake", "bird", "hamster"]
        .iter()
        .zip(1..)
        .map(|(name, id)| PetType::new(id, *name))
        .collect()
}

/// A single animal belonging to exactly one owner.
///
/// `owner_id` is a non-owning reference resolved by lookup; it takes no part
/// in equality.
#[derive(Clone, Debug)]
pub struct Pet {
    pub id: Option<PetId>,
    pub name: String,
    pub birth_date: NaiveDate,
    pub pet_type: PetType,
    pub owner_id: Option<OwnerId>,
}

impl Pet {
    pub fn new<S: Into<String>>(name: S, birth_date: NaiveDate, pet_type: PetType) -> Self {
        Self {
            id: None,
            name: name.into(),
            birth_date,
            pet_type,
            owner_id: None,
        }
    }
}

impl PartialEq for Pet {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.birth_date == other.birth_date
            && self.pet_type == other.pet_type
    }
}

impl Eq for Pet {}

/// Scalar contact fields of an owner, as accepted on create and update.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OwnerFields {
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    pub city: String,
    pub telephone: String,
}

/// A clinic customer with zero or more pets.
///
/// Equality compares the id and contact fields only; the pet collection is
/// excluded.
#[derive(Clone, Debug)]
pub struct Owner {
    pub id: Option<OwnerId>,
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    pub city: String,
    pub telephone: String,
    pets: Vec<Pet>,
}

impl Owner {
    /// Create an unsaved owner with no pets.
    pub fn new(fields: OwnerFields) -> Self {
        Self {
            id: None,
            first_name: fields.first_name,
            last_name: fields.last_name,
            address: fields.address,
            city: fields.city,
            telephone: fields.telephone,
            pets: Vec::new(),
        }
    }

    /// Overwrite the contact fields, leaving the id and pets untouched.
    pub fn apply(&mut self, fields: OwnerFields) {
        self.first_name = fields.first_name;
        self.last_name = fields.last_name;
        self.address = fields.address;
        self.city = fields.city;
        self.telephone = fields.telephone;
    }

    /// Pets sorted by name ascending, ignoring case (ties broken by id).
    pub fn pets(&self) -> Vec<Pet> {
        let mut sorted = self.pets.clone();
        sorted.sort_by_cached_key(|p| (p.name.to_lowercase(), p.id));
        sorted
    }

    /// Insert a pet and point its back-reference at this owner. A pet equal to
    /// one already owned is not added twice.
    pub fn add_pet(&mut self, mut pet: Pet) {
        pet.owner_id = self.id;
        if !self.pets.contains(&pet) {
            self.pets.push(pet);
        }
    }

    pub fn pet(&self, pet_id: PetId) -> Option<&Pet> {
        self.pets.iter().find(|p| p.id == Some(pet_id))
    }

    pub fn pet_mut(&mut self, pet_id: PetId) -> Option<&mut Pet> {
        self.pets.iter_mut().find(|p| p.id == Some(pet_id))
    }

    /// Mutable access for storage adapters assigning ids on save.
    pub fn pets_mut(&mut self) -> impl Iterator<Item = &mut Pet> {
        self.pets.iter_mut()
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl PartialEq for Owner {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.first_name == other.first_name
            && self.last_name == other.last_name
            && self.address == other.address
            && self.city == other.city
            && self.telephone == other.telephone
    }
}

impl Eq for Owner {}

/// Input for adding or updating a pet.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PetRequest {
    pub name: String,
    pub birth_date: Option<NaiveDate>,
    pub type_id: Option<PetTypeId>,
}

/// Repository port for owners and, by cascade, their pets.
pub trait OwnerRepository: Send + Sync {
    fn find_by_id(&self, id: OwnerId) -> Result<Option<Owner>, CoreError>;
    /// All owners in the storage engine's natural order.
    fn find_all(&self) -> Result<Vec<Owner>, CoreError>;
    /// Insert when `owner.id` is `None`, otherwise update in place. Returns the
    /// persisted owner with owner and pet ids populated.
    fn save(&self, owner: Owner) -> Result<Owner, CoreError>;
}

/// Repository port for pet type reference data.
pub trait PetTypeRepository: Send + Sync {
    fn find_pet_types(&self) -> Result<Vec<PetType>, CoreError>;
    fn find_pet_type(&self, id: PetTypeId) -> Result<Option<PetType>, CoreError>;
}

/// A single failed field-level constraint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: &'static str,
    pub message: String,
}

impl FieldViolation {
    pub fn new<S: Into<String>>(field: &'static str, message: S) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl Display for FieldViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Core domain errors (no external error crates to keep deps minimal).
#[derive(Debug)]
pub enum CoreError {
    Validation(Vec<FieldViolation>),
    NotFound(String),
    Repository(String),
}

impl Display for CoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CoreError::Validation(violations) => {
                let joined = violations
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join("; ");
                write!(f, "validation failed: {}", joined)
            }
            CoreError::NotFound(msg) => write!(f, "{}", msg),
            CoreError::Repository(msg) => write!(f, "repository error: {}", msg),
        }
    }
}

impl Error for CoreError {}

pub mod adapters;
pub mod service;
pub mod validate;
