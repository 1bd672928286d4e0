use std::collections::HashSet;

use chrono::NaiveDate;

use crate::validate::{validate_owner, validate_pet};
use crate::{
    CoreError, Owner, OwnerFields, OwnerId, OwnerRepository, Pet, PetId, PetRequest, PetType,
    PetTypeId, PetTypeRepository,
};

/// Application service for owner and pet records.
///
/// Generic over both repository ports so tests can run against the in-memory
/// adapters. Holds no state of its own.
pub struct CustomerService<O: OwnerRepository, T: PetTypeRepository> {
    owners: O,
    pet_types: T,
}

impl<O: OwnerRepository, T: PetTypeRepository> CustomerService<O, T> {
    pub fn new(owners: O, pet_types: T) -> Self {
        Self { owners, pet_types }
    }

    /// Validate and persist a new owner.
    pub fn create_owner(&self, fields: OwnerFields) -> Result<Owner, CoreError> {
        validate_owner(&fields)?;
        self.owners.save(Owner::new(fields))
    }

    pub fn find_owner(&self, id: OwnerId) -> Result<Option<Owner>, CoreError> {
        self.owners.find_by_id(id)
    }

    pub fn find_all(&self) -> Result<Vec<Owner>, CoreError> {
        self.owners.find_all()
    }

    /// Copy the contact fields onto an existing owner. The id and pets are
    /// preserved.
    pub fn update_owner(&self, id: OwnerId, fields: OwnerFields) -> Result<Owner, CoreError> {
        validate_owner(&fields)?;
        let mut owner = self.require_owner(id)?;
        owner.apply(fields);
        self.owners.save(owner)
    }

    pub fn pet_types(&self) -> Result<Vec<PetType>, CoreError> {
        self.pet_types.find_pet_types()
    }

    /// Attach a new pet to an owner and return it with its assigned id.
    pub fn add_pet(&self, owner_id: OwnerId, req: PetRequest) -> Result<Pet, CoreError> {
        validate_pet(&req)?;
        let (birth_date, type_id) = validated_parts(&req)?;
        let mut owner = self.require_owner(owner_id)?;
        let pet_type = self.require_pet_type(type_id)?;
        let known: HashSet<PetId> = owner.pets().iter().filter_map(|p| p.id).collect();

        let pet = Pet::new(req.name, birth_date, pet_type);
        owner.add_pet(pet.clone());

        // Other pets may have been added concurrently; the new one is the
        // highest unknown id carrying this pet's fields.
        let saved = self.owners.save(owner)?;
        saved
            .pets()
            .into_iter()
            .filter(|p| p.id.is_some_and(|id| !known.contains(&id)))
            .filter(|p| {
                p.name == pet.name && p.birth_date == pet.birth_date && p.pet_type == pet.pet_type
            })
            .max_by_key(|p| p.id)
            .ok_or_else(|| CoreError::Repository("saved pet was not assigned an id".into()))
    }

    /// Overwrite name, birth date and type of an existing pet.
    pub fn update_pet(&self, pet_id: PetId, req: PetRequest) -> Result<Pet, CoreError> {
        validate_pet(&req)?;
        let (birth_date, type_id) = validated_parts(&req)?;
        let (_, mut owner) = self
            .locate_pet(pet_id)?
            .ok_or_else(|| CoreError::NotFound(format!("Pet {} not found", pet_id)))?;
        let pet_type = self.require_pet_type(type_id)?;

        let pet = owner
            .pet_mut(pet_id)
            .ok_or_else(|| CoreError::NotFound(format!("Pet {} not found", pet_id)))?;
        pet.name = req.name;
        pet.birth_date = birth_date;
        pet.pet_type = pet_type;
        let updated = pet.clone();

        self.owners.save(owner)?;
        Ok(updated)
    }

    /// Find a pet together with the owner holding it.
    pub fn find_pet(&self, pet_id: PetId) -> Result<Option<(Pet, Owner)>, CoreError> {
        self.locate_pet(pet_id)
    }

    fn locate_pet(&self, pet_id: PetId) -> Result<Option<(Pet, Owner)>, CoreError> {
        for owner in self.owners.find_all()? {
            if let Some(pet) = owner.pet(pet_id).cloned() {
                return Ok(Some((pet, owner)));
            }
        }
        Ok(None)
    }

    fn require_owner(&self, id: OwnerId) -> Result<Owner, CoreError> {
        self.owners
            .find_by_id(id)?
            .ok_or_else(|| CoreError::NotFound(format!("Owner {} not found", id)))
    }

    fn require_pet_type(&self, id: PetTypeId) -> Result<PetType, CoreError> {
        self.pet_types
            .find_pet_type(id)?
            .ok_or_else(|| CoreError::NotFound(format!("Pet type {} not found", id)))
    }
}

// validate_pet guarantees both parts are present.
fn validated_parts(req: &PetRequest) -> Result<(NaiveDate, PetTypeId), CoreError> {
    match (req.birth_date, req.type_id) {
        (Some(date), Some(type_id)) => Ok((date, type_id)),
        _ => Err(CoreError::Repository("pet request incomplete after validation".into())),
    }
}
