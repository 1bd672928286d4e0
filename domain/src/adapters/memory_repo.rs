use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::{
    default_pet_types, CoreError, Owner, OwnerId, OwnerRepository, PetId, PetType, PetTypeId,
    PetTypeRepository,
};

struct OwnerTable {
    owners: BTreeMap<OwnerId, Owner>,
    next_owner_id: OwnerId,
    next_pet_id: PetId,
}

/// Simple in-memory owner repository for tests and local runs. Ids start at 1
/// and are never reused.
pub struct InMemoryOwnerRepo {
    inner: Mutex<OwnerTable>,
}

/// In-memory pet type repository seeded with the default types.
pub struct InMemoryPetTypeRepo {
    types: Vec<PetType>,
}

impl InMemoryOwnerRepo {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(OwnerTable {
                owners: BTreeMap::new(),
                next_owner_id: 1,
                next_pet_id: 1,
            }),
        }
    }
}

impl Default for InMemoryOwnerRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl OwnerRepository for InMemoryOwnerRepo {
    fn find_by_id(&self, id: OwnerId) -> Result<Option<Owner>, CoreError> {
        let table = self
            .inner
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        Ok(table.owners.get(&id).cloned())
    }

    fn find_all(&self) -> Result<Vec<Owner>, CoreError> {
        let table = self
            .inner
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        Ok(table.owners.values().cloned().collect())
    }

    fn save(&self, mut owner: Owner) -> Result<Owner, CoreError> {
        let mut table = self
            .inner
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        let id = match owner.id {
            Some(id) => {
                let Some(stored) = table.owners.get(&id) else {
                    return Err(CoreError::NotFound(format!("Owner {} not found", id)));
                };
                // Pets cascade as upserts: stored pets missing from a stale
                // copy are kept.
                for pet in stored.pets() {
                    if pet.id.is_some_and(|pid| owner.pet(pid).is_none()) {
                        owner.add_pet(pet);
                    }
                }
                id
            }
            None => {
                let id = table.next_owner_id;
                table.next_owner_id += 1;
                owner.id = Some(id);
                id
            }
        };
        for pet in owner.pets_mut() {
            if pet.id.is_none() {
                pet.id = Some(table.next_pet_id);
                table.next_pet_id += 1;
            }
            pet.owner_id = Some(id);
        }
        table.owners.insert(id, owner.clone());
        Ok(owner)
    }
}

impl InMemoryPetTypeRepo {
    pub fn new() -> Self {
        Self {
            types: default_pet_types(),
        }
    }
}

impl Default for InMemoryPetTypeRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl PetTypeRepository for InMemoryPetTypeRepo {
    fn find_pet_types(&self) -> Result<Vec<PetType>, CoreError> {
        let mut types = self.types.clone();
        types.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(types)
    }

    fn find_pet_type(&self, id: PetTypeId) -> Result<Option<PetType>, CoreError> {
        Ok(self.types.iter().find(|t| t.id == id).cloned())
    }
}
