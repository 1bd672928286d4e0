//! Field-level validation for owner and pet input. Every violated field is
//! reported, not only the first.

use crate::{CoreError, FieldViolation, OwnerFields, PetRequest};

pub const ADDRESS_MAX_CHARS: usize = 200;
pub const TELEPHONE_DIGITS: usize = 10;

fn into_result(violations: Vec<FieldViolation>) -> Result<(), CoreError> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(CoreError::Validation(violations))
    }
}

/// Validate owner contact fields before they are persisted.
pub fn validate_owner(fields: &OwnerFields) -> Result<(), CoreError> {
    let mut violations = Vec::new();

    if fields.first_name.is_empty() {
        violations.push(FieldViolation::new("firstName", "First name cannot be empty"));
    }
    if fields.last_name.is_empty() {
        violations.push(FieldViolation::new("lastName", "Last name cannot be empty"));
    }
    if fields.address.is_empty() {
        violations.push(FieldViolation::new("address", "Address cannot be empty"));
    } else if fields.address.chars().count() > ADDRESS_MAX_CHARS {
        violations.push(FieldViolation::new(
            "address",
            format!("Address can not exceed {} characters", ADDRESS_MAX_CHARS),
        ));
    }
    if fields.city.is_empty() {
        violations.push(FieldViolation::new("city", "City cannot be empty"));
    }
    if fields.telephone.is_empty() {
        violations.push(FieldViolation::new("telephone", "Telephone cannot be empty"));
    } else if fields.telephone.len() != TELEPHONE_DIGITS
        || !fields.telephone.chars().all(|c| c.is_ascii_digit())
    {
        violations.push(FieldViolation::new(
            "telephone",
            "Telephone should be exact 10 digit no.",
        ));
    }

    into_result(violations)
}

/// Validate pet input. The type id must be present; whether it names a known
/// type is checked against the pet type repository.
pub fn validate_pet(req: &PetRequest) -> Result<(), CoreError> {
    let mut violations = Vec::new();

    if req.name.is_empty() {
        violations.push(FieldViolation::new("name", "Name cannot be empty"));
    }
    if req.birth_date.is_none() {
        violations.push(FieldViolation::new("birthDate", "Birth date cannot be empty"));
    }
    if req.type_id.is_none() {
        violations.push(FieldViolation::new("typeId", "Type cannot be empty"));
    }

    into_result(violations)
}
