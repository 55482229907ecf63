use thiserror::Error;

use crate::models::DeployRequest;

pub const MIN_NAME_LEN: usize = 3;
pub const MAX_NAME_LEN: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Incomplete request: name, fileData and fileName are required")]
    MissingFields,
    #[error("Site name may only contain lowercase letters, digits and hyphens")]
    InvalidCharacters,
    #[error("Site name must be 3-50 characters")]
    InvalidLength,
}

// Site names become subdomains: ^[a-z0-9-]+$, 3-50 chars
pub fn validate_site_name(name: &str) -> Result<(), ValidationError> {
    let allowed = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-';
    if name.is_empty() || !name.bytes().all(allowed) {
        return Err(ValidationError::InvalidCharacters);
    }
    if !(MIN_NAME_LEN..=MAX_NAME_LEN).contains(&name.len()) {
        return Err(ValidationError::InvalidLength);
    }
    Ok(())
}

pub fn validate_request(req: &DeployRequest) -> Result<(), ValidationError> {
    if req.name.is_empty() || req.file_data.is_empty() || req.file_name.is_empty() {
        return Err(ValidationError::MissingFields);
    }
    validate_site_name(&req.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str, data: &str, file: &str) -> DeployRequest {
        DeployRequest {
            name: name.to_string(),
            file_data: data.to_string(),
            file_name: file.to_string(),
        }
    }

    #[test]
    fn accepts_well_formed_names() {
        assert_eq!(validate_site_name("my-site"), Ok(()));
        assert_eq!(validate_site_name("abc"), Ok(()));
        assert_eq!(validate_site_name(&"a".repeat(50)), Ok(()));
    }

    #[test]
    fn rejects_bad_characters_before_length() {
        assert_eq!(validate_site_name("My-Site"), Err(ValidationError::InvalidCharacters));
        assert_eq!(validate_site_name("a_b"), Err(ValidationError::InvalidCharacters));
        assert_eq!(validate_site_name("A"), Err(ValidationError::InvalidCharacters));
        assert_eq!(validate_site_name("sité"), Err(ValidationError::InvalidCharacters));
    }

    #[test]
    fn rejects_names_outside_length_bounds() {
        assert_eq!(validate_site_name("ab"), Err(ValidationError::InvalidLength));
        assert_eq!(validate_site_name(&"a".repeat(51)), Err(ValidationError::InvalidLength));
        assert_eq!(
            ValidationError::InvalidLength.to_string(),
            "Site name must be 3-50 characters"
        );
    }

    #[test]
    fn missing_fields_are_reported_first() {
        assert_eq!(
            validate_request(&request("", "aGk=", "index.html")),
            Err(ValidationError::MissingFields)
        );
        assert_eq!(
            validate_request(&request("A", "", "index.html")),
            Err(ValidationError::MissingFields)
        );
        assert_eq!(validate_request(&request("my-site", "aGk=", "index.html")), Ok(()));
    }
}
