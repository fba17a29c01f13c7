use regex::Regex;
use validator::ValidationError;

pub fn validate_email(email: &str) -> bool {
    match Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$") {
        Ok(re) => re.is_match(email),
        Err(_) => false,
    }
}

pub fn validate_pincode(pincode: &str) -> bool {
    match Regex::new(r"^\d{6}$") {
        Ok(re) => re.is_match(pincode),
        Err(_) => false,
    }
}

/// `validator` hook for optional pincode fields.
pub fn pincode_rule(pincode: &str) -> Result<(), ValidationError> {
    if validate_pincode(pincode) {
        Ok(())
    } else {
        Err(ValidationError::new("pincode"))
    }
}
