use crate::error::AppError;

/// Trims `value` and checks it is non-blank and at most `max` characters.
pub fn required<'a>(field: &str, value: &'a str, max: Option<usize>) -> Result<&'a str, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::validation(format!("{field} must not be blank")));
    }
    if let Some(max) = max {
        if value.chars().count() > max {
            return Err(AppError::validation(format!(
                "{field} must be at most {max} characters"
            )));
        }
    }
    Ok(value)
}

pub fn email(value: &str) -> Result<&str, AppError> {
    let value = required("email", value, Some(50))?;
    match value.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(value),
        _ => Err(AppError::validation("email is not a valid address")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_bounds() {
        assert_eq!(required("name", "  Notes  ", Some(10)).unwrap(), "Notes");
        assert!(required("name", "   ", None).is_err());
        assert!(required("name", &"x".repeat(101), Some(100)).is_err());
        assert!(required("name", &"x".repeat(100), Some(100)).is_ok());
    }

    #[test]
    fn emails_need_both_halves() {
        assert!(email("a@b").is_ok());
        assert!(email("@b").is_err());
        assert!(email("a@").is_err());
        assert!(email("ab").is_err());
    }
}
