//! Input classifiers. Each returns the cleaned value or a `ValidationError`;
//! none of them touch conversation state.

use std::sync::LazyLock;

use regex::Regex;

use super::catalog::{ID_METHOD_CLIENT_NUMBER, ID_METHOD_FULL_NAME, ID_METHOD_RUT, TextFormat};
use super::normalize::fold;
use crate::error::ValidationError;

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9+()\-\s]{6,20}$").expect("valid phone regex"));

/// `12.345.678-9`, `12345678-9`, `9.876.543-K`.
static RUT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{1,2}(?:\.?\d{3}){2}-[\dkK]$").expect("valid RUT regex")
});

static CLIENT_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,10}$").expect("valid client number regex"));

/// Trimmed input, or `EmptyInput` for blank text.
pub fn non_blank(input: &str) -> Result<&str, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        Err(ValidationError::EmptyInput)
    } else {
        Ok(trimmed)
    }
}

/// Parse a 1-based menu selection within `1..=count`.
pub fn choice_index(input: &str, count: usize) -> Result<usize, ValidationError> {
    let trimmed = non_blank(input)?;
    let value: i64 = trimmed.parse().map_err(|_| ValidationError::NotANumber {
        input: trimmed.to_string(),
    })?;
    if value < 1 || value as u64 > count as u64 {
        return Err(ValidationError::OutOfRange { value, max: count });
    }
    Ok(value as usize)
}

pub fn phone(input: &str) -> Result<String, ValidationError> {
    let trimmed = non_blank(input)?;
    if PHONE_RE.is_match(trimmed) {
        Ok(trimmed.to_string())
    } else {
        Err(ValidationError::InvalidPhone)
    }
}

/// At least three characters and at least one letter.
pub fn full_name(input: &str) -> Result<String, ValidationError> {
    let trimmed = non_blank(input)?;
    if trimmed.chars().count() >= 3 && trimmed.chars().any(char::is_alphabetic) {
        Ok(trimmed.to_string())
    } else {
        Err(ValidationError::InvalidName)
    }
}

/// Format-only RUT check; the verifier digit is not recomputed.
pub fn rut(input: &str) -> Result<String, ValidationError> {
    let trimmed = non_blank(input)?;
    if RUT_RE.is_match(trimmed) {
        Ok(trimmed.to_uppercase())
    } else {
        Err(ValidationError::InvalidRut)
    }
}

pub fn client_number(input: &str) -> Result<String, ValidationError> {
    let trimmed = non_blank(input)?;
    if CLIENT_NUMBER_RE.is_match(trimmed) {
        Ok(trimmed.to_string())
    } else {
        Err(ValidationError::InvalidClientNumber)
    }
}

/// Validate an identification value for the 1-based identification `method`.
pub fn identifier(method: usize, input: &str) -> Result<String, ValidationError> {
    match method {
        ID_METHOD_CLIENT_NUMBER => client_number(input),
        ID_METHOD_RUT => rut(input),
        ID_METHOD_FULL_NAME => full_name(input),
        _ => non_blank(input).map(str::to_string),
    }
}

/// Validate a free-text answer. `Identifier` needs the chosen method.
pub fn text(
    format: TextFormat,
    id_method: Option<usize>,
    input: &str,
) -> Result<String, ValidationError> {
    match format {
        TextFormat::Any => non_blank(input).map(str::to_string),
        TextFormat::FullName => full_name(input),
        TextFormat::Phone => phone(input),
        TextFormat::Identifier => identifier(id_method.unwrap_or_default(), input),
    }
}

/// Yes/no answer. Accepts the menu numbers `1`/`2` as well as words.
pub fn yes_no(input: &str) -> Result<bool, ValidationError> {
    let trimmed = non_blank(input)?;
    match fold(trimmed).as_str() {
        "1" | "si" | "s" | "yes" | "y" | "claro" => Ok(true),
        "2" | "no" | "n" => Ok(false),
        _ => Err(ValidationError::InvalidYesNo),
    }
}

/// Comma-separated 1-based indices into a list of `count` candidates.
///
/// Every entry must be a number in range; duplicates collapse. Returns
/// 0-based indices in the order first given.
pub fn multi_selection(input: &str, count: usize) -> Result<Vec<usize>, ValidationError> {
    let trimmed = non_blank(input)?;
    let mut picked = Vec::new();
    for token in trimmed.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let value: usize = token.parse().map_err(|_| ValidationError::InvalidSelection {
            token: token.to_string(),
        })?;
        if value == 0 || value > count {
            return Err(ValidationError::InvalidSelection {
                token: token.to_string(),
            });
        }
        if !picked.contains(&(value - 1)) {
            picked.push(value - 1);
        }
    }
    if picked.is_empty() {
        return Err(ValidationError::EmptySelection);
    }
    Ok(picked)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choice_index_bounds() {
        assert_eq!(choice_index("3", 5), Ok(3));
        assert_eq!(choice_index(" 1 ", 5), Ok(1));
        assert_eq!(
            choice_index("0", 5),
            Err(ValidationError::OutOfRange { value: 0, max: 5 })
        );
        assert_eq!(
            choice_index("6", 5),
            Err(ValidationError::OutOfRange { value: 6, max: 5 })
        );
        assert_eq!(
            choice_index("-2", 5),
            Err(ValidationError::OutOfRange { value: -2, max: 5 })
        );
        assert!(matches!(
            choice_index("tres", 5),
            Err(ValidationError::NotANumber { .. })
        ));
        assert_eq!(choice_index("  ", 5), Err(ValidationError::EmptyInput));
    }

    #[test]
    fn huge_number_is_out_of_range_not_a_panic() {
        assert!(choice_index("99999999999999999999", 5).is_err());
        assert!(choice_index("9223372036854775807", 5).is_err());
    }

    #[test]
    fn phone_pattern() {
        assert!(phone("+56912345678").is_ok());
        assert!(phone("+56 9 1234 5678").is_ok());
        assert!(phone("(2) 234-5678").is_ok());
        assert_eq!(phone("12345"), Err(ValidationError::InvalidPhone));
        assert_eq!(phone("llámame"), Err(ValidationError::InvalidPhone));
    }

    #[test]
    fn rut_formats() {
        assert_eq!(rut("12345678-9").unwrap(), "12345678-9");
        assert_eq!(rut("12.345.678-9").unwrap(), "12.345.678-9");
        assert_eq!(rut("9.876.543-k").unwrap(), "9.876.543-K");
        assert_eq!(rut("12345678"), Err(ValidationError::InvalidRut));
        assert_eq!(rut("12-345-678-9"), Err(ValidationError::InvalidRut));
        assert_eq!(rut("abc"), Err(ValidationError::InvalidRut));
    }

    #[test]
    fn identifier_dispatches_on_method() {
        assert!(identifier(ID_METHOD_CLIENT_NUMBER, "004512").is_ok());
        assert_eq!(
            identifier(ID_METHOD_CLIENT_NUMBER, "45-12"),
            Err(ValidationError::InvalidClientNumber)
        );
        assert!(identifier(ID_METHOD_RUT, "12345678-9").is_ok());
        assert!(identifier(ID_METHOD_FULL_NAME, "Ana Pérez").is_ok());
        assert_eq!(
            identifier(ID_METHOD_FULL_NAME, "12"),
            Err(ValidationError::InvalidName)
        );
    }

    #[test]
    fn yes_no_words_and_numbers() {
        assert_eq!(yes_no("Sí"), Ok(true));
        assert_eq!(yes_no("1"), Ok(true));
        assert_eq!(yes_no("NO"), Ok(false));
        assert_eq!(yes_no("2"), Ok(false));
        assert_eq!(yes_no("quizás"), Err(ValidationError::InvalidYesNo));
    }

    #[test]
    fn multi_selection_rules() {
        assert_eq!(multi_selection("1,2", 2), Ok(vec![0, 1]));
        assert_eq!(multi_selection(" 2 , 1 ,2", 3), Ok(vec![1, 0]));
        assert_eq!(
            multi_selection("1,3", 2),
            Err(ValidationError::InvalidSelection { token: "3".into() })
        );
        assert_eq!(
            multi_selection("1,x", 2),
            Err(ValidationError::InvalidSelection { token: "x".into() })
        );
        assert_eq!(multi_selection(",,", 2), Err(ValidationError::EmptySelection));
    }
}
