//! Image name rules

use shipami_core::{Error, Result};

pub const MIN_NAME_LEN: usize = 3;
pub const MAX_NAME_LEN: usize = 128;

/// Punctuation allowed in image names besides ASCII letters and digits
const ALLOWED_PUNCTUATION: &[char] = &['(', ')', '[', ']', '.', ' ', '-', '\'', '@', '_'];

/// Name for a copy: override or source name, with an optional `-suffix`
pub fn compose(base: &str, suffix: Option<&str>) -> String {
    match suffix {
        Some(suffix) if !suffix.is_empty() => format!("{}-{}", base, suffix),
        _ => base.to_string(),
    }
}

/// Check the length bound, then replace disallowed characters when `clean`
///
/// The length check always runs first, so cleaning never rescues a name of
/// the wrong length.
pub fn validate(name: &str, clean: bool) -> Result<String> {
    let len = name.chars().count();
    if !(MIN_NAME_LEN..=MAX_NAME_LEN).contains(&len) {
        return Err(Error::invalid_name(
            name,
            format!(
                "must be {}-{} characters long (got {})",
                MIN_NAME_LEN, MAX_NAME_LEN, len
            ),
        ));
    }

    if clean {
        Ok(name
            .chars()
            .map(|c| if is_allowed(c) { c } else { '-' })
            .collect())
    } else {
        Ok(name.to_string())
    }
}

fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || ALLOWED_PUNCTUATION.contains(&c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_replaces_disallowed() {
        assert_eq!(validate("foo#bar", true).unwrap(), "foo-bar");
        assert_eq!(
            validate("web (v2) [rc]. it's@x_y", true).unwrap(),
            "web (v2) [rc]. it's@x_y"
        );
        assert_eq!(validate("a/b:c", true).unwrap(), "a-b-c");
    }

    #[test]
    fn test_no_clean_keeps_name() {
        assert_eq!(validate("foo#bar", false).unwrap(), "foo#bar");
    }

    #[test]
    fn test_length_bounds() {
        for clean in [true, false] {
            assert!(matches!(
                validate("aa", clean),
                Err(Error::InvalidName { .. })
            ));
            assert!(validate(&"x".repeat(129), clean).is_err());
            assert!(validate("abc", clean).is_ok());
            assert!(validate(&"x".repeat(128), clean).is_ok());
        }
    }

    #[test]
    fn test_length_counts_characters() {
        assert!(validate("éé", true)
            .unwrap_err()
            .to_string()
            .contains("got 2"));
        assert_eq!(validate("ééé", true).unwrap(), "---");
    }

    #[test]
    fn test_compose_suffix() {
        assert_eq!(compose("foo", Some("1.0.0")), "foo-1.0.0");
        assert_eq!(compose("foo", None), "foo");
        assert_eq!(compose("foo", Some("")), "foo");
    }
}
