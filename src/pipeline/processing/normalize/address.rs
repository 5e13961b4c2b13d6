use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));
// Numbers exported through spreadsheet tooling come back as `12.0`
static FLOAT_ARTIFACT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d+)\.0\b").expect("valid float artifact regex"));

/// Trim, collapse inner whitespace and lower-case a free-text component.
/// Returns `None` when nothing meaningful remains.
pub fn normalize_component(raw: Option<&str>) -> Option<String> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        return None;
    }
    let collapsed = WHITESPACE.replace_all(trimmed, " ");
    let cleaned = FLOAT_ARTIFACT.replace_all(&collapsed, "$1");
    Some(cleaned.to_lowercase())
}

/// Dutch postal codes are compared without spaces: `1234 AB` == `1234ab`.
pub fn normalize_postal_code(raw: Option<&str>) -> Option<String> {
    let value = normalize_component(raw)?;
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    Some(compact)
}

/// Building blocks of a standardized address.
#[derive(Debug, Clone, Copy, Default)]
pub struct AddressParts<'a> {
    pub street: Option<&'a str>,
    pub house_number: Option<&'a str>,
    pub house_number_addition: Option<&'a str>,
    pub postal_code: Option<&'a str>,
    pub city: Option<&'a str>,
}

/// Canonical address key: `"{street} {number}{addition}, {postcode}, {city}"`,
/// lower-cased with empty components omitted. Equivalent addresses written
/// with different spacing or case produce the same key.
pub fn standardize_address(parts: &AddressParts<'_>) -> String {
    let mut street_line = String::new();
    if let Some(street) = normalize_component(parts.street) {
        street_line.push_str(&street);
    }
    let number = normalize_component(parts.house_number);
    let addition = normalize_component(parts.house_number_addition);
    if number.is_some() || addition.is_some() {
        if !street_line.is_empty() {
            street_line.push(' ');
        }
        if let Some(number) = number {
            street_line.push_str(&number);
        }
        if let Some(addition) = addition {
            street_line.push_str(&addition.replace(' ', ""));
        }
    }

    let components: Vec<String> = [
        Some(street_line).filter(|s| !s.is_empty()),
        normalize_postal_code(parts.postal_code),
        normalize_component(parts.city),
    ]
    .into_iter()
    .flatten()
    .collect();

    components.join(", ")
}

/// Re-standardize an already assembled address such as `"Main St 1, 1234 AB, Amsterdam"`.
/// Applying it to its own output is a no-op.
pub fn standardize_free_text(address: &str) -> String {
    address
        .split(',')
        .filter_map(|part| normalize_component(Some(part)))
        .enumerate()
        .map(|(i, part)| {
            // The second component of a standardized address is the postal code
            if i == 1 && looks_like_postal_code(&part) {
                part.replace(' ', "")
            } else {
                part
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn looks_like_postal_code(value: &str) -> bool {
    let compact: Vec<char> = value.chars().filter(|c| !c.is_whitespace()).collect();
    compact.len() == 6
        && compact[..4].iter().all(|c| c.is_ascii_digit())
        && compact[4..].iter().all(|c| c.is_ascii_alphabetic())
}

/// Provider query for a standardized address: adds province and region so
/// the provider does not resolve to a same-named street abroad.
pub fn geocode_query(full_address: &str, province: Option<&str>, region_suffix: &str) -> String {
    let mut query = full_address.to_string();
    if let Some(province) = normalize_component(province) {
        query.push_str(", ");
        query.push_str(&province);
    }
    let region = region_suffix.trim();
    if !region.is_empty() {
        query.push_str(", ");
        query.push_str(region);
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equivalent_addresses_collide() {
        let a = standardize_address(&AddressParts {
            street: Some("Main St"),
            house_number: Some("1"),
            postal_code: Some("1234AB"),
            city: Some("Amsterdam"),
            ..Default::default()
        });
        let b = standardize_address(&AddressParts {
            street: Some("  MAIN   st "),
            house_number: Some("1.0"),
            postal_code: Some("1234 ab"),
            city: Some("amsterdam "),
            ..Default::default()
        });
        assert_eq!(a, "main st 1, 1234ab, amsterdam");
        assert_eq!(a, b);
    }

    #[test]
    fn test_addition_and_missing_components() {
        let with_addition = standardize_address(&AddressParts {
            street: Some("Kerkstraat"),
            house_number: Some("12"),
            house_number_addition: Some(" A "),
            postal_code: None,
            city: Some("Utrecht"),
        });
        assert_eq!(with_addition, "kerkstraat 12a, utrecht");

        let postcode_only = standardize_address(&AddressParts {
            postal_code: Some("9711 LM"),
            ..Default::default()
        });
        assert_eq!(postcode_only, "9711lm");
    }

    #[test]
    fn test_free_text_matches_component_form() {
        let from_parts = standardize_address(&AddressParts {
            street: Some("Main St"),
            house_number: Some("1"),
            postal_code: Some("1234AB"),
            city: Some("Amsterdam"),
            ..Default::default()
        });
        let from_text = standardize_free_text("Main St 1, 1234 AB,  Amsterdam");
        assert_eq!(from_parts, from_text);
        assert_eq!(standardize_free_text(&from_text), from_text);
    }

    #[test]
    fn test_geocode_query_appends_province_and_region() {
        let query = geocode_query("main st 1, 1234ab, amsterdam", Some("Noord-Holland"), "Netherlands");
        assert_eq!(query, "main st 1, 1234ab, amsterdam, noord-holland, Netherlands");
        assert_eq!(geocode_query("x", None, ""), "x");
    }
}
