use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use regex::Regex;

use crate::db_types::OrderNumber;

pub const ORDER_NUMBER_PREFIX: &str = "ORD";

/// Generates a new order number of the form `ORD-YYYYMMDD-XXXXXX`, where the suffix is six random upper-case
/// alphanumeric characters.
pub fn generate_order_number(at: DateTime<Utc>) -> OrderNumber {
    let suffix: String =
        rand::thread_rng().sample_iter(&Alphanumeric).take(6).map(|c| char::from(c).to_ascii_uppercase()).collect();
    OrderNumber(format!("{ORDER_NUMBER_PREFIX}-{}-{suffix}", at.format("%Y%m%d")))
}

/// Extracts every order number mentioned in a bank transaction description (or any other free text).
///
/// Two forms are recognised:
/// * generated order numbers, e.g. `ORD-20240131-K3J9QX`, matched case-insensitively and normalised to upper case,
/// * any token enclosed in square brackets, e.g. `[A-1002]`, for merchant-supplied order numbers.
///
/// The result preserves the order of first appearance and contains no duplicates.
pub fn extract_order_numbers_from_description(description: &str) -> Vec<OrderNumber> {
    let generated = Regex::new(r"(?i)\bORD-\d{8}-[A-Z0-9]{6}\b").unwrap();
    let bracketed = Regex::new(r"\[([\w-]+)\]").unwrap();
    let mut found: Vec<(usize, String)> = generated
        .find_iter(description)
        .map(|m| (m.start(), m.as_str().to_ascii_uppercase()))
        .chain(
            bracketed
                .captures_iter(description)
                .filter_map(|c| c.get(1))
                .map(|m| (m.start(), m.as_str().to_string())),
        )
        .collect();
    found.sort_by_key(|(pos, _)| *pos);
    let mut result: Vec<OrderNumber> = Vec::with_capacity(found.len());
    for (_, number) in found {
        let number = OrderNumber(number);
        if !result.contains(&number) {
            result.push(number);
        }
    }
    result
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn generated_numbers_have_expected_shape() {
        let at = Utc.with_ymd_and_hms(2024, 1, 31, 10, 0, 0).unwrap();
        let number = generate_order_number(at);
        assert!(number.as_str().starts_with("ORD-20240131-"), "{number}");
        assert_eq!(number.as_str().len(), "ORD-20240131-".len() + 6);
        let found = extract_order_numbers_from_description(&format!("Payment for {number}, thanks"));
        assert_eq!(found, vec![number]);
    }

    #[test]
    fn find_order_numbers() {
        assert!(extract_order_numbers_from_description("").is_empty());
        assert!(extract_order_numbers_from_description("Some random text").is_empty());
        let found = extract_order_numbers_from_description("[1234]");
        assert_eq!(found, vec![OrderNumber::from("1234")]);
        // spaces are not allowed inside brackets
        assert!(extract_order_numbers_from_description("Order#: [Some Order Number]").is_empty());
        let found = extract_order_numbers_from_description("Order#: [SomeOrderNumber]");
        assert_eq!(found, vec![OrderNumber::from("SomeOrderNumber")]);
    }

    #[test]
    fn generated_numbers_are_normalised_and_deduplicated() {
        let found = extract_order_numbers_from_description(
            "CK ord-20240131-abc123 thanh toan [ORD-20240131-ABC123] va ORD-20240201-ZZZ999",
        );
        assert_eq!(found, vec![OrderNumber::from("ORD-20240131-ABC123"), OrderNumber::from("ORD-20240201-ZZZ999")]);
    }
}
