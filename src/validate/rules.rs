//! Built-in validator rules.
//!
//! These are the defaults the engine ships with; full per-jurisdiction
//! catalogues are external plugins built with the same [`ValidatorRule`]
//! constructor. Every predicate here is checksum-backed: a candidate is only
//! confirmed when the arithmetic proves it, so shape matches alone never
//! cause a replacement.

use std::sync::Arc;

use regex::Regex;

use super::algorithms;
use super::{Normalization, RuleId, ValidatorRule};

const CPF_WEIGHTS_1: [u32; 9] = [10, 9, 8, 7, 6, 5, 4, 3, 2];
const CPF_WEIGHTS_2: [u32; 10] = [11, 10, 9, 8, 7, 6, 5, 4, 3, 2];
const CNPJ_WEIGHTS_1: [u32; 12] = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
const CNPJ_WEIGHTS_2: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

fn digit_values(raw: &str) -> Vec<u8> {
    raw.bytes()
        .filter(u8::is_ascii_digit)
        .map(|b| b - b'0')
        .collect()
}

fn all_same(digits: &[u8]) -> bool {
    digits.windows(2).all(|w| w[0] == w[1])
}

fn cpf_valid(raw: &str) -> bool {
    let d = digit_values(raw);
    if d.len() != 11 || all_same(&d) {
        return false;
    }
    d[9] == algorithms::mod11_check_digit(&d[..9], &CPF_WEIGHTS_1)
        && d[10] == algorithms::mod11_check_digit(&d[..10], &CPF_WEIGHTS_2)
}

fn cnpj_valid(raw: &str) -> bool {
    let d = digit_values(raw);
    if d.len() != 14 || all_same(&d) {
        return false;
    }
    d[12] == algorithms::mod11_check_digit(&d[..12], &CNPJ_WEIGHTS_1)
        && d[13] == algorithms::mod11_check_digit(&d[..13], &CNPJ_WEIGHTS_2)
}

fn credit_card_valid(raw: &str) -> bool {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    (13..=16).contains(&digits.len()) && algorithms::luhn(&digits)
}

fn aadhaar_valid(raw: &str) -> bool {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    digits.len() == 12 && algorithms::verhoeff(&digits)
}

fn iban_valid(raw: &str) -> bool {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect();
    if !(15..=34).contains(&compact.len())
        || !compact.bytes().all(|b| b.is_ascii_alphanumeric())
    {
        return false;
    }
    let b = compact.as_bytes();
    if !b[0].is_ascii_uppercase()
        || !b[1].is_ascii_uppercase()
        || !b[2].is_ascii_digit()
        || !b[3].is_ascii_digit()
    {
        return false;
    }
    // ISO 7064: move the country prefix and check digits to the end, expand
    // letters to two-digit values, then reduce mod 97.
    let mut rem: u64 = 0;
    for byte in compact.bytes().skip(4).chain(compact.bytes().take(4)) {
        rem = if byte.is_ascii_digit() {
            (rem * 10 + u64::from(byte - b'0')) % 97
        } else {
            (rem * 100 + u64::from(byte - b'A' + 10)) % 97
        };
    }
    rem == 1
}

/// Brazilian CPF: 11 digits, two weighted mod-11 check digits.
pub fn cpf() -> ValidatorRule {
    ValidatorRule::new(
        RuleId::new("BR", "CPF"),
        r"\b\d{3}\.?\d{3}\.?\d{3}-?\d{2}\b",
        Normalization::Digits,
        Arc::new(cpf_valid),
    )
}

/// Brazilian CNPJ: 14 digits, two weighted mod-11 check digits.
pub fn cnpj() -> ValidatorRule {
    ValidatorRule::new(
        RuleId::new("BR", "CNPJ"),
        r"\b\d{2}\.?\d{3}\.?\d{3}/?\d{4}-?\d{2}\b",
        Normalization::Digits,
        Arc::new(cnpj_valid),
    )
}

/// Payment card numbers: 13-16 digits passing Luhn.
pub fn credit_card() -> ValidatorRule {
    ValidatorRule::new(
        RuleId::new("FINANCE", "CREDIT_CARD"),
        r"\b(?:\d[ -]*?){13,16}\b",
        Normalization::Digits,
        Arc::new(credit_card_valid),
    )
}

/// Brazilian PIX keys: random UUID, e-mail address, or +55 phone number.
/// CPF/CNPJ-shaped keys are covered by their own rules.
pub fn pix() -> ValidatorRule {
    let uuid_re = Regex::new(
        r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$",
    )
    .expect("built-in pix uuid pattern should compile");
    let email_re =
        Regex::new(r"^[\w.-]+@[\w.-]+\.\w+$").expect("built-in pix email pattern should compile");
    let phone_re =
        Regex::new(r"^\+55\d{10,11}$").expect("built-in pix phone pattern should compile");

    ValidatorRule::new(
        RuleId::new("BR", "PIX"),
        r"(?i)(?:\b[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}\b)|(?:\+55\d{10,11})|(?:\b[\w.-]+@[\w.-]+\.\w+\b)",
        Normalization::Verbatim,
        Arc::new(move |raw: &str| {
            let key = raw.trim();
            uuid_re.is_match(key) || email_re.is_match(key) || phone_re.is_match(key)
        }),
    )
}

/// IBAN account numbers: ISO 7064 mod 97-10 over the rearranged form.
pub fn iban() -> ValidatorRule {
    ValidatorRule::new(
        RuleId::new("FINANCE", "IBAN"),
        r"\b[A-Z]{2}\d{2}(?:\s?[A-Z0-9]{4}){2,7}(?:\s?[A-Z0-9]{1,3})?\b",
        Normalization::StripSpaces,
        Arc::new(iban_valid),
    )
}

/// Indian Aadhaar: 12 digits with a Verhoeff check digit.
pub fn aadhaar() -> ValidatorRule {
    ValidatorRule::new(
        RuleId::new("IN", "AADHAAR"),
        r"\b[2-9]\d{3}\s?\d{4}\s?\d{4}\b",
        Normalization::Digits,
        Arc::new(aadhaar_valid),
    )
}

/// The default rule set, in registration order. Order matters: CNPJ comes
/// before the card rule so a 14-digit CNPJ wins the overlap tie-break
/// against the 13-16 digit card shape.
pub fn default_rules() -> Vec<ValidatorRule> {
    vec![cpf(), cnpj(), credit_card(), pix(), iban(), aadhaar()]
}
