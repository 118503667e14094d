//! Fixed list of US states (plus DC) used by the location input.

use serde::Serialize;

pub const STATE_CODE_LEN: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct UsState {
    pub code: &'static str,
    pub name: &'static str,
}

const fn state(code: &'static str, name: &'static str) -> UsState {
    UsState { code, name }
}

pub const US_STATES: [UsState; 51] = [
    state("AL", "Alabama"),
    state("AK", "Alaska"),
    state("AZ", "Arizona"),
    state("AR", "Arkansas"),
    state("CA", "California"),
    state("CO", "Colorado"),
    state("CT", "Connecticut"),
    state("DE", "Delaware"),
    state("FL", "Florida"),
    state("GA", "Georgia"),
    state("HI", "Hawaii"),
    state("ID", "Idaho"),
    state("IL", "Illinois"),
    state("IN", "Indiana"),
    state("IA", "Iowa"),
    state("KS", "Kansas"),
    state("KY", "Kentucky"),
    state("LA", "Louisiana"),
    state("ME", "Maine"),
    state("MD", "Maryland"),
    state("MA", "Massachusetts"),
    state("MI", "Michigan"),
    state("MN", "Minnesota"),
    state("MS", "Mississippi"),
    state("MO", "Missouri"),
    state("MT", "Montana"),
    state("NE", "Nebraska"),
    state("NV", "Nevada"),
    state("NH", "New Hampshire"),
    state("NJ", "New Jersey"),
    state("NM", "New Mexico"),
    state("NY", "New York"),
    state("NC", "North Carolina"),
    state("ND", "North Dakota"),
    state("OH", "Ohio"),
    state("OK", "Oklahoma"),
    state("OR", "Oregon"),
    state("PA", "Pennsylvania"),
    state("RI", "Rhode Island"),
    state("SC", "South Carolina"),
    state("SD", "South Dakota"),
    state("TN", "Tennessee"),
    state("TX", "Texas"),
    state("UT", "Utah"),
    state("VT", "Vermont"),
    state("VA", "Virginia"),
    state("WA", "Washington"),
    state("WV", "West Virginia"),
    state("WI", "Wisconsin"),
    state("WY", "Wyoming"),
    state("DC", "Washington DC"),
];

/// Exact code lookup, ignoring case and surrounding whitespace.
#[must_use]
pub fn find(code: &str) -> Option<&'static UsState> {
    let code = code.trim();
    US_STATES.iter().find(|s| s.code.eq_ignore_ascii_case(code))
}

#[must_use]
pub fn is_valid_code(code: &str) -> bool {
    find(code).is_some()
}

/// Case-insensitive substring match over code or full name, in catalog
/// order. An empty (or all-whitespace) query matches everything.
#[must_use]
pub fn filter_states(query: &str) -> Vec<&'static UsState> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return US_STATES.iter().collect();
    }

    US_STATES
        .iter()
        .filter(|s| {
            s.name.to_lowercase().contains(&needle) || s.code.to_lowercase().contains(&needle)
        })
        .collect()
}

/// Exact full-name lookup, ignoring case and runs of whitespace.
#[must_use]
pub fn find_by_name(name: &str) -> Option<&'static UsState> {
    let wanted: Vec<&str> = name.split_whitespace().collect();
    if wanted.is_empty() {
        return None;
    }

    US_STATES.iter().find(|s| {
        let words: Vec<&str> = s.name.split_whitespace().collect();
        words.len() == wanted.len()
            && words
                .iter()
                .zip(&wanted)
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
    })
}

/// Typed state entry. A full state name becomes its code; anything else is
/// uppercased with whitespace removed and never truncated, so partial
/// names stay invalid instead of turning into some other state's code.
#[must_use]
pub fn normalize_typed_code(input: &str) -> String {
    if let Some(state) = find_by_name(input) {
        return state.code.to_string();
    }

    input
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}
