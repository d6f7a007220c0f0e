//! Canonical spelling of creature names.
//!
//! Names are looked up by their canonical form: whitespace trimmed, everything
//! lowercased, then only the first character uppercased. `"PIKACHU"`,
//! `"pikachu"` and `" Pikachu "` all map to `"Pikachu"`.

/// Canonicalize a free-form name into the storage key form.
///
/// Returns an empty string for blank input; callers treat that as "no name".
/// The function is idempotent: `canonical_name(&canonical_name(s)) == canonical_name(s)`.
pub fn canonical_name(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let mut chars = lowered.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };

    let mut upper = first.to_uppercase();
    let mut out = String::with_capacity(lowered.len());
    // Multi-char expansions (e.g. 'ß' -> "SS") would not survive a second pass
    // through lowercasing, so those keep their lowercase form.
    match (upper.next(), upper.next()) {
        (Some(single), None) => out.push(single),
        _ => out.push(first),
    }
    out.push_str(chars.as_str());
    out
}

/// Canonical form of an optional name, `None` when missing or blank.
pub fn canonical_name_opt(raw: Option<&str>) -> Option<String> {
    raw.map(canonical_name).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uppercases_first_and_lowercases_rest() {
        assert_eq!(canonical_name("pikachu"), "Pikachu");
        assert_eq!(canonical_name("PIKACHU"), "Pikachu");
        assert_eq!(canonical_name("pIkAcHu"), "Pikachu");
        assert_eq!(canonical_name("  bulbizarre "), "Bulbizarre");
    }

    #[test]
    fn keeps_non_ascii_letters() {
        assert_eq!(canonical_name("ÉVOLI"), "Évoli");
        assert_eq!(canonical_name("m. mime"), "M. mime");
    }

    #[test]
    fn blank_input_is_empty() {
        assert_eq!(canonical_name(""), "");
        assert_eq!(canonical_name("   "), "");
        assert_eq!(canonical_name_opt(Some("  ")), None);
        assert_eq!(canonical_name_opt(None), None);
        assert_eq!(canonical_name_opt(Some("rattata")).as_deref(), Some("Rattata"));
    }

    #[test]
    fn normalization_is_idempotent() {
        let samples = [
            "pikachu",
            "RATTATA",
            "Nidoran♀",
            "ßeta",
            "İstanbul",
            "ǆemal",
            "ſtar",
            "  mr. MIME  ",
            "123abc",
            "",
            "é",
        ];
        for s in samples {
            let once = canonical_name(s);
            assert_eq!(canonical_name(&once), once, "not idempotent for {s:?}");
        }
    }
}
