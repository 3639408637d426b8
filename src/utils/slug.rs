use regex::Regex;

/// Derives a URL slug from a title: lowercase, non-alphanumeric runs
/// collapsed to single hyphens, leading/trailing hyphens trimmed.
pub fn slugify(title: &str) -> String {
    let re = Regex::new(r"[^a-z0-9]+").unwrap();
    re.replace_all(&title.to_lowercase(), "-")
        .trim_matches('-')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::slugify;

    #[test]
    fn collapses_and_trims() {
        assert_eq!(slugify("Rust Basics: Level 1!"), "rust-basics-level-1");
        assert_eq!(slugify("  --Weird   Title--  "), "weird-title");
        assert_eq!(slugify("already-a-slug"), "already-a-slug");
    }
}
