use once_cell::sync::Lazy;
use regex::Regex;

// @module: Placeholder patterns shared by format handlers

// @struct: Named placeholder syntax
#[derive(Debug)]
pub struct PlaceholderPattern {
    // @field: Short identifier
    pub name: &'static str,

    // @field: Compiled pattern
    pub regex: Regex,

    // @field: Example of a matching placeholder
    pub example: &'static str,
}

fn pattern(name: &'static str, regex: &str, example: &'static str) -> PlaceholderPattern {
    PlaceholderPattern {
        name,
        regex: Regex::new(regex).expect("Invalid placeholder regex"),
        example,
    }
}

// @const: Known placeholder syntaxes
static PATTERNS: Lazy<Vec<PlaceholderPattern>> = Lazy::new(|| {
    vec![
        pattern("i18next", r"\{\{(\w+)\}\}", "{{name}}"),
        pattern("icu", r"\{(\w+)\}", "{name}"),
        pattern("icu_full", r"\{[^{}]+\}", "{count, plural, one {#} other {#}}"),
        pattern("printf", r"%[\d$]*[sd]", "%s"),
        pattern("printf_named", r"%\((\w+)\)s", "%(name)s"),
        pattern("ruby", r"%\{(\w+)\}", "%{name}"),
        pattern("android", r"%\d+\$[sd]", "%1$s"),
        pattern("ios", r"%@|%ld|%d|%f", "%@"),
        pattern("html_tag", r"</?[A-Za-z][^<>]*>", "<i>"),
        pattern("ass_override", r"\{\\[^{}]*\}", r"{\an8}"),
    ]
});

/// All known patterns
pub fn all() -> &'static [PlaceholderPattern] {
    &PATTERNS
}

/// Look up a pattern by name
pub fn get(name: &str) -> Option<&'static PlaceholderPattern> {
    PATTERNS.iter().find(|p| p.name == name)
}

/// Compiled regexes for the given names; unknown names are skipped
pub fn regexes(names: &[&str]) -> Vec<Regex> {
    names
        .iter()
        .filter_map(|name| get(name))
        .map(|p| p.regex.clone())
        .collect()
}
