//! Title normalization and alias generation

/// Trailing words that describe the container rather than name it
pub const ORGANIZATIONAL_SUFFIXES: &[&str] = &[
    "database",
    "databases",
    "db",
    "dbs",
    "table",
    "tables",
    "list",
    "lists",
];

/// Lowercase with whitespace collapsed to single spaces
pub fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// `normalized` without a trailing organizational word, if it had one
pub fn strip_suffix(normalized: &str) -> Option<String> {
    let words: Vec<&str> = normalized.split(' ').collect();
    match words.split_last() {
        Some((last, rest)) if !rest.is_empty() && ORGANIZATIONAL_SUFFIXES.contains(last) => {
            Some(rest.join(" "))
        }
        _ => None,
    }
}

/// Apply `inflect` to the last word only
fn inflect_last(phrase: &str, inflect: fn(&str) -> String) -> String {
    match phrase.rsplit_once(' ') {
        Some((head, last)) => format!("{head} {}", inflect(last)),
        None => inflect(phrase),
    }
}

pub fn singular(word: &str) -> String {
    if word.len() > 3 && word.ends_with("ies") {
        format!("{}y", &word[..word.len() - 3])
    } else if ["ses", "xes", "ches", "shes"].iter().any(|s| word.ends_with(s)) {
        word[..word.len() - 2].to_string()
    } else if word.len() > 1 && word.ends_with('s') && !word.ends_with("ss") {
        word[..word.len() - 1].to_string()
    } else {
        word.to_string()
    }
}

pub fn plural(word: &str) -> String {
    let consonant_y = word.len() > 1
        && word.ends_with('y')
        && !matches!(
            word[..word.len() - 1].chars().last(),
            Some('a' | 'e' | 'i' | 'o' | 'u')
        );
    if consonant_y {
        format!("{}ies", &word[..word.len() - 1])
    } else if ["s", "x", "ch", "sh"].iter().any(|s| word.ends_with(s)) {
        format!("{word}es")
    } else {
        format!("{word}s")
    }
}

/// First letter of each word, for titles of two or more words
pub fn acronym(normalized: &str) -> Option<String> {
    let words: Vec<&str> = normalized
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|word| word.chars().next().is_some_and(char::is_alphanumeric))
        .collect();
    (words.len() >= 2).then(|| words.iter().filter_map(|word| word.chars().next()).collect())
}

/// Every name an entry titled `title` should answer to, most specific first
pub fn generate_aliases(title: &str) -> Vec<String> {
    let normalized = normalize_title(title);
    if normalized.is_empty() {
        return Vec::new();
    }

    let mut aliases: Vec<String> = Vec::new();
    let mut push = |alias: String| {
        if !alias.is_empty() && !aliases.contains(&alias) {
            aliases.push(alias);
        }
    };

    let stripped = strip_suffix(&normalized);
    for base in std::iter::once(normalized.clone()).chain(stripped) {
        let one = inflect_last(&base, singular);
        push(base.clone());
        push(inflect_last(&one, plural));
        push(one);
    }
    if let Some(acronym) = acronym(&normalized) {
        push(acronym);
    }

    aliases
}

/// Forms of a user query worth comparing against aliases
pub fn query_variants(query: &str) -> Vec<String> {
    let normalized = normalize_title(query);
    let mut variants = vec![normalized.clone()];
    if let Some(stripped) = strip_suffix(&normalized) {
        variants.push(stripped);
    }
    variants
}
