// src/matching/name.rs
// Person name normalization shared by preprocessing, blocking keys and comparators.

use once_cell::sync::Lazy;
use regex::Regex;

const NAME_PREFIXES: [&str; 8] = ["mr", "mrs", "ms", "miss", "dr", "rev", "prof", "sir"];

const NAME_SUFFIXES: [&str; 9] = ["jr", "sr", "ii", "iii", "iv", "v", "md", "phd", "esq"];

static NICKNAME_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"^(wm|will|bill|billy)$", "william"),
        (r"^(bob|bobby|rob|robbie)$", "robert"),
        (r"^(jim|jimmy|jas)$", "james"),
        (r"^(mike|mikey)$", "michael"),
        (r"^(liz|beth|betty|eliza)$", "elizabeth"),
        (r"^(chas|chuck|charlie)$", "charles"),
        (r"^(kate|katie|kathy)$", "katherine"),
        (r"^(jon|johnny|jack)$", "john"),
    ]
    .iter()
    .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, *replacement)))
    .collect()
});

/// Lowercases, strips punctuation, titles and generational suffixes, and
/// collapses whitespace. `"Dr. Mary-Ann O'Neil, Jr."` becomes `"mary ann oneil"`.
pub fn normalize_person_name(name: &str) -> String {
    let mut normalized = name.to_lowercase();
    let char_substitutions = [
        ("-", " "),
        (".", " "),
        (",", " "),
        ("'", ""),
        ("’", ""),
        ("(", " "),
        (")", " "),
        ("/", " "),
    ];
    for (pattern, replacement) in &char_substitutions {
        normalized = normalized.replace(pattern, replacement);
    }

    let mut tokens: Vec<&str> = normalized.split_whitespace().collect();
    while tokens.len() > 1 && NAME_PREFIXES.contains(&tokens[0]) {
        tokens.remove(0);
    }
    while tokens.len() > 1 && tokens.last().is_some_and(|t| NAME_SUFFIXES.contains(t)) {
        tokens.pop();
    }

    tokens
        .iter()
        .map(|t| {
            t.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
        })
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalized name with common nicknames mapped to their formal form, token
/// by token.
pub fn canonical_person_name(name: &str) -> String {
    normalize_person_name(name)
        .split(' ')
        .filter(|t| !t.is_empty())
        .map(|token| {
            NICKNAME_PATTERNS
                .iter()
                .find(|(re, _)| re.is_match(token))
                .map(|(_, formal)| (*formal).to_string())
                .unwrap_or_else(|| token.to_string())
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// American Soundex code (letter + three digits), or `None` when the input
/// has no ASCII letters.
pub fn soundex(value: &str) -> Option<String> {
    fn code(c: char) -> Option<char> {
        match c {
            'b' | 'f' | 'p' | 'v' => Some('1'),
            'c' | 'g' | 'j' | 'k' | 'q' | 's' | 'x' | 'z' => Some('2'),
            'd' | 't' => Some('3'),
            'l' => Some('4'),
            'm' | 'n' => Some('5'),
            'r' => Some('6'),
            _ => None,
        }
    }

    let letters: Vec<char> = value
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    let first = *letters.first()?;

    let mut result = String::with_capacity(4);
    result.push(first.to_ascii_uppercase());
    let mut last_code = code(first);
    for &c in &letters[1..] {
        let current = code(c);
        match current {
            Some(digit) if current != last_code => {
                result.push(digit);
                if result.len() == 4 {
                    break;
                }
                last_code = current;
            }
            Some(_) => {}
            // 'h' and 'w' do not separate letters with the same code; vowels do.
            None if c == 'h' || c == 'w' => {}
            None => last_code = None,
        }
    }
    while result.len() < 4 {
        result.push('0');
    }
    Some(result)
}
