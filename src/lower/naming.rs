use std::collections::HashSet;

use once_cell::sync::Lazy;

/// Keywords a field name may not collide with (compared case-insensitively).
static RESERVED: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    crate::ir::PrimitiveKind::ALL
        .iter()
        .map(|k| k.name())
        .chain(["null", "record", "array", "map", "enum", "fixed"])
        .collect()
});

pub fn is_reserved(name: &str) -> bool {
    RESERVED.contains(name.to_ascii_lowercase().as_str())
}

/// Keep `[A-Za-z0-9_]`, map `.` and `-` to `_`, drop everything else.
pub fn sanitize(raw: &str) -> String {
    let mut out: String = raw
        .chars()
        .filter_map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '_' => Some(c),
            '.' | '-' => Some('_'),
            _ => None,
        })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Hands out unique names within one scope: the first claim of a name keeps
/// it, later ones get the first free `name0`, `name1`, ...
#[derive(Debug, Default)]
pub struct Namer {
    used: HashSet<String>,
}

impl Namer {
    pub fn new() -> Self { Self::default() }

    pub fn claim(&mut self, raw: &str) -> String {
        let base = sanitize(raw);
        if !is_reserved(&base) && self.used.insert(base.clone()) {
            return base;
        }
        for i in 0u64.. {
            let candidate = format!("{base}{i}");
            if !is_reserved(&candidate) && self.used.insert(candidate.clone()) {
                return candidate;
            }
        }
        unreachable!("suffix space exhausted")
    }
}
