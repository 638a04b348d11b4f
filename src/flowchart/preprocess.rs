//! Canonicalization of raw flowchart text before parsing.

const DEFAULT_HEADER: &str = "flowchart TD";

/// Normalizes raw text so the parser sees a predictable shape:
/// a header line first, trimmed lines, and no empty subgraph bodies.
///
/// Best effort and idempotent; never fails.
pub fn normalize(raw: &str) -> String {
    let lines: Vec<&str> = raw.lines().map(str::trim).collect();

    let mut out: Vec<String> = Vec::with_capacity(lines.len() + 1);
    match lines.iter().position(|l| !l.is_empty()) {
        Some(first) if is_header(lines[first]) => {}
        _ => out.push(DEFAULT_HEADER.to_string()),
    }

    let mut unnamed = 0usize;
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        out.push(line.to_string());

        if let Some(name) = subgraph_name(line) {
            if body_is_empty(&lines[i + 1..]) {
                out.push(placeholder_line(name, &mut unnamed));
            }
        }
        i += 1;
    }

    // Trailing blank lines are not significant; dropping them keeps the
    // output stable under repeated normalization.
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }

    out.join("\n")
}

fn is_header(line: &str) -> bool {
    let keyword = line.split_whitespace().next().unwrap_or("");
    keyword == "flowchart" || keyword == "graph"
}

fn subgraph_name(line: &str) -> Option<&str> {
    if line == "subgraph" {
        return Some("");
    }
    line.strip_prefix("subgraph ").map(str::trim)
}

/// Splits the text after `subgraph` into its key and its display title.
///
/// `one [Group One]` yields `("one", "Group One")`; anything else is used
/// for both, minus surrounding quotes.
pub(super) fn subgraph_header(rest: &str) -> (&str, &str) {
    let rest = rest.trim();
    if let Some(open) = rest.find('[') {
        if let Some(inner) = rest[open + 1..].strip_suffix(']') {
            let key = rest[..open].trim();
            let title = inner.trim().trim_matches('"');
            return (if key.is_empty() { title } else { key }, title);
        }
    }
    let title = rest.trim_matches('"');
    (title, title)
}

fn is_end(line: &str) -> bool {
    line.strip_suffix(';').unwrap_or(line).trim_end() == "end"
}

/// True when the lines up to the matching `end` hold only blanks and comments.
fn body_is_empty(rest: &[&str]) -> bool {
    for line in rest {
        if is_end(line) {
            return true;
        }
        if line.is_empty() || line.starts_with('%') {
            continue;
        }
        return false;
    }
    // Unterminated block: nothing to fill.
    false
}

fn placeholder_line(name: &str, unnamed: &mut usize) -> String {
    let (key, title) = subgraph_header(name);
    let base: String = key
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    // Brackets and pipes would end the declaration early.
    let label: String = title
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | '{' | '}' | '(' | ')' | '|' | '"'))
        .collect();
    let label = label.trim();

    if base.is_empty() {
        *unnamed += 1;
        let id = format!("subgraph_{}", unnamed);
        format!("{}_placeholder[{}]", id, id)
    } else if label.is_empty() {
        format!("{}_placeholder[{}]", base, base)
    } else {
        format!("{}_placeholder[{}]", base, label)
    }
}
