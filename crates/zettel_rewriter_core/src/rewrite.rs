use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;

/// Single alternation covering both wikilink shapes. The aliased arm
/// (`[[42]](details)`) is listed first so it wins over the bare arm for the
/// same span; the bare arm is a title of non-bracket characters.
fn wikilink_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\[\[(?P<id>\d+)\]\]\((?P<alias>[^)]*)\)|\[\[(?P<title>[^\[\]]+)\]\]")
            .expect("wikilink pattern is valid")
    })
}

/// Rewrite every wikilink in one line into markdown link syntax.
///
/// Matched spans are consumed left-to-right without overlap:
/// - `[[42]](details)` becomes `[42](42 details.md)`
/// - `[[Note Title]]` becomes `[Note Title](Note Title.md)`
/// - a bare match whose closing `]]` is immediately followed by `(` is left
///   literal, so `[[foo]](bar)` (non-numeric identifier) passes through.
///
/// Text outside matched spans is untouched, including any trailing newline.
pub fn rewrite_line(line: &str) -> Cow<'_, str> {
    let pattern = wikilink_pattern();
    let mut rewritten = String::new();
    let mut last_end = 0usize;

    for captures in pattern.captures_iter(line) {
        let span = captures.get(0).expect("match has a full span");
        rewritten.push_str(&line[last_end..span.start()]);
        if let Some(id) = captures.name("id") {
            let id = id.as_str();
            let alias = captures
                .name("alias")
                .map(|alias| alias.as_str())
                .unwrap_or_default();
            rewritten.push_str(&format!("[{id}]({id} {alias}.md)"));
        } else if line.as_bytes().get(span.end()) == Some(&b'(') {
            // Bare rule never fires ahead of an alias marker. Keep the span
            // literal and resume scanning after it.
            rewritten.push_str(span.as_str());
        } else {
            let title = captures
                .name("title")
                .expect("bare arm captures a title")
                .as_str();
            rewritten.push_str(&format!("[{title}]({title}.md)"));
        }
        last_end = span.end();
    }

    if last_end == 0 {
        return Cow::Borrowed(line);
    }
    rewritten.push_str(&line[last_end..]);
    Cow::Owned(rewritten)
}

/// Rewrite full file content line by line, preserving line structure and the
/// original newline convention (`\n` or `\r\n`, trailing newline or not).
pub fn rewrite_content(content: &str) -> String {
    let mut output = String::with_capacity(content.len());
    for line in content.split_inclusive('\n') {
        output.push_str(&rewrite_line(line));
    }
    output
}
