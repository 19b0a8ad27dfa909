//! Set-or-append edits for `key value` / `key = value` configuration files.
//!
//! The first line defining `key` (commented out or not) is replaced, later
//! definitions are dropped, and the directive is appended when absent.
//! Applying the same edit twice yields the same text.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveStyle {
    /// `key value` (redis.conf)
    Space,
    /// `key = value` (php.ini)
    Equals,
}

impl DirectiveStyle {
    fn render(self, key: &str, value: &str) -> String {
        match self {
            Self::Space => format!("{key} {value}"),
            Self::Equals => format!("{key} = {value}"),
        }
    }
}

/// Whether `line` defines `key`, ignoring a leading `#`/`;` comment marker
fn defines(line: &str, key: &str) -> bool {
    let body = line.trim_start().trim_start_matches(['#', ';']).trim_start();
    match body.strip_prefix(key) {
        Some(rest) => rest.is_empty() || rest.starts_with([' ', '\t', '=']),
        None => false,
    }
}

pub fn set_directive(content: &str, key: &str, value: &str, style: DirectiveStyle) -> String {
    let directive = style.render(key, value);
    let mut replaced = false;
    let mut lines: Vec<String> = Vec::new();

    for line in content.lines() {
        if defines(line, key) {
            if !replaced {
                lines.push(directive.clone());
                replaced = true;
            }
            continue;
        }
        lines.push(line.to_string());
    }
    if !replaced {
        lines.push(directive);
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Apply several directives in order
pub fn set_directives(content: &str, directives: &[(&str, &str)], style: DirectiveStyle) -> String {
    directives
        .iter()
        .fold(content.to_string(), |acc, (key, value)| set_directive(&acc, key, value, style))
}
