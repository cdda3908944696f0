use std::path::PathBuf;

/// Expand a leading `~` or `$HOME` to the user's home directory and any
/// other `$VAR` / `${VAR}` occurrence to its environment value. Unset
/// variables stay literal, so the result still names what the user wrote.
pub fn expand_path(raw: &str) -> PathBuf {
    for prefix in ["~/", "$HOME/"] {
        if let Some(rest) = raw.strip_prefix(prefix) {
            if let Some(home) = dirs::home_dir() {
                return home.join(expand_env_vars(rest, env_value));
            }
        }
    }
    if raw == "~" || raw == "$HOME" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(expand_env_vars(raw, env_value))
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Substitute `$VAR` and `${VAR}` through the given lookup. Variable names
/// are ASCII alphanumerics and underscores; a `$` that starts neither form
/// passes through, as does a variable the lookup does not know.
fn expand_env_vars(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(dollar) = rest.find('$') {
        out.push_str(&rest[..dollar]);
        let after = &rest[dollar + 1..];
        let (name, braced, tail) = match after.strip_prefix('{') {
            Some(inner) => match inner.find('}') {
                Some(end) => (&inner[..end], true, &inner[end + 1..]),
                None => ("", false, after),
            },
            None => {
                let len = after
                    .bytes()
                    .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
                    .count();
                (&after[..len], false, &after[len..])
            }
        };
        if name.is_empty() {
            out.push('$');
            rest = after;
            continue;
        }
        match lookup(name) {
            Some(value) => out.push_str(&value),
            None => {
                out.push('$');
                if braced {
                    out.push('{');
                    out.push_str(name);
                    out.push('}');
                } else {
                    out.push_str(name);
                }
            }
        }
        rest = tail;
    }
    out.push_str(rest);
    out
}

/// Flatten an arbitrary key into a single safe file name component
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '.' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
