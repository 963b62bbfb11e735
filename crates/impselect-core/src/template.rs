//! SQL template rendering.
//!
//! Templates use `{name}` placeholders; `{{` and `}}` are literal braces.
//! Values are substituted verbatim. Quoting and injection safety are the
//! caller's responsibility.

use std::collections::BTreeMap;

use crate::error::{ImpselectError, ImpselectResult};

/// Placeholder filled with the iteration value in batch templates.
pub const ITERVAR: &str = "itervar";

/// Substitute every placeholder in `template` from `vars`.
pub fn render(template: &str, vars: &BTreeMap<&str, String>) -> ImpselectResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '{' if chars.peek().map(|&(_, n)| n) == Some('{') => {
                chars.next();
                out.push('{');
            }
            '{' => {
                let mut key = String::new();
                let mut closed = false;
                for (_, k) in chars.by_ref() {
                    if k == '}' {
                        closed = true;
                        break;
                    }
                    key.push(k);
                }
                if !closed {
                    return Err(ImpselectError::template(format!(
                        "unclosed '{{' at byte {}",
                        pos
                    )));
                }
                let value = vars.get(key.as_str()).ok_or_else(|| {
                    ImpselectError::template(format!("unknown placeholder '{{{}}}'", key))
                })?;
                out.push_str(value);
            }
            '}' if chars.peek().map(|&(_, n)| n) == Some('}') => {
                chars.next();
                out.push('}');
            }
            '}' => {
                return Err(ImpselectError::template(format!(
                    "single '}}' at byte {}",
                    pos
                )));
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}

/// Render a batch template with the `{itervar}` placeholder bound to `value`.
pub fn render_itervar(template: &str, value: &str) -> ImpselectResult<String> {
    let mut vars = BTreeMap::new();
    vars.insert(ITERVAR, value.to_string());
    render(template, &vars)
}
