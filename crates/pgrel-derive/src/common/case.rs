//! Default column naming.

/// Convert a field identifier to a column name.
///
/// An underscore goes before an uppercase letter that follows a lowercase
/// letter or digit, and before the last letter of an uppercase run when a
/// lowercase letter follows it (`HTTPServer` -> `http_server`). Existing
/// underscores are kept and never doubled. The result is lower-cased.
pub fn to_snake_case(ident: &str) -> String {
    let chars: Vec<char> = ident.chars().collect();
    let mut out = String::with_capacity(ident.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if i > 0 && c.is_uppercase() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let boundary = prev.is_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_uppercase() && next_is_lower);
            if boundary && prev != '_' {
                out.push('_');
            }
        }
        out.extend(c.to_lowercase());
    }
    out
}
