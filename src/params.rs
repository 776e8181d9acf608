//! Text-level parameter-name extraction.
//!
//! The resolution engine treats this as a narrow collaborator: given the
//! source-like signature text attached to an [`InjectFn`](crate::InjectFn),
//! produce the ordered list of declared parameter names. It understands the
//! common declaration shapes (`fn name(a, b)`, `name(a, b)`, `(a, b)`,
//! closure pipes `|a, b|`), tolerates comments, `mut`/`ref` bindings and type
//! ascriptions, and skips receivers and `_` placeholders. Anything more
//! exotic (destructuring patterns, rest capture) is unspecified and comes out
//! however the splitter leaves it.

/// Extracts the ordered parameter names declared in `signature`.
pub fn extract(signature: &str) -> Vec<String> {
    let cleaned = strip_comments(signature);
    let list = match parameter_list(&cleaned) {
        Some(list) => list,
        None => return Vec::new(),
    };
    split_top_level(list)
        .into_iter()
        .filter_map(binding_name)
        .collect()
}

/// Removes `//` line comments and `/* */` block comments.
fn strip_comments(src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    let mut chars = src.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '/' {
            match chars.peek() {
                Some('/') => {
                    for c in chars.by_ref() {
                        if c == '\n' {
                            out.push('\n');
                            break;
                        }
                    }
                    continue;
                }
                Some('*') => {
                    chars.next();
                    let mut prev = '\0';
                    for c in chars.by_ref() {
                        if prev == '*' && c == '/' {
                            break;
                        }
                        prev = c;
                    }
                    // Comments separate tokens.
                    out.push(' ');
                    continue;
                }
                _ => {}
            }
        }
        out.push(c);
    }
    out
}

/// Locates the raw text of the parameter list: the body of the first
/// balanced paren group, or of a leading closure pipe pair.
fn parameter_list(src: &str) -> Option<&str> {
    // Closure shape first: `|a, b| ...`, optionally behind `async` / `move`.
    // The body may contain parens, so the pipe check cannot come second.
    let head = src.trim_start();
    let head = head.strip_prefix("async").unwrap_or(head).trim_start();
    let head = head.strip_prefix("move").unwrap_or(head).trim_start();
    if let Some(rest) = head.strip_prefix('|') {
        return rest.find('|').map(|close| &rest[..close]);
    }

    if let Some(open) = src.find('(') {
        let rest = &src[open + 1..];
        let mut depth = 1usize;
        for (i, c) in rest.char_indices() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(&rest[..i]);
                    }
                }
                _ => {}
            }
        }
    }
    None
}

/// Splits a parameter list on commas, ignoring commas nested inside parens,
/// brackets, braces, or angle brackets (so `a: HashMap<K, V>` stays whole).
fn split_top_level(list: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut angle = 0usize;
    let mut start = 0usize;
    for (i, c) in list.char_indices() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            '<' => angle += 1,
            // `->` in an ascribed fn type must not close an angle group.
            '>' if angle > 0 && !list[..i].ends_with('-') => angle -= 1,
            ',' if depth == 0 && angle == 0 => {
                out.push(&list[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if start < list.len() {
        out.push(&list[start..]);
    }
    out
}

/// Reduces one declared parameter to its binding name, or drops it.
fn binding_name(param: &str) -> Option<String> {
    let pattern = match param.find(':') {
        Some(colon) => &param[..colon],
        None => param,
    };
    let mut name = pattern.trim();
    name = name.trim_start_matches('&').trim_start();
    if let Some(rest) = name.strip_prefix("mut ") {
        name = rest.trim();
    }
    if let Some(rest) = name.strip_prefix("ref ") {
        name = rest.trim();
    }
    if name.is_empty() || name == "self" || name == "_" {
        return None;
    }
    Some(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::extract;

    fn names(signature: &str) -> Vec<String> {
        extract(signature)
    }

    #[test]
    fn plain_function_declaration() {
        assert_eq!(names("fn greet(name, punctuation)"), ["name", "punctuation"]);
    }

    #[test]
    fn bare_name_and_parens() {
        assert_eq!(names("greet(name)"), ["name"]);
        assert_eq!(names("(a, b, c)"), ["a", "b", "c"]);
    }

    #[test]
    fn closure_pipes() {
        assert_eq!(names("|db, cache| db.query(cache)"), ["db", "cache"]);
        assert_eq!(names("async move |x| x"), ["x"]);
    }

    #[test]
    fn empty_lists() {
        assert_eq!(names("fn nullary()"), Vec::<String>::new());
        assert_eq!(names("|| 1"), Vec::<String>::new());
        assert_eq!(names("no parameter list here"), Vec::<String>::new());
    }

    #[test]
    fn type_ascriptions_are_dropped() {
        assert_eq!(names("fn f(a: u32, b: HashMap<String, u32>)"), ["a", "b"]);
        assert_eq!(names("fn g(cb: Fn(u32) -> u32, tail: Vec<u8>)"), ["cb", "tail"]);
    }

    #[test]
    fn receivers_and_placeholders_are_skipped() {
        assert_eq!(names("fn m(&self, conn, _)"), ["conn"]);
        assert_eq!(names("fn m(&mut self, x)"), ["x"]);
        assert_eq!(names("fn m(self, x)"), ["x"]);
    }

    #[test]
    fn bindings_are_normalized() {
        assert_eq!(names("fn f(mut a, ref b, &c)"), ["a", "b", "c"]);
    }

    #[test]
    fn comments_inside_the_list() {
        assert_eq!(
            names("fn f(a, /* legacy */ b, // trailing\n c)"),
            ["a", "b", "c"]
        );
    }

    #[test]
    fn underscore_prefixed_names_survive() {
        assert_eq!(names("fn f(_unused, real)"), ["_unused", "real"]);
    }

    #[test]
    fn declaration_order_is_preserved() {
        assert_eq!(names("fn f(z, a, m)"), ["z", "a", "m"]);
    }
}
