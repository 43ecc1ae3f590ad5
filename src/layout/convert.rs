//! Token-level translation of PHP layout markup into Handlebars.
//!
//! Only a fixed set of forms is recognized:
//!
//! | PHP | Handlebars |
//! |-----|------------|
//! | `<?php ... ?>` (statements) | removed |
//! | `<?= $name ?>` | `{{name}}` |
//! | `<?php echo $name; ?>` | `{{name}}` |
//! | `htmlspecialchars($name, ...)` inside an echo | `name` |
//!
//! Anything else inside an echo is passed through with `$` sigils dropped.
//! The result is not validated here; the catalog parses it at load time.

const OPEN_ECHO: &str = "<?=";
const OPEN_BLOCK: &str = "<?php";
const CLOSE: &str = "?>";

/// Converts PHP template markup to Handlebars syntax.
pub fn php_to_handlebars(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;

    while let Some(start) = rest.find("<?") {
        out.push_str(&rest[..start]);
        let tag = &rest[start..];

        let Some(close) = tag.find(CLOSE) else {
            // Unterminated tag: keep the remainder verbatim.
            out.push_str(tag);
            return out;
        };

        if let Some(expr) = tag[..close].strip_prefix(OPEN_ECHO) {
            push_expression(&mut out, expr);
            rest = &tag[close + CLOSE.len()..];
        } else if let Some(body) = tag[..close].strip_prefix(OPEN_BLOCK) {
            let body = body.trim();
            if let Some(expr) = body.strip_prefix("echo ") {
                push_expression(&mut out, expr);
                rest = &tag[close + CLOSE.len()..];
            } else {
                // A closing tag swallows the newline directly after it.
                let after = &tag[close + CLOSE.len()..];
                rest = after
                    .strip_prefix("\r\n")
                    .or_else(|| after.strip_prefix('\n'))
                    .unwrap_or(after);
            }
        } else {
            out.push_str(&tag[..close + CLOSE.len()]);
            rest = &tag[close + CLOSE.len()..];
        }
    }

    out.push_str(rest);
    out
}

fn push_expression(out: &mut String, expr: &str) {
    out.push_str("{{");
    out.push_str(&translate_expression(expr));
    out.push_str("}}");
}

fn translate_expression(expr: &str) -> String {
    let expr = expr.trim().trim_end_matches(';').trim();

    if let Some(args) = expr
        .strip_prefix("htmlspecialchars(")
        .and_then(|inner| inner.strip_suffix(')'))
    {
        let first = args.split(',').next().unwrap_or_default();
        return translate_expression(first);
    }

    if let Some(name) = expr.strip_prefix('$') {
        if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return name.to_string();
        }
    }

    expr.replace('$', "")
}
