//! YAIL text helpers
//!
//! Literal formatting and the small fixed forms shared by the code generator
//! and the project assembler.

use std::fmt::Write as _;

use crate::rules::is_number;

pub const NULL: &str = "*the-null-value*";
pub const TRUE: &str = "#t";
pub const FALSE: &str = "#f";

/// Emitted instead of a type list when no coercion rule covers a call.
pub const NO_COERCION: &str = "'*no-coercion*";

pub const SET_THIS_FORM: &str = "(set-this-form)";
pub const CLEAR_CURRENT_FORM: &str = "(clear-current-form)";
pub const INIT_RUNTIME: &str = "(init-runtime)";
pub const RUNTIME_REQUIRE: &str = "(require <com.google.youngandroid.runtime>)";
pub const SOURCE_HEADER: &str = "#|\n$Source $Yail\n|#";

/// Quote a string for YAIL. Control characters without a short escape are
/// written as `\xHH;`.
pub fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c.is_control() => {
                let _ = write!(out, "\\x{:x};", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// A number literal, or `None` if the label does not parse.
pub fn number_literal(label: &str) -> Option<String> {
    let trimmed = label.trim();
    if let Some(hex) = hex_digits(trimmed) {
        return Some(format!("#x{}", hex));
    }
    is_number(trimmed).then(|| trimmed.to_string())
}

/// A color literal. Six hex digits get an opaque alpha prepended; eight are
/// taken as given.
pub fn color_literal(label: &str) -> Option<String> {
    let digits = label
        .trim()
        .trim_start_matches('#')
        .trim_start_matches("&H")
        .trim_start_matches("0x");
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    match digits.len() {
        6 => Some(format!("#xFF{}", digits.to_ascii_uppercase())),
        8 => Some(format!("#x{}", digits.to_ascii_uppercase())),
        _ => None,
    }
}

/// Digits of an `&H` prefixed designer number.
fn hex_digits(value: &str) -> Option<&str> {
    let digits = value.strip_prefix("&H")?;
    (!digits.is_empty() && digits.chars().all(|c| c.is_ascii_hexdigit())).then_some(digits)
}

pub fn quote_symbol(name: &str) -> String {
    format!("'{}", name)
}

/// `'(number text)`
pub fn type_list(types: &[String]) -> String {
    format!("'({})", types.join(" "))
}

/// `(*list-for-runtime* a b)`
pub fn runtime_list(args: &[String]) -> String {
    if args.is_empty() {
        "(*list-for-runtime*)".to_string()
    } else {
        format!("(*list-for-runtime* {})", args.join(" "))
    }
}

/// `(begin a b)`; empty fragments are dropped.
pub fn begin(forms: &[String]) -> String {
    let forms: Vec<&str> = forms
        .iter()
        .map(String::as_str)
        .filter(|f| !f.is_empty())
        .collect();
    if forms.is_empty() {
        "(begin)".to_string()
    } else {
        format!("(begin {})", forms.join(" "))
    }
}

pub fn define_global(name: &str, value: &str) -> String {
    format!("(def {} {})", name, value)
}

/// `(def (name a b) body)`
pub fn define_procedure(name: &str, params: &[String], body: &str) -> String {
    let mut head = name.to_string();
    for p in params {
        head.push(' ');
        head.push_str(p);
    }
    format!("(def ({}) {})", head, body)
}

/// `(define-event Button1 Click (x y) (set-this-form) body...)`
pub fn define_event(component: &str, event: &str, params: &[String], body: &[String]) -> String {
    let mut out = format!(
        "(define-event {} {} ({}) {}",
        component,
        event,
        params.join(" "),
        SET_THIS_FORM
    );
    for form in body.iter().filter(|f| !f.is_empty()) {
        out.push(' ');
        out.push_str(form);
    }
    out.push(')');
    out
}

pub fn set_property(component: &str, property: &str, value: &str, ty: &str) -> String {
    format!(
        "(set-and-coerce-property! {} {} {} {})",
        quote_symbol(component),
        quote_symbol(property),
        value,
        quote_symbol(ty)
    )
}

pub fn get_property(component: &str, property: &str) -> String {
    format!("(get-property {} {})", quote_symbol(component), quote_symbol(property))
}

pub fn report(block_id: impl std::fmt::Display, code: &str) -> String {
    format!("(report-block-value \"{}\" {})", block_id, code)
}

/// Format a designer property value for `set-and-coerce-property!`.
pub fn property_value(ty: &str, value: &str) -> String {
    match ty {
        "number" => number_literal(value).unwrap_or_else(|| quote_string(value)),
        "boolean" => match value {
            "True" | "true" => TRUE.to_string(),
            "False" | "false" => FALSE.to_string(),
            other => quote_string(other),
        },
        "component" if value.is_empty() => quote_string(""),
        "component" => format!("(get-component {})", value),
        _ => quote_string(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_string() {
        assert_eq!(quote_string("hello"), "\"hello\"");
        assert_eq!(quote_string("say \"hi\""), "\"say \\\"hi\\\"\"");
        assert_eq!(quote_string("a\\b"), "\"a\\\\b\"");
        assert_eq!(quote_string("line\nbreak"), "\"line\\nbreak\"");
        assert_eq!(quote_string("bell\u{7}"), "\"bell\\x7;\"");
    }

    #[test]
    fn test_number_literal() {
        assert_eq!(number_literal("42").as_deref(), Some("42"));
        assert_eq!(number_literal(" -1.5 ").as_deref(), Some("-1.5"));
        assert_eq!(number_literal("&HFF00FF00").as_deref(), Some("#xFF00FF00"));
        assert_eq!(number_literal("twelve"), None);
    }

    #[test]
    fn test_color_literal() {
        assert_eq!(color_literal("FF0000").as_deref(), Some("#xFFFF0000"));
        assert_eq!(color_literal("80ff0000").as_deref(), Some("#x80FF0000"));
        assert_eq!(color_literal("&HFF00FF00").as_deref(), Some("#xFF00FF00"));
        assert_eq!(color_literal("red"), None);
        assert_eq!(color_literal("FFF"), None);
    }

    #[test]
    fn test_begin_drops_empty_fragments() {
        let forms = vec!["(a)".to_string(), String::new(), "(b)".to_string()];
        assert_eq!(begin(&forms), "(begin (a) (b))");
        assert_eq!(begin(&[]), "(begin)");
    }

    #[test]
    fn test_define_forms() {
        assert_eq!(
            define_procedure("area", &["w".to_string(), "h".to_string()], "(* w h)"),
            "(def (area w h) (* w h))"
        );
        assert_eq!(define_procedure("go", &[], "(begin)"), "(def (go) (begin))");
        assert_eq!(
            define_event("Button1", "Click", &[], &[]),
            "(define-event Button1 Click () (set-this-form))"
        );
    }

    #[test]
    fn test_property_value() {
        assert_eq!(property_value("number", "&HFFFFFFFF"), "#xFFFFFFFF");
        assert_eq!(property_value("number", "14.0"), "14.0");
        assert_eq!(property_value("boolean", "True"), "#t");
        assert_eq!(property_value("text", "Hi"), "\"Hi\"");
        assert_eq!(property_value("component", "Ball1"), "(get-component Ball1)");
        assert_eq!(property_value("component", ""), "\"\"");
    }
}
