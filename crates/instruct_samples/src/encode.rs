//! Textual box encodings understood by the downstream tokenizer.

use crate::grid::GridBox;

/// `"{<x1><y1><x2><y2>}"`, used by the referring-expression tasks.
pub fn refer_box(b: &GridBox) -> String {
    format!("{{<{}><{}><{}><{}>}}", b.x1, b.y1, b.x2, b.y2)
}

/// `"<x1><y1><x2><y2>"`, used by the COCO box-shard tasks.
pub fn box_tokens(b: &GridBox) -> String {
    format!("<{}><{}><{}><{}>", b.x1, b.y1, b.x2, b.y2)
}

/// Quote a string the way Python's `repr` does for `str`.
fn py_repr(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Render `(object, box_tokens)` pairs as the identify-all answer.
///
/// Existing data was produced by printing a list of one-element sets and then
/// deleting every `'`, `[` and `]`, which yields `{obj,<..>}, {obj,<..>}`. The
/// same rendering is reproduced here, including its effect on object names
/// that contain those characters.
pub fn object_box_list(pairs: &[(String, String)]) -> String {
    let items: Vec<String> = pairs
        .iter()
        .map(|(obj, tokens)| {
            let item = format!("{obj},{}", tokens.trim());
            format!("{{{}}}", py_repr(&item))
        })
        .collect();
    format!("[{}]", items.join(", "))
        .chars()
        .filter(|c| !matches!(c, '\'' | '[' | ']'))
        .collect()
}

#[cfg(test)]
mod encode_tests {
    use super::*;

    fn grid(x1: i64, y1: i64, x2: i64, y2: i64) -> GridBox {
        GridBox { x1, y1, x2, y2 }
    }

    #[test]
    fn refer_box_is_braced_angle_tokens() {
        assert_eq!(refer_box(&grid(1, 4, 6, 12)), "{<1><4><6><12>}");
    }

    #[test]
    fn box_tokens_have_no_separator() {
        assert_eq!(box_tokens(&grid(25, 50, 35, 70)), "<25><50><35><70>");
    }

    #[test]
    fn object_list_matches_python_rendering() {
        let pairs = vec![
            ("person".to_string(), " <1><2><3><4>".to_string()),
            ("dog".to_string(), "<5><6><7><8>".to_string()),
        ];
        assert_eq!(
            object_box_list(&pairs),
            "{person,<1><2><3><4>}, {dog,<5><6><7><8>}"
        );
        assert_eq!(object_box_list(&[]), "");
    }

    #[test]
    fn apostrophes_switch_quote_style() {
        let pairs = vec![("man's hat".to_string(), "<0><0><1><1>".to_string())];
        assert_eq!(object_box_list(&pairs), r#"{"mans hat,<0><0><1><1>"}"#);
    }
}
