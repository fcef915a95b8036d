//! Text-form emission.
//!
//! Layout conventions: objects open on their own line when they are a
//! member value, members indent with tabs, arrays break across lines at the
//! top level but inline once nested, non-identifier keys are quoted, blobs
//! render as space-separated hex.

use crate::header::{is_identifier, Format, Kv3Header, ENCODING_TEXT};
use crate::value::{Flag, Value};

/// Encode a value as a complete text document with a header line.
pub fn encode(value: &Value, format: &Format) -> String {
    let header = Kv3Header {
        encoding: ENCODING_TEXT,
        format: format.clone(),
    };
    let mut out = header.to_string();
    out.push('\n');
    serialize(&mut out, value, 0, false, false);
    out.push('\n');
    out
}

/// Encode just the value, with no header line.
pub fn encode_bare(value: &Value) -> String {
    let mut out = String::new();
    serialize(&mut out, value, 0, false, false);
    out.push('\n');
    out
}

fn serialize(out: &mut String, value: &Value, level: usize, in_object: bool, nested: bool) {
    match value {
        Value::Flagged(inner, flags) => {
            let multiline =
                flags.contains(Flag::MULTILINE_STRING) && matches!(**inner, Value::String(_));
            let prefix = *flags - Flag::MULTILINE_STRING;
            if !prefix.is_empty() {
                let names: Vec<&str> = prefix.iter().map(Flag::bit_name).collect();
                out.push_str(&names.join("|"));
                out.push(':');
            }
            if multiline {
                if let Value::String(s) = &**inner {
                    out.push_str("\"\"\"\n");
                    out.push_str(s);
                    out.push_str("\"\"\"");
                }
            } else {
                serialize(out, inner, level, in_object, nested);
            }
        }
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Double(_) | Value::Float(_) => {
            push_double(out, value.as_double().unwrap());
        }
        Value::String(s) => push_quoted(out, s),
        Value::Blob(bytes) => {
            out.push_str("#[");
            for (i, b) in bytes.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                out.push_str(&format!("{b:02x}"));
            }
            out.push(']');
        }
        Value::Array(items) => push_items(out, items, level, nested),
        Value::TypedArray(array) => push_items(out, &array.items, level, nested),
        Value::Object(map) => {
            let indent = "\t".repeat(level);
            if in_object {
                out.push('\n');
            }
            out.push_str(&indent);
            out.push_str("{\n");
            for (key, member) in map {
                out.push_str(&indent);
                out.push('\t');
                if is_identifier(key) {
                    out.push_str(key);
                } else {
                    push_quoted(out, key);
                }
                out.push_str(" = ");
                serialize(out, member, level + 1, true, nested);
                out.push('\n');
            }
            out.push_str(&indent);
            out.push('}');
        }
        // Integer variants.
        _ => {
            let v = value.as_int().expect("remaining variants are integers");
            out.push_str(&v.to_string());
        }
    }
}

/// Arrays inline once nested inside another array; otherwise one element
/// per line.
fn push_items(out: &mut String, items: &[Value], level: usize, nested: bool) {
    if items.is_empty() {
        out.push_str("[ ]");
        return;
    }
    if nested {
        out.push('[');
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            serialize(out, item, level, false, true);
        }
        out.push(']');
        return;
    }
    let indent = "\t".repeat(level);
    out.push('\n');
    out.push_str(&indent);
    out.push_str("[\n");
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(",\n");
        }
        out.push_str(&indent);
        out.push('\t');
        serialize(out, item, level + 1, false, true);
    }
    out.push('\n');
    out.push_str(&indent);
    out.push(']');
}

fn push_double(out: &mut String, v: f64) {
    if v.is_nan() {
        out.push_str("nan");
    } else if v.is_infinite() {
        out.push_str(if v < 0.0 { "-inf" } else { "inf" });
    } else {
        // Keep a decimal point so the value re-reads as a double.
        let rounded = (v * 1e8).round() / 1e8;
        if rounded == rounded.trunc() {
            out.push_str(&format!("{rounded:.1}"));
        } else {
            out.push_str(&rounded.to_string());
        }
    }
}

fn push_quoted(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::FORMAT_GENERIC;
    use crate::text::reader::parse;
    use crate::value::Object;

    fn roundtrip(value: Value) {
        let text = encode(&value, &FORMAT_GENERIC);
        let (header, reparsed) = parse(&text).unwrap_or_else(|e| {
            panic!("re-parse failed: {e}\n---\n{text}");
        });
        assert_eq!(header.format, FORMAT_GENERIC);
        assert_eq!(reparsed, value, "text was:\n{text}");
    }

    #[test]
    fn header_line_is_emitted() {
        let text = encode(&Value::Null, &FORMAT_GENERIC);
        assert_eq!(
            text,
            "<!-- kv3 encoding:text:version{e21c7f3c-8a33-41c5-9977-a76d3a32aa0d} \
             format:generic:version{7412167c-06e9-4698-aff2-e63eb59037e7} -->\nnull\n"
        );
    }

    #[test]
    fn object_layout() {
        let mut inner = Object::new();
        inner.insert("b".into(), Value::Int64(2));
        let mut map = Object::new();
        map.insert("a".into(), Value::Int64(1));
        map.insert("1 key".into(), Value::from("v"));
        map.insert("sub".into(), Value::Object(inner));
        let text = encode_bare(&Value::Object(map));
        assert_eq!(
            text,
            "{\n\ta = 1\n\t\"1 key\" = \"v\"\n\tsub = \n\t{\n\t\tb = 2\n\t}\n}\n"
        );
    }

    #[test]
    fn scalar_roundtrips() {
        roundtrip(Value::Null);
        roundtrip(Value::Bool(true));
        roundtrip(Value::Int64(-42));
        roundtrip(Value::Double(2.5));
        roundtrip(Value::Double(3.0));
        roundtrip(Value::Double(f64::NAN));
        roundtrip(Value::Double(f64::NEG_INFINITY));
        roundtrip(Value::from("with \"quotes\" and\nnewline"));
        roundtrip(Value::Blob(vec![1, 2, 0xFF]));
    }

    #[test]
    fn container_roundtrips() {
        let mut map = Object::new();
        map.insert(
            "list".into(),
            Value::Array(vec![
                Value::Int64(1),
                Value::Array(vec![Value::Int64(2), Value::Int64(3)]),
                Value::from("x"),
            ]),
        );
        map.insert("empty".into(), Value::Array(vec![]));
        roundtrip(Value::Object(map));
    }

    #[test]
    fn flagged_roundtrips() {
        roundtrip(Flag::RESOURCE.wrap("a.vpcf"));
        roundtrip((Flag::RESOURCE | Flag::SUBCLASS).wrap("b.vpcf"));
        let mut map = Object::new();
        map.insert("snd".into(), Flag::SOUNDEVENT.wrap("world.amb"));
        roundtrip(Value::Object(map));
    }

    #[test]
    fn multiline_string_roundtrips() {
        let value = Flag::MULTILINE_STRING.wrap("first\nsecond\n");
        let text = encode_bare(&value);
        assert_eq!(text, "\"\"\"\nfirst\nsecond\n\"\"\"\n");
        roundtrip(value);
    }

    #[test]
    fn double_formatting_keeps_type() {
        let text = encode_bare(&Value::Double(5.0));
        assert_eq!(text, "5.0\n");
    }
}
