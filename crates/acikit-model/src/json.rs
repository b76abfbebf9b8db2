//! Wire document helpers.
//!
//! Every pushed document has the shape
//! `{<class>: {"attributes": {...}, "children": [...]}}`. JSON is the
//! primary format; the XML rendering is derived from the finished JSON
//! document rather than built separately.

use serde_json::{Map, Value, json};

use crate::error::ModelError;
use crate::tree::Tag;

/// Wrap attributes and children in the standard class envelope.
pub fn envelope(class: &str, attributes: Map<String, Value>, children: Vec<Value>) -> Value {
    json!({class: {"attributes": attributes, "children": children}})
}

/// Attribute map holding just the entity name.
pub fn name_attributes(name: &str) -> Map<String, Value> {
    let mut attributes = Map::new();
    attributes.insert("name".to_owned(), Value::String(name.to_owned()));
    attributes
}

/// Tag documents. Removed tags render once more with
/// `status: "deleted"` so the controller drops them.
pub fn tag_children(tags: &[Tag]) -> Vec<Value> {
    tags.iter()
        .map(|tag| {
            let mut attributes = name_attributes(&tag.name);
            if tag.deleted {
                attributes.insert("status".to_owned(), Value::String("deleted".to_owned()));
            }
            json!({"tagInst": {"attributes": attributes, "children": []}})
        })
        .collect()
}

/// Render a class-envelope document as XML. Attributes become XML
/// attributes, children become nested elements.
pub fn to_xml(doc: &Value) -> Result<String, ModelError> {
    let mut out = String::new();
    write_xml(doc, &mut out)?;
    Ok(out)
}

fn write_xml(doc: &Value, out: &mut String) -> Result<(), ModelError> {
    let object = doc
        .as_object()
        .filter(|o| o.len() == 1)
        .ok_or_else(|| ModelError::serialization("document is not a single-class envelope"))?;
    let (class, body) = object
        .iter()
        .next()
        .ok_or_else(|| ModelError::serialization("empty document"))?;

    out.push('<');
    out.push_str(class);
    if let Some(attributes) = body.get("attributes").and_then(Value::as_object) {
        for (key, value) in attributes {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape_xml(&text));
            out.push('"');
        }
    }

    let children = body
        .get("children")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    if children.is_empty() {
        out.push_str("/>");
        return Ok(());
    }
    out.push('>');
    for child in children {
        write_xml(child, out)?;
    }
    out.push_str("</");
    out.push_str(class);
    out.push('>');
    Ok(())
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn envelope_shape() {
        let doc = envelope("fvTenant", name_attributes("t1"), vec![]);
        assert_eq!(
            doc,
            json!({"fvTenant": {"attributes": {"name": "t1"}, "children": []}})
        );
    }

    #[test]
    fn removed_tags_render_deleted() {
        let tags = vec![
            Tag {
                name: "prod".to_owned(),
                deleted: false,
            },
            Tag {
                name: "old".to_owned(),
                deleted: true,
            },
        ];
        let docs = tag_children(&tags);
        assert_eq!(docs[0]["tagInst"]["attributes"]["name"], "prod");
        assert!(docs[0]["tagInst"]["attributes"].get("status").is_none());
        assert_eq!(docs[1]["tagInst"]["attributes"]["status"], "deleted");
    }

    #[test]
    fn xml_rendering_nests_and_escapes() {
        let doc = json!({"fvTenant": {
            "attributes": {"name": "a<b"},
            "children": [
                {"fvAp": {"attributes": {"name": "app"}, "children": []}},
            ]}});
        assert_eq!(
            to_xml(&doc).unwrap(),
            "<fvTenant name=\"a&lt;b\"><fvAp name=\"app\"/></fvTenant>"
        );
    }

    #[test]
    fn xml_rejects_malformed_documents() {
        assert!(to_xml(&json!({"a": {}, "b": {}})).is_err());
        assert!(to_xml(&json!("plain")).is_err());
    }
}
