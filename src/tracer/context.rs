// Where a dependent value sits inside the response that produced it
use serde_json::Value;

/// Response body prepared for field lookups
///
/// JSON bodies are parsed once; lookups fall back to `name=value` pairs in
/// the raw text when the JSON walk finds nothing.
pub(super) struct BodyContext<'a> {
    text: &'a str,
    json: Option<Value>,
}

impl<'a> BodyContext<'a> {
    pub(super) fn new(text: &'a str, is_json: bool) -> Self {
        let json = if is_json {
            serde_json::from_str(text).ok()
        } else {
            None
        };
        Self { text, json }
    }

    /// Field the first occurrence of `value` sits under, if any
    pub(super) fn field_of(&self, value: &str) -> Option<String> {
        self.json
            .as_ref()
            .and_then(|root| json_path(root, value, ""))
            .or_else(|| text_field(self.text, value))
    }
}

/// Dotted key path (`list[0].id`) of the first scalar containing `value`
fn json_path(node: &Value, value: &str, prefix: &str) -> Option<String> {
    match node {
        Value::Object(map) => map.iter().find_map(|(key, child)| {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", prefix, key)
            };
            visit(child, value, path)
        }),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .find_map(|(i, child)| visit(child, value, format!("{}[{}]", prefix, i))),
        _ => None,
    }
}

fn visit(node: &Value, value: &str, path: String) -> Option<String> {
    match node {
        Value::String(s) if s.contains(value) => Some(path),
        Value::Number(n) if n.to_string().contains(value) => Some(path),
        Value::Object(_) | Value::Array(_) => json_path(node, value, &path),
        _ => None,
    }
}

/// Name of a `name=value` pair holding `value` on the first line containing it
///
/// Covers query strings (`a=1&id=...`) and attribute forms (`key="..."`).
fn text_field(text: &str, value: &str) -> Option<String> {
    text.lines()
        .filter(|line| line.contains(value))
        .flat_map(|line| line.split(|c: char| c.is_whitespace() || c == '&' || c == '?'))
        .find_map(|part| {
            let (name, rest) = part.split_once('=')?;
            let valid_name = !name.is_empty()
                && name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
            (valid_name && rest.trim_matches('"').contains(value)).then(|| name.to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_top_level_keys() {
        let body = r#"{"matchId":1629454135,"home":1000001661,"away":1000000441}"#;
        let ctx = BodyContext::new(body, true);
        assert_eq!(ctx.field_of("1000001661").as_deref(), Some("home"));
        assert_eq!(ctx.field_of("1000000441").as_deref(), Some("away"));
    }

    #[test]
    fn test_json_nested_path() {
        let body = r#"{"list":[{"id":"1629454135","live":true}],"meta":{"sig":"9f86d081"}}"#;
        let ctx = BodyContext::new(body, true);
        assert_eq!(ctx.field_of("1629454135").as_deref(), Some("list[0].id"));
        assert_eq!(ctx.field_of("9f86d081").as_deref(), Some("meta.sig"));
    }

    #[test]
    fn test_text_pairs() {
        let body = "<a href=\"/x\">\nplay key=\"AbCdEfGhIjKl\" other\n";
        let ctx = BodyContext::new(body, false);
        assert_eq!(ctx.field_of("AbCdEfGhIjKl").as_deref(), Some("key"));

        let ctx = BodyContext::new("next=/p?page=2&id=1629454135", false);
        assert_eq!(ctx.field_of("1629454135").as_deref(), Some("id"));
    }

    #[test]
    fn test_unparseable_json_falls_back_to_text() {
        let ctx = BodyContext::new("{ broken id=1629454135", true);
        assert_eq!(ctx.field_of("1629454135").as_deref(), Some("id"));
    }

    #[test]
    fn test_no_context() {
        let ctx = BodyContext::new("just 1629454135 here", false);
        assert_eq!(ctx.field_of("1629454135"), None);
    }
}
