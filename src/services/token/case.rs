/*
 * Responsibility
 * - camelCase <-> snake_case key transcoding for payload / extension claims
 */
//! Key-case transcoding for free-form payload and extension claims.
//!
//! Wire form is snake_case, application form is camelCase. Only mapping keys
//! change; sequence elements and scalars are copied, with nested mappings and
//! sequences walked recursively. Leading underscores are kept as they are.

use serde_json::{Map, Value};

pub fn to_wire_case(map: &Map<String, Value>) -> Map<String, Value> {
    transcode_map(map, snake_case)
}

pub fn to_app_case(map: &Map<String, Value>) -> Map<String, Value> {
    transcode_map(map, camel_case)
}

fn transcode_map(map: &Map<String, Value>, convert: fn(&str) -> String) -> Map<String, Value> {
    map.iter()
        .map(|(key, value)| (convert(key), transcode_value(value, convert)))
        .collect()
}

fn transcode_value(value: &Value, convert: fn(&str) -> String) -> Value {
    match value {
        Value::Object(map) => Value::Object(transcode_map(map, convert)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| transcode_value(item, convert))
                .collect(),
        ),
        scalar => scalar.clone(),
    }
}

pub(crate) fn snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

pub(crate) fn camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut chars = key.chars().peekable();
    while let Some(c) = chars.next() {
        let joins_word = c == '_'
            && out.chars().any(|p| p != '_')
            && chars.peek().is_some_and(|n| n.is_ascii_alphanumeric());
        if joins_word {
            if let Some(next) = chars.next() {
                out.push(next.to_ascii_uppercase());
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("test fixture must be an object"),
        }
    }

    #[test]
    fn converts_nested_keys_to_wire_case() {
        let app = object(json!({
            "caseOne": 1,
            "caseTwo": "two",
            "caseThree": { "nestedOne": "one", "nested_two": 2 },
            "case_four": ["array", "data"],
            "caseFive": true,
            "caseSix": [{ "innerKey": null }],
        }));

        assert_eq!(
            Value::Object(to_wire_case(&app)),
            json!({
                "case_one": 1,
                "case_two": "two",
                "case_three": { "nested_one": "one", "nested_two": 2 },
                "case_four": ["array", "data"],
                "case_five": true,
                "case_six": [{ "inner_key": null }],
            })
        );
    }

    #[test]
    fn converts_nested_keys_to_app_case() {
        let wire = object(json!({
            "case_three": { "nested_one": "one", "nestedTwo": 2 },
            "case_four": ["array_value", "data"],
        }));

        assert_eq!(
            Value::Object(to_app_case(&wire)),
            json!({
                "caseThree": { "nestedOne": "one", "nestedTwo": 2 },
                "caseFour": ["array_value", "data"],
            })
        );
    }

    #[test]
    fn string_values_are_not_rewritten() {
        let app = object(json!({ "someKey": "someValue" }));
        assert_eq!(to_wire_case(&app)["some_key"], json!("someValue"));
    }

    #[test]
    fn key_shapes() {
        assert_eq!(snake_case("userID"), "user_i_d");
        assert_eq!(camel_case("user_i_d"), "userID");
        assert_eq!(snake_case("address1Line"), "address1_line");
        assert_eq!(camel_case("address1_line"), "address1Line");
        assert_eq!(camel_case("_private"), "_private");
        assert_eq!(snake_case("_privateKey"), "_private_key");
        assert_eq!(camel_case("_private_key"), "_privateKey");
        assert_eq!(snake_case("already_snake"), "already_snake");
        assert_eq!(camel_case("alreadyCamel"), "alreadyCamel");
    }

    proptest! {
        #[test]
        fn app_case_round_trips(keys in proptest::collection::vec("[a-z][a-zA-Z0-9]{0,12}", 0..8)) {
            let mut inner = Map::new();
            for (i, key) in keys.iter().enumerate() {
                inner.insert(key.clone(), json!(i));
            }
            let mut map = Map::new();
            for key in &keys {
                map.insert(key.clone(), Value::Array(vec![Value::Object(inner.clone())]));
            }

            prop_assert_eq!(to_app_case(&to_wire_case(&map)), map);
        }

        #[test]
        fn wire_case_is_stable(key in "[a-z][a-z0-9]{0,8}(_[a-z][a-z0-9]{0,8}){0,3}") {
            prop_assert_eq!(snake_case(&key), key);
        }
    }
}
