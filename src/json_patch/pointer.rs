//! RFC 6901 pointers and the RFC 6902 operations over `serde_json::Value`.

use crate::json_patch::errors::JsonPatchError;
use serde_json::Value;

pub fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

pub fn render_pointer(tokens: &[String]) -> String {
    tokens.iter().map(|t| format!("/{}", escape_token(t))).collect()
}

pub fn parse_pointer(pointer: &str) -> Result<Vec<String>, JsonPatchError> {
    if pointer.is_empty() {
        return Ok(Vec::new());
    }
    let Some(rest) = pointer.strip_prefix('/') else {
        return Err(JsonPatchError::InvalidPath {
            path: pointer.to_string(),
            position: 0,
            message: "pointer must start with '/'".to_string(),
        });
    };

    let mut tokens = Vec::new();
    let mut offset = 1;
    for raw in rest.split('/') {
        let mut token = String::with_capacity(raw.len());
        let mut chars = raw.char_indices();
        while let Some((idx, ch)) = chars.next() {
            if ch != '~' {
                token.push(ch);
                continue;
            }
            match chars.next() {
                Some((_, '0')) => token.push('~'),
                Some((_, '1')) => token.push('/'),
                _ => {
                    return Err(JsonPatchError::InvalidPath {
                        path: pointer.to_string(),
                        position: offset + idx,
                        message: "'~' must be followed by '0' or '1'".to_string(),
                    })
                }
            }
        }
        offset += raw.len() + 1;
        tokens.push(token);
    }
    Ok(tokens)
}

pub fn get<'a>(doc: &'a Value, tokens: &[String]) -> Option<&'a Value> {
    tokens.iter().try_fold(doc, |current, token| match current {
        Value::Object(map) => map.get(token),
        Value::Array(items) => array_index(token).and_then(|i| items.get(i)),
        _ => None,
    })
}

fn get_mut<'a>(doc: &'a mut Value, tokens: &[String]) -> Option<&'a mut Value> {
    tokens.iter().try_fold(doc, |current, token| match current {
        Value::Object(map) => map.get_mut(token),
        Value::Array(items) => array_index(token).and_then(move |i| items.get_mut(i)),
        _ => None,
    })
}

/// Digits only, no sign or leading zeros (other than `0` itself).
fn array_index(token: &str) -> Option<usize> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if token.len() > 1 && token.starts_with('0') {
        return None;
    }
    token.parse().ok()
}

fn split_parent<'t>(pointer: &str, tokens: &'t [String], op: &str) -> Result<(&'t [String], &'t str), JsonPatchError> {
    match tokens.split_last() {
        Some((last, parent)) => Ok((parent, last.as_str())),
        None => Err(JsonPatchError::RootTarget {
            op: format!("{op} at '{pointer}'"),
        }),
    }
}

fn parent_mut<'a>(doc: &'a mut Value, parent: &[String]) -> Result<&'a mut Value, JsonPatchError> {
    get_mut(doc, parent).ok_or_else(|| JsonPatchError::PathNotFound {
        path: render_pointer(parent),
    })
}

pub fn add(doc: &mut Value, pointer: &str, value: Value) -> Result<(), JsonPatchError> {
    let tokens = parse_pointer(pointer)?;
    if tokens.is_empty() {
        *doc = value;
        return Ok(());
    }
    let (parent, last) = split_parent(pointer, &tokens, "add")?;
    match parent_mut(doc, parent)? {
        Value::Object(map) => {
            map.insert(last.to_string(), value);
            Ok(())
        }
        Value::Array(items) => {
            if last == "-" {
                items.push(value);
                return Ok(());
            }
            let index = array_index(last).ok_or_else(|| JsonPatchError::PathNotFound {
                path: pointer.to_string(),
            })?;
            if index > items.len() {
                return Err(JsonPatchError::IndexOutOfBounds {
                    path: render_pointer(parent),
                    index,
                    len: items.len(),
                });
            }
            items.insert(index, value);
            Ok(())
        }
        _ => Err(JsonPatchError::PathNotFound {
            path: pointer.to_string(),
        }),
    }
}

pub fn remove(doc: &mut Value, pointer: &str) -> Result<Value, JsonPatchError> {
    let tokens = parse_pointer(pointer)?;
    let (parent, last) = split_parent(pointer, &tokens, "remove")?;
    let not_found = || JsonPatchError::PathNotFound {
        path: pointer.to_string(),
    };
    match parent_mut(doc, parent)? {
        Value::Object(map) => map.remove(last).ok_or_else(not_found),
        Value::Array(items) => {
            let index = array_index(last).ok_or_else(not_found)?;
            if index >= items.len() {
                return Err(JsonPatchError::IndexOutOfBounds {
                    path: render_pointer(parent),
                    index,
                    len: items.len(),
                });
            }
            Ok(items.remove(index))
        }
        _ => Err(not_found()),
    }
}

pub fn replace(doc: &mut Value, pointer: &str, value: Value) -> Result<(), JsonPatchError> {
    let tokens = parse_pointer(pointer)?;
    let target = get_mut(doc, &tokens).ok_or_else(|| JsonPatchError::PathNotFound {
        path: pointer.to_string(),
    })?;
    *target = value;
    Ok(())
}

pub fn move_value(doc: &mut Value, from: &str, pointer: &str) -> Result<(), JsonPatchError> {
    if from == pointer {
        return get(doc, &parse_pointer(from)?)
            .map(|_| ())
            .ok_or_else(|| JsonPatchError::PathNotFound {
                path: from.to_string(),
            });
    }
    if pointer.starts_with(&format!("{from}/")) {
        return Err(JsonPatchError::MoveIntoChild {
            from: from.to_string(),
            path: pointer.to_string(),
        });
    }
    let value = remove(doc, from)?;
    add(doc, pointer, value)
}

pub fn test_value(doc: &Value, pointer: &str, expected: &Value) -> Result<(), JsonPatchError> {
    let tokens = parse_pointer(pointer)?;
    match get(doc, &tokens) {
        Some(actual) if actual == expected => Ok(()),
        _ => Err(JsonPatchError::TestFailed {
            path: pointer.to_string(),
        }),
    }
}
