//! Dotted-path navigation into a `serde_json::Value` tree, used to apply a
//! [`curve_types::PiiSchema`]'s field declarations without requiring the
//! payload type to know about PII at compile time.

use serde_json::Value;

/// Mutable access to the value at a dotted path (`"user.email"`), or `None`
/// if any segment is missing or not an object.
pub fn get_mut_by_path<'a>(value: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.as_object_mut()?.get_mut(segment)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn navigates_nested_object() {
        let mut value = json!({"user": {"email": "a@b.com"}});
        let found = get_mut_by_path(&mut value, "user.email").unwrap();
        assert_eq!(found, "a@b.com");
    }

    #[test]
    fn top_level_path_resolves() {
        let mut value = json!({"email": "a@b.com"});
        let found = get_mut_by_path(&mut value, "email").unwrap();
        assert_eq!(found, "a@b.com");
    }

    #[test]
    fn missing_path_returns_none() {
        let mut value = json!({"user": {"email": "a@b.com"}});
        assert!(get_mut_by_path(&mut value, "user.phone").is_none());
        assert!(get_mut_by_path(&mut value, "missing.nested.deep").is_none());
    }
}
