//! Naming conventions for inferred keys and aliases.

/// Singular form of a dataset name (`users` -> `user`, `categories` -> `category`)
///
/// Only the regular English plural endings are handled; irregular names
/// should declare their foreign keys explicitly.
pub fn singularize(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies") {
        if !stem.is_empty() {
            return format!("{stem}y");
        }
    }
    for suffix in ["sses", "shes", "ches", "xes", "zes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    if word.ends_with("ss") || word.ends_with("us") || word.ends_with("is") {
        return word.to_string();
    }
    match word.strip_suffix('s') {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => word.to_string(),
    }
}

/// Conventional foreign key name pointing at `dataset`
pub fn foreign_key(dataset: &str, suffix: &str) -> String {
    format!("{}{}", singularize(dataset), suffix)
}

/// Alias for the source side of a self-referential join
pub fn self_ref_alias(dataset: &str, suffix: &str) -> String {
    let first = dataset.chars().next().map(String::from).unwrap_or_default();
    format!("{first}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_singularize() {
        assert_eq!(singularize("users"), "user");
        assert_eq!(singularize("categories"), "category");
        assert_eq!(singularize("addresses"), "address");
        assert_eq!(singularize("boxes"), "box");
        assert_eq!(singularize("status"), "status");
        assert_eq!(singularize("task_tags"), "task_tag");
        assert_eq!(singularize("s"), "s");
    }

    #[test]
    fn test_foreign_key() {
        assert_eq!(foreign_key("users", "_id"), "user_id");
        assert_eq!(foreign_key("categories", "_id"), "category_id");
    }

    #[test]
    fn test_self_ref_alias() {
        assert_eq!(self_ref_alias("categories", "_0"), "c_0");
        assert_eq!(self_ref_alias("", "_0"), "_0");
    }
}
