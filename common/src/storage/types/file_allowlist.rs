use crate::stored_object;

stored_object!(FileAllowlist, "file_allowlist", {
    paths: Vec<String>
});

/// Bound from the external file-allowlist contract (1-100 entries, replace-all semantics).
pub const MAX_ALLOWLIST_ENTRIES: usize = 100;

pub fn validate_paths(paths: &[String]) -> Result<(), String> {
    if paths.is_empty() || paths.len() > MAX_ALLOWLIST_ENTRIES {
        return Err(format!(
            "file allowlist must contain between 1 and {MAX_ALLOWLIST_ENTRIES} entries, got {}",
            paths.len()
        ));
    }
    if paths.iter().any(|p| !p.starts_with('/')) {
        return Err("file allowlist entries must be absolute paths".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty() {
        assert!(validate_paths(&[]).is_err());
    }

    #[test]
    fn rejects_relative_paths() {
        assert!(validate_paths(&["relative/path".to_string()]).is_err());
    }

    #[test]
    fn accepts_absolute_paths() {
        assert!(validate_paths(&["/home/user/docs".to_string()]).is_ok());
    }
}
