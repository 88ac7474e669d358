/// The canonical key an `ExecutionRecord` is stored under (§3, §4.7).
pub fn execution_key(tenant_id: &str, execution_id: &str) -> String {
    format!("exec:{tenant_id}:{execution_id}")
}

/// Filesystem-safe encoding of a key, for the file-backed store where the
/// key must also be a valid path component.
pub fn key_to_filename(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect::<String>()
        + ".json"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_key_format() {
        assert_eq!(execution_key("acme", "e1"), "exec:acme:e1");
    }

    #[test]
    fn key_to_filename_is_path_safe() {
        let f = key_to_filename("exec:acme:e1");
        assert_eq!(f, "exec_acme_e1.json");
    }
}
