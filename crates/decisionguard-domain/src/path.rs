use unicode_normalization::UnicodeNormalization;

/// Canonical form of a changed-file path: forward slashes, Unicode NFC, no
/// leading `./` or `/`.
pub fn normalize_path(path: &str) -> String {
    let replaced = path.replace('\\', "/");
    let nfc: String = replaced.nfc().collect();
    let without_dot = nfc.strip_prefix("./").unwrap_or(&nfc);
    without_dot.trim_start_matches('/').to_string()
}

/// Canonical form of a glob pattern.
///
/// Backslashes are glob escapes here, so only NFC and the leading `./` are
/// normalized.
pub fn normalize_pattern(pattern: &str) -> String {
    let nfc: String = pattern.trim().nfc().collect();
    let without_dot = nfc.strip_prefix("./").unwrap_or(&nfc);
    without_dot.trim_start_matches('/').to_string()
}
