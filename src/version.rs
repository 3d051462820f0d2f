pub const COMMIT: &str = include_str!(concat!(env!("OUT_DIR"), "/git-commit"));
pub const COMPILE_DATE: &str = include_str!(concat!(env!("OUT_DIR"), "/compile-date"));

/// Version string shown by `--version`.
pub fn version_string() -> String {
    format!("{} ({} {})", env!("CARGO_PKG_VERSION"), COMMIT, COMPILE_DATE)
}
