//! File path canonicalization towards the engine.

/// Path separator the engine natively understands.
/// The solver is a Windows hosted library and rejects forward slashes,
/// whatever the convention the caller used to express the path.
pub const ENGINE_SEPARATOR: char = '\\';

/// Canonicalizes a file path into the engine separator convention,
/// by replacing every forward slash. Total function: any input string
/// maps to a valid engine path string, no I/O involved.
pub fn engine_path(path: &str) -> String {
    path.replace('/', &ENGINE_SEPARATOR.to_string())
}

#[cfg(test)]
mod test {
    use super::engine_path;
    #[test]
    fn forward_slashes_are_rewritten() {
        assert_eq!(engine_path("C:/data/roam.obs"), "C:\\data\\roam.obs");
        assert_eq!(engine_path("/pool/igs/grg.sp3"), "\\pool\\igs\\grg.sp3");
    }
    #[test]
    fn native_paths_pass_through() {
        assert_eq!(engine_path("C:\\data\\roam.obs"), "C:\\data\\roam.obs");
        assert_eq!(engine_path(""), "");
        assert_eq!(engine_path("roam.obs"), "roam.obs");
    }
    #[test]
    fn mixed_separators() {
        assert_eq!(engine_path("C:\\data/roam.obs"), "C:\\data\\roam.obs");
    }
}
