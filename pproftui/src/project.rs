//! Detection of the user's own code by module path.

/// Matches file names that belong to the user's project.
///
/// A file is project code when its path contains the module path followed by
/// a `/`, so `github.com/acme/app` matches
/// `/home/u/go/pkg/mod/github.com/acme/app/server.go` but not
/// `github.com/acme/application/x.go`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectFilter {
    needle: String,
}

impl ProjectFilter {
    /// Returns `None` for an empty module path, which disables the feature.
    pub fn new(module_path: &str) -> Option<Self> {
        let module_path = module_path.trim();
        if module_path.is_empty() {
            return None;
        }
        let mut needle = module_path.to_string();
        if !needle.ends_with('/') {
            needle.push('/');
        }
        Some(Self { needle })
    }

    pub fn matches(&self, filename: &str) -> bool {
        filename.contains(&self.needle)
    }

    pub fn module_path(&self) -> &str {
        self.needle.trim_end_matches('/')
    }
}
