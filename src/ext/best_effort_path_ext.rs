use std::path::Path;

/// Renders a path for log lines and error messages.
///
/// Existing paths are shown canonicalized. Paths that cannot be resolved
/// (typically because they do not exist yet) are made absolute against the
/// current directory instead, falling back to the path as given.
pub trait BestEffortPathExt {
    fn best_effort_path_display(&self) -> String;
}

impl<T: AsRef<Path> + ?Sized> BestEffortPathExt for T {
    fn best_effort_path_display(&self) -> String {
        let path = self.as_ref();
        path.canonicalize()
            .or_else(|_| std::path::absolute(path))
            .unwrap_or_else(|_| path.to_path_buf())
            .display()
            .to_string()
    }
}
