use serde::Serialize;
use std::path::{Path, PathBuf};

/// The application under test. Immutable for the lifetime of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationTarget {
    /// Substring matched against OS process names for supersession and liveness.
    pub process_name: String,
    pub executable: PathBuf,
    pub window_title: String,
}

impl ApplicationTarget {
    pub fn new(
        executable: impl Into<PathBuf>,
        process_name: Option<String>,
        window_title: Option<String>,
    ) -> Self {
        let executable = executable.into();
        let process_name = process_name
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| default_process_name(&executable));
        let window_title = window_title
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| process_name.clone());
        Self {
            process_name,
            executable,
            window_title,
        }
    }

    /// Case-sensitive substring match, the same policy used for every process lookup.
    pub fn matches_process(&self, name: &str) -> bool {
        !self.process_name.is_empty() && name.contains(&self.process_name)
    }
}

fn default_process_name(executable: &Path) -> String {
    executable
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("app")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_derive_from_binary_name() {
        let target = ApplicationTarget::new("/opt/build/betterwallpaper", None, None);
        assert_eq!(target.process_name, "betterwallpaper");
        assert_eq!(target.window_title, "betterwallpaper");
    }

    #[test]
    fn explicit_names_win_and_blank_ones_are_ignored() {
        let target = ApplicationTarget::new(
            "/opt/build/betterwallpaper",
            Some("  ".to_string()),
            Some("BetterWallpaper".to_string()),
        );
        assert_eq!(target.process_name, "betterwallpaper");
        assert_eq!(target.window_title, "BetterWallpaper");
    }

    #[test]
    fn process_match_is_substring() {
        let target = ApplicationTarget::new("/x/app", Some("wallpaper".to_string()), None);
        assert!(target.matches_process("betterwallpaper"));
        assert!(target.matches_process("wallpaper-helper"));
        assert!(!target.matches_process("Wallpaper"));
    }
}
