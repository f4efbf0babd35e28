use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "standup.yaml";
pub const DEFAULT_DB_FILE: &str = "standup.db";

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_lives_at_root() {
        assert_eq!(
            config_path(Path::new("/data")),
            PathBuf::from("/data/standup.yaml")
        );
    }
}
