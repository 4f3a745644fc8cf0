use std::path::PathBuf;

/// Default settings file looked up when no path is given
pub const DEFAULT_CONFIG_PATH: &str = "config/feed.toml";

/// Settings file path: first command-line argument, or the default
pub fn config_path() -> PathBuf {
    let args: Vec<String> = std::env::args().collect();
    config_path_from(&args)
}

pub fn config_path_from(args: &[String]) -> PathBuf {
    args.get(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Positional argument at `index` parsed as a match id
pub fn match_id_from(args: &[String], index: usize) -> Option<u64> {
    args.get(index)?.parse().ok()
}
