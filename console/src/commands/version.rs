use chrono::{TimeZone, Utc};
use super::SUCCESS;

/// Build information embedded by `build.rs`; "unknown" when git was not
/// available at build time.
pub struct BuildInfo {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub git_branch: &'static str,
    pub git_tag: &'static str,
    pub build_time: String,
    pub target_os: &'static str,
}

impl BuildInfo {
    pub fn current() -> Self {
        let build_time_raw = option_env!("BUILD_TIME").unwrap_or("unknown");
        Self {
            version: env!("CARGO_PKG_VERSION"),
            git_hash: option_env!("GIT_HASH").unwrap_or("unknown"),
            git_branch: option_env!("GIT_BRANCH").unwrap_or("unknown"),
            git_tag: option_env!("GIT_TAG").unwrap_or("unknown"),
            build_time: format_build_time(build_time_raw),
            target_os: option_env!("BUILD_TARGET_OS").unwrap_or("unknown"),
        }
    }
}

fn format_build_time(raw: &str) -> String {
    raw.parse::<i64>()
        .ok()
        .and_then(|epoch| Utc.timestamp_opt(epoch, 0).single())
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| raw.to_string())
}

pub fn handle_version() -> i32 {
    let info = BuildInfo::current();
    println!("ledger {}", info.version);
    println!("  commit:  {}", info.git_hash);
    println!("  branch:  {}", info.git_branch);
    println!("  tag:     {}", info.git_tag);
    println!("  built:   {}", info.build_time);
    println!("  target:  {}", info.target_os);
    SUCCESS
}
