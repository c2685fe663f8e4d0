use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use revive_config::LogConfig;
use tracing_subscriber::EnvFilter;

const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// The level `verbosity` steps away from `configured`, clamped to the known
/// levels. A configured value that isn't a plain level (a full filter
/// directive such as `info,revive_library=debug`) is used as is.
fn level(configured: &str, verbosity: i8) -> String {
    let Some(position) = LEVELS.iter().position(|level| level.eq_ignore_ascii_case(configured.trim())) else {
        return configured.to_string();
    };
    let shifted = (position as i64 + i64::from(verbosity)).clamp(0, LEVELS.len() as i64 - 1);
    LEVELS[shifted as usize].to_string()
}

/// Install the global subscriber. Logs go to stderr so that reports printed
/// on stdout stay clean. `RUST_LOG` overrides the configured level.
pub fn init(config: &LogConfig, verbosity: i8) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level(&config.level, verbosity)).or_raise(|| ErrorKind::Logging)?,
    };
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if installed.is_err() {
        exn::bail!(ErrorKind::Logging);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("info", 0, "info")]
    #[case("info", 1, "debug")]
    #[case("info", 5, "trace")]
    #[case("WARN", -1, "error")]
    #[case("error", -3, "error")]
    #[case("info,revive_library=debug", 2, "info,revive_library=debug")]
    fn test_level(#[case] configured: &str, #[case] verbosity: i8, #[case] expected: &str) {
        assert_eq!(level(configured, verbosity), expected);
    }
}
