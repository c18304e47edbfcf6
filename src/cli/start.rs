use crate::cli::{actions::Action, commands, dispatch::handler, telemetry};
use anyhow::Result;
use tracing::Level;

/// `-v` count to log level; errors only when no flag is given.
const fn log_level(verbose: u8) -> Level {
    match verbose {
        0 => Level::ERROR,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Parse the command line, start logging and resolve the action to run.
///
/// # Errors
///
/// Fails when telemetry cannot be initialized or the configuration, including
/// the credentials file, is invalid.
pub fn start() -> Result<Action> {
    let matches = commands::new().get_matches();

    telemetry::init(log_level(matches.get_count("verbose")))?;

    handler(&matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_by_verbose_count() {
        let cases = [
            (0, Level::ERROR),
            (1, Level::INFO),
            (2, Level::DEBUG),
            (3, Level::TRACE),
            (200, Level::TRACE),
        ];

        for (count, level) in cases {
            assert_eq!(log_level(count), level, "-v x{count}");
        }
    }

    #[test]
    fn test_verbose_flag_counted() {
        let matches = commands::new().get_matches_from(vec!["mysql_exporter", "-vvv"]);
        assert_eq!(log_level(matches.get_count("verbose")), Level::TRACE);
    }
}
