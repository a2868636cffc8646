//! Bridge from the `[logging]` config section to telemetry setup.

use scopegate_config::LoggingSection;
use scopegate_telemetry::{LogConfig, LogTarget, TelemetryResult};

/// Build the subscriber configuration for this run.
///
/// `--verbose` raises the level to `debug`; directives still apply.
pub(crate) fn log_config(section: &LoggingSection, verbose: bool) -> TelemetryResult<LogConfig> {
    let level = if verbose { "debug" } else { section.level() };
    let mut config = LogConfig::new(level).with_format(section.format().parse()?);
    if let Some(dir) = &section.directory {
        config = config.with_target(LogTarget::File(dir.clone()));
    }

    Ok(section
        .directives
        .iter()
        .fold(config, |config, d| config.with_directive(d.clone())))
}
