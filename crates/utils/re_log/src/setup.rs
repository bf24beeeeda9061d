//! Function to setup logging in binaries.

use crate::LOUD_CRATES;

/// The filter `setup_logging` uses for a given value of `RUST_LOG`.
///
/// Defaults to `info`, and turns the [`LOUD_CRATES`] down to `warn`
/// unless the user mentioned them explicitly.
pub fn default_log_filter(rust_log: Option<&str>) -> String {
    let filter = rust_log
        .map(str::trim)
        .filter(|filter| !filter.is_empty())
        .unwrap_or("info");

    let mut directives = vec![filter.to_owned()];
    for loud_crate in LOUD_CRATES {
        if !filter.contains(&format!("{loud_crate}=")) {
            directives.push(format!("{loud_crate}=warn"));
        }
    }

    directives.join(",")
}

/// Directs [`log`] calls to stderr.
///
/// Safe to call more than once; only the first call installs a logger.
pub fn setup_logging() {
    let rust_log = std::env::var("RUST_LOG").ok();
    let filter = default_log_filter(rust_log.as_deref());

    let mut builder = env_logger::Builder::new();
    builder.parse_filters(&filter);
    builder.format_target(false);

    if builder.try_init().is_err() {
        log::debug!("A logger was already installed");
    }
}
