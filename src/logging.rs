use log::LevelFilter;

/// Maps the incremental `verbose` option onto a log filter.
///
/// Zero keeps the default informational output; each increment raises
/// it one notch, bottoming out at full tracing.
pub fn verbosity_filter(verbosity: u32) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Installs the process-wide logger at the level the options ask for.
///
/// An environment override (`RUST_LOG`) still wins, and an already
/// installed logger (test harnesses bring their own) is left in place,
/// so repeated calls are harmless.
pub fn init_logging(verbosity: u32) {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(verbosity_filter(verbosity))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_filter() {
        assert_eq!(verbosity_filter(0), LevelFilter::Info);
        assert_eq!(verbosity_filter(1), LevelFilter::Debug);
        assert_eq!(verbosity_filter(2), LevelFilter::Trace);
        assert_eq!(verbosity_filter(u32::MAX), LevelFilter::Trace);
    }
}
