use std::io::Write;

/// Logs to stdout as `[LEVEL time thread module] message`. HTTP client
/// internals are capped at warn.
pub fn setup_logging(level: log::LevelFilter) {
    env_logger::Builder::new()
        .filter_level(level)
        .filter_module("reqwest", level.min(log::LevelFilter::Warn))
        .filter_module("rustls", level.min(log::LevelFilter::Warn))
        .format(|buf, record| {
            let thread = std::thread::current();
            writeln!(
                buf,
                "[{0} {1} {2} {3}] {4}",
                record.level(),
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                thread.name().unwrap_or("-"),
                record.module_path().unwrap_or(""),
                record.args()
            )
        })
        .target(env_logger::Target::Stdout)
        .init();
}
