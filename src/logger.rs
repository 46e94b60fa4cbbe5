use env_logger::Builder;
use log::LevelFilter;
use std::env;
use std::io::Write;

/// Initialize logging for the application.
/// Level comes from RUST_LOG, defaulting to Info.
pub fn init_logger() {
    let level = env::var("RUST_LOG")
        .unwrap_or_else(|_| "info".to_string())
        .parse()
        .unwrap_or(LevelFilter::Info);

    let mut builder = Builder::new();
    builder
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}:{}] {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Stdout);

    // try_init so tests that race on the global logger don't panic
    let _ = builder.try_init();
}
