use std::path::Path;
use std::sync::OnceLock;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Log to stderr and to `smartassist.log` in `dir`. If the file cannot be
/// opened, stderr alone is used.
pub fn init(dir: &Path) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let file = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix("smartassist")
        .filename_suffix("log")
        .build(dir);

    match file {
        Ok(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = GUARD.set(guard);
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .try_init();
        }
        Err(e) => {
            let _ = tracing_subscriber::registry().with(filter).with(console).try_init();
            tracing::warn!("log file unavailable in {}: {}", dir.display(), e);
        }
    }
    info!("===== smartassist start =====");
}
