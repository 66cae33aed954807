//! Tracing subscriber setup: pretty or JSON to stderr, plus an optional
//! non-blocking file sink.

use tracing_subscriber::EnvFilter;

use crate::cli::FILE_GUARD;

pub fn init_tracing(json: bool, log_level: &str, file: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    if let Some(path) = file {
        let path = std::path::Path::new(path);
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| std::path::Path::new("."));
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "rowmetrics.log".to_string());
        let appender = tracing_appender::rolling::never(dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        if json {
            builder.json().with_writer(non_blocking).init();
        } else {
            builder.with_writer(non_blocking).init();
        }
    } else if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
