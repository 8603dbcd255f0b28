use std::path::*;
use flexi_logger::*;

pub fn start_logger(log_path: &Path, duplicate_to_stderr: bool) -> anyhow::Result<LoggerHandle> {
    let custom_format_fun = |
        w:      &mut dyn std::io::Write,
        now:    &mut DeferredNow,
        record: &Record
    | -> Result<(), std::io::Error> {
        write!(
            w, "[{}] {} {}",
            now.format(TS_DASHES_BLANK_COLONS_DOT_BLANK),
            record.level(),
            record.args()
        )
    };

    let dup = if duplicate_to_stderr { Duplicate::Info } else { Duplicate::Error };

    let handle = Logger::try_with_str("trace")?
        .log_to_file(
            FileSpec::default()
                .directory(log_path)
                .basename(env!("CARGO_PKG_NAME"))
        )
        .format(custom_format_fun)
        .duplicate_to_stderr(dup)
        .print_message()
        .start()?;

    Ok(handle)
}

pub fn cleanup_old_logs(log_path: &Path, max_days: u64) {
    let Ok(dir) = std::fs::read_dir(log_path) else {
        return;
    };
    let max_age = std::time::Duration::from_secs(max_days * 24 * 60 * 60);
    for entry in dir.flatten() {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("log") {
            continue;
        }
        let Ok(modified) = entry.metadata().and_then(|md| md.modified()) else {
            continue;
        };
        let Ok(age) = modified.elapsed() else {
            continue;
        };
        if age > max_age {
            log::debug!("Removing old log file {}", path.to_str().unwrap_or_default());
            _ = std::fs::remove_file(&path);
        }
    }
}
