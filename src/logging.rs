use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Once;

use chrono::{SecondsFormat, Utc};

use crate::config::{self, LogFormat, LogMode, LoggingConfig};

static INIT: Once = Once::new();

/// Installs the global `env_logger` once. `RUST_LOG` overrides the default
/// `info` filter; format and sink come from `LOG_FORMAT`/`LOG_MODE`/`LOG_DIR`.
pub fn init() {
    INIT.call_once(|| {
        let cfg = config::logging_config().clone();
        let mut warnings = Vec::new();
        let mut builder =
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));

        let format = cfg.format;
        builder.format(move |buf, record| {
            let line = render_line(
                format,
                &Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                &record.level().to_string(),
                record.target(),
                &record.args().to_string(),
            );
            writeln!(buf, "{}", line)
        });
        builder.target(log_target(&cfg, &mut warnings));

        let _ = builder.try_init();
        for warning in warnings {
            log::warn!("{}", warning);
        }
    });
}

fn render_line(format: LogFormat, ts: &str, level: &str, target: &str, msg: &str) -> String {
    match format {
        LogFormat::Json => serde_json::json!({
            "ts": ts,
            "level": level,
            "target": target,
            "msg": msg,
        })
        .to_string(),
        LogFormat::Text => format!("{} {} {} {}", ts, level, target, msg),
    }
}

fn log_target(cfg: &LoggingConfig, warnings: &mut Vec<String>) -> env_logger::Target {
    let dir = match (cfg.mode, cfg.dir.as_ref()) {
        (LogMode::File, Some(dir)) => dir,
        _ => return env_logger::Target::Stdout,
    };
    if let Err(err) = std::fs::create_dir_all(dir) {
        warnings.push(format!("[logging] failed to create log dir {}: {}", dir, err));
    }
    let path = Path::new(dir).join(&cfg.file_name);
    match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => env_logger::Target::Pipe(Box::new(file)),
        Err(err) => {
            warnings.push(format!(
                "[logging] failed to open log file ({}): {}, using stdout",
                path.display(),
                err
            ));
            env_logger::Target::Stdout
        }
    }
}
