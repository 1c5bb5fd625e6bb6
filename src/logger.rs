use log::LevelFilter;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::{Path, PathBuf};

const ENCODER_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
const ROLL_SIZE: u64 = 10 * 1024 * 1024;

fn rolling_appender(
    base: &Path,
    stem: &str,
    keep: u32,
) -> Result<RollingFileAppender, Box<dyn std::error::Error>> {
    let roller = FixedWindowRoller::builder()
        .build(&format!("{}", base.join(format!("{stem}.{{}}.log")).display()), keep)?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    Ok(RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(ENCODER_PATTERN)))
        .build(base.join(format!("{stem}.log")), Box::new(policy))?)
}

/// Configure logging globally for the process: a rolling `app.log` for
/// everything plus a rolling `audit.log` fed by the `tomblite::audit`
/// target. If log4rs is already initialized the existing config stays.
/// - dir: base directory for logs; if None, current directory.
/// - level: error|warn|info|debug|trace
/// - retention: number of rolled files to keep (default 7)
pub fn configure_logging(
    dir: Option<&Path>,
    level: Option<&str>,
    retention: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let base = dir
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    std::fs::create_dir_all(&base)?;
    let keep = retention.unwrap_or(7) as u32;
    let lvl = match level.unwrap_or("info").to_ascii_lowercase().as_str() {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    };
    let app_appender = rolling_appender(&base, "app", keep)?;
    let audit_appender = rolling_appender(&base, "audit", keep)?;
    let config = Config::builder()
        .appender(Appender::builder().build("app", Box::new(app_appender)))
        .appender(Appender::builder().build("audit", Box::new(audit_appender)))
        .logger(Logger::builder().appender("audit").additive(false).build("tomblite::audit", lvl))
        .build(Root::builder().appender("app").build(lvl))?;
    let _ = log4rs::init_config(config);
    Ok(())
}

/// Configure logging from environment variables if present:
/// - TOMBLITE_LOG_DIR
/// - TOMBLITE_LOG_LEVEL
/// - TOMBLITE_LOG_RETENTION
pub fn configure_from_env() -> Result<(), Box<dyn std::error::Error>> {
    let dir = std::env::var("TOMBLITE_LOG_DIR").ok().map(PathBuf::from);
    let level = std::env::var("TOMBLITE_LOG_LEVEL").ok();
    let retention =
        std::env::var("TOMBLITE_LOG_RETENTION").ok().and_then(|s| s.parse::<usize>().ok());
    configure_logging(dir.as_deref(), level.as_deref(), retention)
}
