use std::io::Write;
use std::sync::{Mutex, OnceLock};

static LOG: OnceLock<Mutex<Logger>> = OnceLock::new();

pub fn setup_logger(options: LogOptions) -> &'static Mutex<Logger> {
	LOG.get_or_init(|| Mutex::new(Logger::new(options)))
}

pub fn get_logger() -> &'static Mutex<Logger> {
	LOG.get_or_init(|| Mutex::new(Logger::new(LogOptions::default())))
}

#[macro_export]
macro_rules! log {
	($level:path, $($arg: tt)*) => {{
		let string = std::fmt::format(std::format_args!($($arg)*));
		$crate::config::logger::get_logger()
			.lock()
			.unwrap()
			.log($level, &string);
	}};
}

#[macro_export]
macro_rules! debug {
	($($arg: tt)*) => {{
		$crate::log!($crate::config::Level::Debug, $($arg)*)
	}};
}

#[macro_export]
macro_rules! verbose {
	($($arg: tt)*) => {{
		$crate::log!($crate::config::Level::Verbose, $($arg)*)
	}};
}

#[macro_export]
macro_rules! info {
	($($arg: tt)*) => {{
		$crate::log!($crate::config::Level::Info, $($arg)*)
	}};
}

#[macro_export]
macro_rules! warn {
	($($arg: tt)*) => {{
		$crate::log!($crate::config::Level::Warning, $($arg)*)
	}};
}

#[macro_export]
macro_rules! error {
	($($arg: tt)*) => {{
		$crate::log!($crate::config::Level::Error, $($arg)*)
	}};
}

type LogWriter = Box<dyn Write + Send + Sync>;

pub struct LogOptions {
	level: Level,
	out: LogWriter,
}

impl LogOptions {
	pub fn new(level: Level, out: LogWriter) -> LogOptions { Self { level, out } }
}

impl std::fmt::Debug for LogOptions {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("LogOptions").field("level", &self.level).finish()
	}
}

impl Default for LogOptions {
	fn default() -> Self { Self::new(Level::Info, Box::new(std::io::stderr())) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
	Error,
	Notice,
	Warning,
	Info,
	Verbose,
	Debug,
}

impl Level {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Error => "Error:",
			Self::Notice => "Notice:",
			Self::Warning => "Warning:",
			Self::Info => "Info:",
			Self::Verbose => "Verbose:",
			Self::Debug => "Debug:",
		}
	}

	/// Crude ANSI color per level, skipped when the logger has been
	/// configured for a non-terminal sink (tests, redirected output).
	fn ansi(&self) -> &'static str {
		match self {
			Self::Error => "\x1b[1;91m",
			Self::Notice => "\x1b[1;92m",
			Self::Warning => "\x1b[1;93m",
			Self::Info | Self::Verbose | Self::Debug => "\x1b[1;96m",
		}
	}
}

#[derive(Debug)]
pub struct Logger {
	options: LogOptions,
	color: bool,
}

impl Logger {
	pub fn new(options: LogOptions) -> Logger { Logger { options, color: true } }

	pub fn set_color(&mut self, color: bool) { self.color = color; }

	pub fn should_log(&self, msg_level: Level) -> bool {
		match msg_level {
			Level::Error | Level::Notice | Level::Warning | Level::Info => true,
			Level::Verbose => matches!(self.level(), Level::Verbose | Level::Debug),
			Level::Debug => matches!(self.level(), Level::Debug),
		}
	}

	pub fn log(&mut self, level: Level, msg: &str) {
		if !self.should_log(level) {
			return;
		}

		let now = chrono::Local::now().format("%H:%M:%S");
		let result = if self.color {
			writeln!(self.options.out, "{}{} {now}\x1b[0m {msg}", level.ansi(), level.as_str())
		} else {
			writeln!(self.options.out, "{} {now} {msg}", level.as_str())
		};
		result.expect("failed to write to log sink");
	}

	pub fn level(&self) -> Level { self.options.level }

	pub fn set_level(&mut self, level: Level) { self.options.level = level; }
}

#[cfg(test)]
mod tests {
	use std::io::Write;
	use std::sync::{Arc, Mutex};

	use super::{Level, LogOptions, Logger};

	struct SharedBuf(Arc<Mutex<Vec<u8>>>);

	impl Write for SharedBuf {
		fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> { self.0.lock().unwrap().write(buf) }

		fn flush(&mut self) -> std::io::Result<()> { Ok(()) }
	}

	fn logger_with(level: Level) -> (Logger, Arc<Mutex<Vec<u8>>>) {
		let buf = Arc::new(Mutex::new(Vec::new()));
		let mut logger = Logger::new(LogOptions::new(level, Box::new(SharedBuf(buf.clone()))));
		logger.set_color(false);
		(logger, buf)
	}

	fn contents(buf: &Arc<Mutex<Vec<u8>>>) -> String {
		String::from_utf8(buf.lock().unwrap().clone()).unwrap()
	}

	#[test]
	fn info_always_logs_but_debug_is_suppressed_at_info_level() {
		let (mut logger, buf) = logger_with(Level::Info);
		logger.log(Level::Info, "hello");
		assert!(contents(&buf).ends_with("hello\n"));
		assert!(contents(&buf).starts_with("Info: "));

		let before = contents(&buf);
		logger.log(Level::Debug, "hidden");
		assert_eq!(contents(&buf), before);
	}

	#[test]
	fn debug_level_unlocks_debug_and_verbose() {
		let (mut logger, buf) = logger_with(Level::Debug);
		logger.log(Level::Debug, "deep");
		assert!(contents(&buf).contains("deep"));

		logger.log(Level::Verbose, "mid");
		let out = contents(&buf);
		assert!(out.contains("deep") && out.contains("mid"));
		assert_eq!(out.lines().count(), 2);
	}
}
