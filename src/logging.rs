// Logging setup
//
// env_logger with an `info` default (RUST_LOG still wins). When the config
// asks for a log file, every line goes to stderr and to the file, so
// validation-layer output survives after the window closes.

use crate::config::Config;
use env_logger::{Builder, Env, Target};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};

/// Initialize logging with optional file output
pub fn init(config: &Config) {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));

    if config.debug.log_to_file {
        match open_log_file(&config.debug.log_file) {
            Ok(file) => {
                builder.target(Target::Pipe(Box::new(Tee {
                    file,
                    stderr: io::stderr(),
                })));
            }
            Err(e) => eprintln!("Could not open log file {}: {}", config.debug.log_file, e),
        }
    }

    // A second init (e.g. from tests) is harmless
    let _ = builder.try_init();
}

fn open_log_file(path: &str) -> io::Result<File> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;

    writeln!(file, "=== Vulkan Learning Log ===")?;
    writeln!(file, "Started: {:?}", std::time::SystemTime::now())?;
    writeln!(file)?;

    Ok(file)
}

/// Writes everything to both stderr and the log file
struct Tee<W: Write> {
    file: W,
    stderr: io::Stderr,
}

impl<W: Write> Write for Tee<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stderr.write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stderr.flush()?;
        self.file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tee_copies_into_the_file_side() {
        let mut tee = Tee {
            file: Vec::new(),
            stderr: io::stderr(),
        };

        write!(tee, "[Vulkan] hello").unwrap();
        tee.flush().unwrap();

        assert_eq!(tee.file, b"[Vulkan] hello");
    }
}
