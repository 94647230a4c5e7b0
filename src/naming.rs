use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use time::OffsetDateTime;

/// Local time if the UTC offset can be determined, UTC otherwise. (Unix
/// platforms refuse to report the offset once the process is
/// multi-threaded.)
pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// The "logs" directory next to the running executable.
pub fn default_logs_dir() -> std::io::Result<PathBuf> {
    let exe = std::env::current_exe()?;
    let dir = exe.parent().unwrap_or_else(|| Path::new("."));
    Ok(dir.join("logs"))
}

/// Returns the file name stem for a session started at `now`, i.e.
/// `<prefix>_<DDMMYY>_<HHMM>`.
pub fn file_stem(prefix: &str, now: OffsetDateTime) -> std::io::Result<String> {
    let format = time::macros::format_description!(
        version = 2,
        "[day][month][year repr:last_two]_[hour][minute]"
    );
    let stamp = now.format(&format).map_err(std::io::Error::other)?;
    Ok(format!("{prefix}_{stamp}"))
}

/// Creates `logs_dir` if necessary and then creates a new, empty file named
/// `<prefix>_<DDMMYY>_<HHMM>.<extension>` inside it. Sessions started within
/// the same minute get a `_2`, `_3`, ... suffix rather than overwriting
/// each other - files are created with create_new, so this also holds for
/// concurrent sessions.
pub fn reserve_output_file(
    logs_dir: &Path,
    prefix: &str,
    extension: &str,
    now: OffsetDateTime,
) -> std::io::Result<(PathBuf, File)> {
    std::fs::create_dir_all(logs_dir)?;
    let stem = file_stem(prefix, now)?;
    let mut attempt = 1;
    loop {
        let name = if attempt == 1 {
            format!("{stem}.{extension}")
        } else {
            format!("{stem}_{attempt}.{extension}")
        };
        let path = logs_dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(e),
        }
    }
}
