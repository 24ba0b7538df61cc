//! Session management
//!
//! A session is one run of an executable. Each session gets its own directory, named after the
//! executable and the time it started, which holds the log file and any archives written during
//! the run. The session epoch is the time origin for log timestamps and TC scripts.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use chrono::{DateTime, Utc};
use conquer_once::OnceCell;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

// Internal imports
use crate::time;

// ---------------------------------------------------------------------------
// STATICS
// ---------------------------------------------------------------------------

static SESSION_EPOCH: OnceCell<DateTime<Utc>> = OnceCell::uninit();

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// A chrono format string which diplays a timestamp. See
/// https://docs.rs/chrono/0.4.11/chrono/format/strftime/index.html for more
/// information.
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Environment variable giving the root directory of the software, which contains the `params`
/// and `sessions` directories.
pub const SW_ROOT_ENV_VAR: &str = "TELEOP_SW_ROOT";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A struct storing information about the current session
#[derive(Clone, Debug)]
pub struct Session {
    /// The root directory for this session
    pub session_root: PathBuf,

    /// The root directory for this session's archives
    pub arch_root: PathBuf,

    /// The path to the session's log file
    pub log_file_path: PathBuf,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors associated with the session module.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Cannot create the session directory: {0}")]
    CannotCreateDir(std::io::Error),

    #[error(
        "Cannot initialise the session epoch, have you already initialised the \
         session? (conquer_once error: {0})"
    )]
    CannotInitEpoch(conquer_once::TryInitError),

    #[error("Cannot get the epoch time, did you forget to initialise the session?")]
    CannotGetEpoch,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Session {
    /// Start a new session within the given directory.
    ///
    /// This will create a new session directory named `{exec_name}_{timestamp}` inside
    /// `{sw_root}/{sessions_dir}`.
    pub fn new(exec_name: &str, sessions_dir: &str) -> Result<Self, SessionError> {
        // Set the session epoch
        SESSION_EPOCH
            .try_init_once(Utc::now)
            .map_err(SessionError::CannotInitEpoch)?;

        // Format the session epoch as a timestamp
        let timestamp = match SESSION_EPOCH.get() {
            Some(e) => e.format(TIMESTAMP_FORMAT),
            None => return Err(SessionError::CannotGetEpoch),
        };

        // Create the session path
        let mut path = get_sw_root();
        path.push(sessions_dir);
        path.push(format!("{}_{}", exec_name, timestamp));

        Self::create_in(&path, exec_name)
    }

    /// Create the session directory structure at the given path.
    ///
    /// Does not touch the session epoch, so may be used more than once in a process.
    pub fn create_in<P: AsRef<Path>>(path: P, exec_name: &str) -> Result<Self, SessionError> {
        let path = path.as_ref().to_path_buf();

        // Create the directory
        fs::create_dir_all(&path).map_err(SessionError::CannotCreateDir)?;

        // Create the archive dir
        let arch_path = path.join("arch");
        fs::create_dir_all(&arch_path).map_err(SessionError::CannotCreateDir)?;

        // Create the log file path
        let log_file_path = path.join(format!("{}.log", exec_name));

        Ok(Session {
            session_root: path,
            arch_root: arch_path,
            log_file_path,
        })
    }

    /// Resolve a path given by the user against this session.
    ///
    /// Absolute paths are returned as-is, relative paths are placed inside the session directory.
    pub fn resolve<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        if path.as_ref().is_absolute() {
            path.as_ref().to_path_buf()
        } else {
            self.session_root.join(path)
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Get the root directory of the software.
///
/// This is the value of the `TELEOP_SW_ROOT` environment variable, or the current directory if it
/// is not set.
pub fn get_sw_root() -> PathBuf {
    match std::env::var_os(SW_ROOT_ENV_VAR) {
        Some(r) => PathBuf::from(r),
        None => PathBuf::from("."),
    }
}

/// Get the number of seconds elapsed since the start of the session.
///
/// Returns `0.0` if no session has been started yet.
pub fn get_elapsed_seconds() -> f64 {
    match SESSION_EPOCH.get() {
        Some(e) => match time::duration_to_seconds(Utc::now() - *e) {
            Some(s) => s,
            None => std::f64::NAN,
        },
        None => 0.0,
    }
}

/// Return a reference to the session's epoch, if the session has been started.
pub fn get_epoch() -> Option<&'static DateTime<Utc>> {
    SESSION_EPOCH.get()
}

/// Return the session's epoch formatted for display.
pub fn get_epoch_string() -> String {
    match get_epoch() {
        Some(e) => e.to_rfc3339(),
        None => String::from("not started"),
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_create_in() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::create_in(dir.path().join("teleop_test"), "teleop_test").unwrap();

        assert!(session.session_root.is_dir());
        assert!(session.arch_root.is_dir());
        assert_eq!(
            session.log_file_path,
            dir.path().join("teleop_test").join("teleop_test.log")
        );
    }

    #[test]
    fn test_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::create_in(dir.path(), "teleop_test").unwrap();

        assert_eq!(session.resolve("drive.csv"), dir.path().join("drive.csv"));

        let abs = dir.path().join("elsewhere.csv");
        assert_eq!(session.resolve(&abs), abs);
    }
}
