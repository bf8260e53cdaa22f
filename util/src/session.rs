//! Session management
//!
//! A session is one run of an executable. Each session gets its own directory under
//! `$OFFBOARD_SW_ROOT/<sessions_dir>`, holding the log file and a copy of the parameters the run
//! was started with, and a process-wide epoch used to timestamp log records.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use chrono::{DateTime, Utc};
use conquer_once::OnceCell;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
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

/// Format of the timestamp in session directory names, see
/// https://docs.rs/chrono/0.4/chrono/format/strftime/index.html
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Subdirectory of the session holding the archived parameters.
const PARAMS_ARCHIVE_DIR: &str = "params";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Paths belonging to the current session
#[derive(Clone, Debug)]
pub struct Session {
    /// The root directory for this session
    pub session_root: PathBuf,

    /// The path to the session's log file
    pub log_file_path: PathBuf,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors associated with the session module.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("The software root environment variable (OFFBOARD_SW_ROOT) is not set")]
    SwRootNotSet,

    #[error("Cannot create the session directory: {0}")]
    CannotCreateDir(std::io::Error),

    #[error("A session has already been started in this process ({0})")]
    AlreadyStarted(conquer_once::TryInitError),

    #[error("Cannot serialise the parameters for archiving: {0}")]
    SerialiseError(toml::ser::Error),

    #[error("Cannot write the archived parameters: {0}")]
    ArchiveError(std::io::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Session {
    /// Start the session, creating `{sessions_dir}/{exec_name}_{timestamp}` under the software
    /// root.
    ///
    /// Only one session can be started per process.
    pub fn new(exec_name: &str, sessions_dir: &str) -> Result<Self, SessionError> {
        SESSION_EPOCH.try_init_once(Utc::now)
            .map_err(SessionError::AlreadyStarted)?;

        let epoch = get_epoch().copied().unwrap_or_else(Utc::now);

        let mut session_root = crate::host::get_sw_root()
            .map_err(|_| SessionError::SwRootNotSet)?;
        session_root.push(sessions_dir);
        session_root.push(format!("{}_{}", exec_name, epoch.format(TIMESTAMP_FORMAT)));

        fs::create_dir_all(&session_root).map_err(SessionError::CannotCreateDir)?;

        let log_file_path = session_root.join(format!("{}.log", exec_name));

        Ok(Session {
            session_root,
            log_file_path,
        })
    }

    /// Write a copy of a parameter struct into the session, as TOML.
    ///
    /// Returns the path of the written file.
    pub fn archive_params<P>(&self, file_name: &str, params: &P) -> Result<PathBuf, SessionError>
    where
        P: Serialize
    {
        let params_str = toml::to_string(params).map_err(SessionError::SerialiseError)?;

        let dir = self.session_root.join(PARAMS_ARCHIVE_DIR);
        fs::create_dir_all(&dir).map_err(SessionError::ArchiveError)?;

        let path = dir.join(file_name);
        fs::write(&path, params_str).map_err(SessionError::ArchiveError)?;

        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Seconds elapsed since the session started, or `NAN` before the session has been started.
pub fn get_elapsed_seconds() -> f64 {
    match SESSION_EPOCH.get() {
        Some(e) => time::duration_to_seconds(Utc::now() - *e).unwrap_or(std::f64::NAN),
        None => std::f64::NAN,
    }
}

/// The time at which the session started.
pub fn get_epoch() -> Option<&'static DateTime<Utc>> {
    SESSION_EPOCH.get()
}

#[cfg(test)]
mod test {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Gains {
        k_p: f64,
        limit: Option<f64>,
        target: [f64; 3],
    }

    #[test]
    fn test_archive_params() {
        let root = std::env::temp_dir()
            .join(format!("util_session_test_{}", std::process::id()));
        let session = Session {
            log_file_path: root.join("test.log"),
            session_root: root.clone(),
        };

        let gains = Gains { k_p: 2.0, limit: None, target: [0.0, 0.0, 1.0] };
        let path = session.archive_params("gains.toml", &gains).unwrap();

        assert_eq!(path, root.join("params").join("gains.toml"));
        let loaded: Gains = crate::params::load_from_path(&path).unwrap();
        assert_eq!(loaded, gains);

        fs::remove_dir_all(&root).ok();
    }
}
