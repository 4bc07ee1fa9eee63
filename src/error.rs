//! Exit codes for the repolint binary.
//!
//! Library errors are typed per module (`ScanError`, `StorageError`,
//! `SourceError`); this module only maps scan outcomes to process exit
//! codes:
//!
//! - 0: Scan completed without error-severity findings
//! - 1: Fatal error (configuration, I/O, unsorted input)
//! - 2: Scan completed with error-severity findings

/// Exit codes for the repolint application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Scan completed, nothing at error severity.
    Clean = 0,
    /// An unexpected or fatal error occurred.
    GeneralError = 1,
    /// Scan completed but error-severity findings were reported.
    FindingsFound = 2,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_values() {
        assert_eq!(ExitCode::Clean.as_i32(), 0);
        assert_eq!(ExitCode::GeneralError.as_i32(), 1);
        assert_eq!(ExitCode::FindingsFound.as_i32(), 2);
    }
}
