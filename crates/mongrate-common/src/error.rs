use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by a collaborator of the migration engine: the config
/// loader, the history store, or the script source.
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found: {0}")]
    NotFound(String),
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn error_display_includes_context() {
        let e = Error::Config("bad yaml".into());
        assert_eq!(e.to_string(), "configuration error: bad yaml");

        let e = Error::Database("connection refused".into());
        assert_eq!(e.to_string(), "database error: connection refused");

        let e = Error::NotFound("001_init.js".into());
        assert_eq!(e.to_string(), "not found: 001_init.js");
    }

    #[test]
    fn io_errors_convert_and_keep_message() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file or directory");
        let e: Error = io.into();
        assert!(matches!(e, Error::Io(_)));
        assert_eq!(e.to_string(), "io error: no such file or directory");
    }
}
