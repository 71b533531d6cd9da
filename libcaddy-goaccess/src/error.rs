use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Invalid log record #{index}")]
    InvalidRecord {
        /// 1-based position of the record in its stream.
        index: u64,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ConvertError {
    pub(crate) fn from_json(err: serde_json::Error, index: u64) -> Self {
        if err.is_io() {
            ConvertError::Io(err.into())
        } else {
            ConvertError::InvalidRecord { index, source: err }
        }
    }
}

#[test]
fn test_from_json() {
    let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let err = ConvertError::from_json(err, 3);
    assert!(matches!(err, ConvertError::InvalidRecord { index: 3, .. }));
    assert_eq!(err.to_string(), "Invalid log record #3");

    let io_err = io::Error::new(io::ErrorKind::UnexpectedEof, "truncated gzip");
    let err = ConvertError::from_json(serde_json::Error::io(io_err), 1);
    match err {
        ConvertError::Io(io_err) => {
            assert_eq!(io_err.kind(), io::ErrorKind::UnexpectedEof);
            assert_eq!(io_err.to_string(), "truncated gzip");
        }
        other => panic!("expected an I/O error, got {other:?}"),
    }
}
