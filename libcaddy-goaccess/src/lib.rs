mod client;
mod convert;
mod error;
mod filter;
mod format;
mod headers;
mod record;

pub use crate::client::resolve_client_host;
pub use crate::convert::{Converter, PROGRESS_INTERVAL, Stats};
pub use crate::error::ConvertError;
pub use crate::filter::{Exclusion, Filter};
pub use crate::format::{LOG_FORMAT, Line, mime_type};
pub use crate::headers::NormalizedHeaders;
pub use crate::record::{Headers, LogRecord, Request, Tls};
