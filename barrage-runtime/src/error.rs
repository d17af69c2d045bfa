use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("address parsing error: {0}")]
    AddrParse(#[from] std::net::AddrParseError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
