use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid hardware address: {0}")]
    InvalidHwAddr(String),

    #[error("invalid interface state: {0}")]
    InvalidState(String),
}

pub type Result<T> = std::result::Result<T, Error>;
