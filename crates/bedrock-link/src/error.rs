use thiserror::Error;

pub type Result<T> = std::result::Result<T, LinkError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LinkError {
    /// Every association id in the session is taken.
    #[error("link session is full ({max} peers)")]
    SessionFull { max: u16 },
}
