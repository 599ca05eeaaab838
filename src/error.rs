use derive_more::{Display, Error};
use std::path::PathBuf;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("invalid path: {}", _0.display())]
    Path(#[error(not(source))] PathBuf),
    #[display("could not set up {_0}")]
    Setup(#[error(not(source))] String),
}
