//! CLI Error Types

use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("unable to load configuration")]
    Config,
    #[display("invalid slot number")]
    InvalidSlot,
    #[display("operation failed")]
    Library,
    #[display("unable to talk to the terminal")]
    Terminal,
}
