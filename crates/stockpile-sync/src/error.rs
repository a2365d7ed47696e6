use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("calendar offset of {0} seconds is out of range")]
  InvalidCalendarOffset(i32),

  #[error("retention of {0} days is out of range")]
  InvalidRetention(u32),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
