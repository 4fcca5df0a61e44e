use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("address must be {expected} hex characters, got {actual}")]
    Length { expected: usize, actual: usize },
    #[error("address contains non-hex character {0:?}")]
    InvalidCharacter(char),
}
