use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Nickname must not be empty")]
    EmptyNickname,

    #[error("Join address must not be empty")]
    EmptyAddress,

    #[error("Invalid port: {0}")]
    InvalidPort(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Session gateway is closed")]
    Closed,

    #[error("Session gateway refused the request: {0}")]
    Refused(String),
}
