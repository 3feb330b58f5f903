use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("DynamoDB error: {0}")]
    DynamoDb(String),

    #[error("S3 error: {0}")]
    S3(String),

    #[error("SES error: {0}")]
    Ses(String),

    #[error("SimpleDB error: {0}")]
    SimpleDb(String),

    #[error("Step Functions error: {0}")]
    StepFunctions(String),

    #[error("Malformed page: {0}")]
    MalformedPage(String),

    #[error("{0} items were left unprocessed")]
    Unprocessed(usize),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Encoding(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}
