use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("post `{id}` not found")]
    PostNotFound { id: String },
    #[error("domain validation failed: {message}")]
    Validation { message: String },
    #[error("front matter is invalid: {message}")]
    FrontMatter { message: String },
}

impl DomainError {
    pub fn post_not_found(id: impl Into<String>) -> Self {
        Self::PostNotFound { id: id.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn front_matter(message: impl Into<String>) -> Self {
        Self::FrontMatter {
            message: message.into(),
        }
    }
}
