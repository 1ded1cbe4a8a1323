use thiserror::Error;

/// Errors that can occur while assembling a Protocol
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Protocol is locked and cannot be modified
    #[error("Protocol is already locked and cannot be modified. Protocol.lock() has been called and no further changes are allowed")]
    AlreadyLocked,
    /// A template with the same name was already registered
    #[error("Template `{name}` is already registered")]
    DuplicateTemplate { name: String },
    /// Template names become part of object ids and cannot be empty or contain '-'
    #[error("Template name `{name}` is invalid; it must be non-empty and must not contain '-'")]
    InvalidTemplateName { name: String },
}
