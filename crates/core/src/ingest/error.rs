use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// Network failure, non-success status or undecodable body. Retried.
    Transient,
    /// The payload decoded but lacks or contradicts an expected field. Not retried.
    Structural,
    /// The retry bound was reached; `detail` carries the last transient failure.
    RetriesExhausted { attempts: u32 },
}

#[derive(Debug, Clone)]
pub struct FetchError {
    pub provider: &'static str,
    pub kind: FetchErrorKind,
    pub detail: String,
}

impl FetchError {
    pub fn transient(provider: &'static str, detail: impl Into<String>) -> Self {
        Self {
            provider,
            kind: FetchErrorKind::Transient,
            detail: detail.into(),
        }
    }

    pub fn structural(provider: &'static str, detail: impl Into<String>) -> Self {
        Self {
            provider,
            kind: FetchErrorKind::Structural,
            detail: detail.into(),
        }
    }

    pub fn exhausted(attempts: u32, last: FetchError) -> Self {
        Self {
            provider: last.provider,
            kind: FetchErrorKind::RetriesExhausted { attempts },
            detail: last.detail,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind == FetchErrorKind::Transient
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FetchErrorKind::Transient => {
                write!(f, "{} transient failure: {}", self.provider, self.detail)
            }
            FetchErrorKind::Structural => {
                write!(f, "{} unexpected response: {}", self.provider, self.detail)
            }
            FetchErrorKind::RetriesExhausted { attempts } => write!(
                f,
                "{} failed after {attempts} attempts: {}",
                self.provider, self.detail
            ),
        }
    }
}

impl std::error::Error for FetchError {}
