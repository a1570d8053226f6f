use crate::response::ResponseResult;

#[derive(Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    // Lifecycle errors
    Uninitialized,
    Timeout,

    // Notification registry errors
    RegistryFull,
    InvalidIdentifier,

    // Response handling errors
    /// The exchange completed with something other than `OK`.
    Response(ResponseResult),
    FieldNotFound,
    BufferTooSmall,
    CommandTooLong,

    Atat(atat::Error),

    IoPin,
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter<'_>) {
        match self {
            Self::Uninitialized => defmt::write!(f, "Uninitialized"),
            Self::Timeout => defmt::write!(f, "Timeout"),
            Self::RegistryFull => defmt::write!(f, "RegistryFull"),
            Self::InvalidIdentifier => defmt::write!(f, "InvalidIdentifier"),
            Self::Response(r) => defmt::write!(f, "Response({:?})", r),
            Self::FieldNotFound => defmt::write!(f, "FieldNotFound"),
            Self::BufferTooSmall => defmt::write!(f, "BufferTooSmall"),
            Self::CommandTooLong => defmt::write!(f, "CommandTooLong"),
            Self::Atat(e) => defmt::write!(f, "Atat({:?})", e),
            Self::IoPin => defmt::write!(f, "IoPin"),
        }
    }
}

impl From<atat::Error> for Error {
    fn from(e: atat::Error) -> Self {
        Self::Atat(e)
    }
}

impl From<ResponseResult> for Error {
    fn from(r: ResponseResult) -> Self {
        match r {
            ResponseResult::Timeout => Self::Timeout,
            other => Self::Response(other),
        }
    }
}
