use std::fmt;

/// The closed set of failure modes surfaced by this crate.
///
/// `ShaderFunctionMissing` is only ever returned from [`crate::RadixSortDriver::new`],
/// which checks every required kernel name is defined in its shader sources before
/// building any pipeline; the remaining variants are returned from per-invocation calls
/// (`sort`, `BufferPool::acquire`, `CommandRecorder::make_command_object`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortError {
    /// A scratch or input buffer would exceed the device's maximum buffer length.
    CapacityExceeded { requested: u64, max: u64 },
    /// A required compute entry point is missing from the shader module.
    ShaderFunctionMissing { name: &'static str },
    /// The command recorder is at its in-flight cap (see `CommandRecorder::max_in_flight`).
    CommandObjectUnavailable,
    /// A caller-supplied argument violates the sorter's preconditions.
    InvalidArgument { which: &'static str },
}

impl fmt::Display for SortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortError::CapacityExceeded { requested, max } => write!(
                f,
                "requested buffer of {requested} bytes exceeds device maximum of {max} bytes"
            ),
            SortError::ShaderFunctionMissing { name } => {
                write!(f, "shader entry point `{name}` not found")
            }
            SortError::CommandObjectUnavailable => {
                write!(f, "command recorder has no free command object slots")
            }
            SortError::InvalidArgument { which } => {
                write!(f, "invalid argument: {which}")
            }
        }
    }
}

impl std::error::Error for SortError {}
