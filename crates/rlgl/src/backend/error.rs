use std::fmt;

use super::ShaderStage;

/// Failure while creating a GPU object.
///
/// Carries the driver's diagnostic text where one exists so callers can log
/// it verbatim before falling back to a null handle.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendError {
    ShaderCompile { stage: ShaderStage, log: String },
    ProgramLink { log: String },
    /// The active strategy cannot do this at all.
    Unsupported(&'static str),
    /// The driver refused to allocate an object.
    Allocation { what: &'static str, reason: String },
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::ShaderCompile { stage, log } => {
                let stage = match stage {
                    ShaderStage::Vertex => "vertex",
                    ShaderStage::Fragment => "fragment",
                };
                write!(f, "{stage} shader failed to compile: {}", log.trim_end())
            }
            BackendError::ProgramLink { log } => {
                write!(f, "program failed to link: {}", log.trim_end())
            }
            BackendError::Unsupported(what) => write!(f, "unsupported by this backend: {what}"),
            BackendError::Allocation { what, reason } => {
                write!(f, "failed to create {what}: {reason}")
            }
        }
    }
}

impl std::error::Error for BackendError {}
