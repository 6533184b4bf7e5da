use thiserror::Error;

/// The error taxonomy for the whole emulator. Structural errors bubble up to
/// `main`, policy errors are fatal in development builds, trap-surface errors
/// fail loudly with the trap name, and OS-reportable errors are converted to
/// Mac OS error words at the handler boundary before they ever reach here.
#[derive(Debug, Error)]
pub enum EmuError {
    #[error("out of range: {0}")]
    OutOfRange(String),

    #[error("malformed data: {0}")]
    Malformed(String),

    #[error("access policy violation: {0}")]
    Policy(String),

    #[error("unimplemented trap {name} (0x{opcode:04x})")]
    UnimplementedTrap { name: String, opcode: u16 },

    #[error("illegal instruction 0x{opcode:04x} at 0x{pc:08x}")]
    IllegalInstruction { opcode: u16, pc: u32 },

    #[error("resource {type_name}:{id} not found")]
    ResourceNotFound { type_name: String, id: i16 },

    #[error("application heap exhausted ({requested} bytes requested)")]
    OutOfMemory { requested: u32 },

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EmuError>;

impl EmuError {
    pub fn out_of_range(what: impl Into<String>) -> Self {
        EmuError::OutOfRange(what.into())
    }

    pub fn malformed(what: impl Into<String>) -> Self {
        EmuError::Malformed(what.into())
    }
}
