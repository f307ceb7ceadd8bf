//! CompileJobUseCase: layers in, scrambled program bytes out.
//!
//! The whole program is built and validated before any byte is returned, so
//! a failed compile never leaves a partial file behind.

use laser_core::{CompileError, Compiler, CompilerSettings, Layer, Program};
use tracing::info;

/// A compiled job ready to be written or sent.
#[derive(Debug, Clone)]
pub struct CompiledJob {
    pub program: Program,
    pub wire: Vec<u8>,
}

/// Compiles `layers` with `settings`.
///
/// # Errors
///
/// Returns the [`CompileError`] of the compiler; nothing is produced.
pub fn compile_job(layers: &[Layer], settings: CompilerSettings) -> Result<CompiledJob, CompileError> {
    let program = Compiler::new(settings).compile(layers)?;
    let wire = program.to_wire()?;
    info!(
        layers = layers.len(),
        pieces = layers.iter().map(|l| l.pieces.len()).sum::<usize>(),
        bytes = wire.len(),
        "job compiled"
    );
    Ok(CompiledJob { program, wire })
}
