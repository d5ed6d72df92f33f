// Pith - Instruction-execution core of a bytecode VM for a PHP-flavoured scripting language

pub mod bytecode;
pub mod vm;
pub mod runtime;
pub mod utils;

pub use bytecode::{Instruction, Program};
pub use vm::{Frame, Value, VM};
pub use runtime::Runtime;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
