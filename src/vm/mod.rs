mod interpreter;
mod frame;
mod interpolate;
mod value;
mod error;
pub mod operators;

pub use interpreter::VM;
pub use frame::Frame;
pub use interpolate::interpolate;
pub use value::{Array, Callable, NativeFunction, Value};
pub use error::{VMError, VMResult};
