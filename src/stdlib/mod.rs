//! Built-in functions available in every Brio program

mod builtins;

pub use builtins::builtins;
