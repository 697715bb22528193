// Interpreter plugins: the capability contract, the built-in languages and
// the startup-time registry

pub mod python;
pub mod registry;
pub mod shell;
pub mod sql;
pub mod traits;

pub use python::PythonInterpreter;
pub use registry::{BuiltinLanguage, InterpreterRegistry, RegistryBuilder};
pub use shell::ShellInterpreter;
pub use sql::{OracleInterpreter, PostgresInterpreter};
pub use traits::{Command, Interpreter};
