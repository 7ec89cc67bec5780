//! The error taxonomy of the template processor.
//!
//! Every user-facing error carries the `(file, line)` pair it was raised
//! from, save for infrastructure failures (I/O) and cancellation, which have
//! no single template location to blame.

use std::fmt;
use std::rc::Rc;

/// A source position, resolved from the preprocessor's line table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    pub file: Rc<str>,
    pub line: u32,
}

impl Location {
    pub fn new(file: impl Into<Rc<str>>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Failures while resolving `#include` directives and reading template
/// sources.
#[derive(Debug, thiserror::Error)]
pub enum PreprocessorError {
    #[error("{location}: cannot open included file `{path}`: {source}")]
    MissingInclude {
        path: String,
        location: Location,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{location}: `#include` nests too deeply (possible cycle via `{path}`)")]
    IncludeCycle { path: String, location: Location },
}

/// A malformed template failed to parse.
#[derive(Debug, thiserror::Error)]
#[error("{location}: unexpected `{found}`{near}")]
pub struct ParseError {
    pub location: Location,
    pub found: String,
    /// Extra positional context, already formatted as e.g. " near `...`" or
    /// empty when there is none to add.
    pub near: String,
}

/// Every way a template can fail at runtime, plus the two failure families
/// above. The interpreter's entry point returns this type; per the
/// propagation policy, nothing inside the interpreter catches it.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error(transparent)]
    Preprocessor(#[from] PreprocessorError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("{location}: undefined type `{name}`")]
    UndefinedType { name: String, location: Location },

    #[error("{location}: undefined variable `{name}`")]
    UndefinedVariable { name: String, location: Location },

    #[error("{location}: undefined function `{name}`")]
    UndefinedFunction { name: String, location: Location },

    #[error("{location}: struct `{struct_name}` has no member `{member}`")]
    UndefinedMember {
        struct_name: String,
        member: String,
        location: Location,
    },

    #[error("{location}: `{name}` is already defined")]
    RedefinedVariable { name: String, location: Location },

    #[error("{location}: function `{name}` is already defined")]
    RedefinedFunction { name: String, location: Location },

    #[error("{location}: type `{name}` is already defined")]
    RedefinedType { name: String, location: Location },

    #[error("{location}: type mismatch: {message}")]
    TypeMismatch { message: String, location: Location },

    #[error("{location}: index {index} is out of range for an array of length {length}")]
    OutOfRangeIndex {
        index: i64,
        length: usize,
        location: Location,
    },

    #[error("{location}: variables cannot be declared inside a function body")]
    GlobalInFunctionBody { location: Location },

    #[error("{location}: function `{name}` must return a value of type `{ret_type}`")]
    MissingReturn {
        name: String,
        ret_type: String,
        location: Location,
    },

    #[error("{location}: `return` used outside of a function")]
    ReturnOutsideFunction { location: Location },

    #[error("{location}: `break` used outside of a loop or switch")]
    BreakOutsideLoop { location: Location },

    #[error("{location}: `continue` used outside of a loop")]
    ContinueOutsideLoop { location: Location },

    #[error("{location}: division by zero")]
    DivisionByZero { location: Location },

    #[error("{location}: cannot assign to a constant value")]
    AssignmentToConstant { location: Location },

    #[error("{location}: cannot assign to a file-backed variable")]
    AssignmentToFileVariable { location: Location },

    #[error("{location}: read past the end of the buffer")]
    EndOfBuffer { location: Location },

    #[error("{location}: recursion limit ({limit}) exceeded instantiating `{what}`")]
    RecursionLimit {
        what: String,
        limit: usize,
        location: Location,
    },

    #[error("template execution was cancelled")]
    TemplateAborted,

    #[error("internal error: {message}")]
    InternalError { message: String },
}

pub type Result<T> = std::result::Result<T, TemplateError>;
