use thiserror::Error;

pub type Result<T> = std::result::Result<T, BlackboardError>;

/// Error returned by a derived field's compute function.
pub type ComputeError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while reading or writing a board.
#[derive(Debug, Error)]
pub enum BlackboardError {
    /// Derived attributes change only through recomputation.
    #[error("cannot assign derived field `{name}`")]
    ImmutableField { name: String },

    #[error("no attribute named `{name}`")]
    UnknownField { name: String },

    #[error("attribute `{name}` holds `{found}`, not `{expected}`")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("attribute key #{index} does not belong to schema `{schema}`")]
    ForeignAttr { index: usize, schema: String },

    #[error("computing `{field}` failed: {source}")]
    Compute {
        field: String,
        #[source]
        source: ComputeError,
    },

    #[error(transparent)]
    Definition(#[from] DefinitionError),
}

impl BlackboardError {
    /// Name of the attribute the error is about, if any.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::ImmutableField { name }
            | Self::UnknownField { name }
            | Self::TypeMismatch { name, .. } => Some(name.as_str()),
            Self::Compute { field, .. } => Some(field.as_str()),
            Self::ForeignAttr { .. } | Self::Definition(_) => None,
        }
    }
}

/// Errors raised while building a schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("attribute `{name}` is declared twice")]
    DuplicateName { name: String },

    #[error("`{field}` depends on undeclared attribute `{dependency}`")]
    UnknownDependency { field: String, dependency: String },

    #[error("`{field}` depends on a key from another schema")]
    ForeignDependency { field: String },

    #[error("dependency cycle: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },
}

/// Errors raised by [`Inputs`](crate::Inputs) accessors inside a compute function.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("input {index} out of range ({len} inputs)")]
    OutOfRange { index: usize, len: usize },

    #[error("input `{name}` holds `{found}`, not `{expected}`")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("`{name}` is not an input of this field")]
    NotAnInput { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_message_lists_path() {
        let err = DefinitionError::Cycle {
            path: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "dependency cycle: a -> b -> a");
    }

    #[test]
    fn field_accessor() {
        let err = BlackboardError::ImmutableField { name: "c".into() };
        assert_eq!(err.field(), Some("c"));
        assert_eq!(err.to_string(), "cannot assign derived field `c`");

        let err: BlackboardError = DefinitionError::DuplicateName { name: "a".into() }.into();
        assert_eq!(err.field(), None);
    }

    #[test]
    fn compute_error_keeps_source() {
        let err = BlackboardError::Compute {
            field: "ratio".into(),
            source: "division by zero".into(),
        };
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("division by zero"));
    }
}
