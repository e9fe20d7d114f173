use std::fmt;

/// Route registration error
///
/// Returned by [`Router::register`](super::Router::register) and the per-method helpers
/// when a pattern cannot be added to the route table. The table is unchanged when this
/// error is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// Method is not one of GET, POST, PUT, DELETE, PATCH
    UnsupportedMethod {
        /// The rejected method
        method: String,
    },
    /// A pattern segment consists of `:` alone
    EmptyParameterName {
        /// The rejected pattern
        pattern: String,
    },
    /// A different parameter name is already registered at the same tree position
    ///
    /// `/users/:id` and `/users/:name/profile` cannot coexist because both would
    /// capture the second segment under different names.
    ParameterConflict {
        /// The rejected pattern
        pattern: String,
        /// Name already registered at this position
        existing: String,
        /// Name the rejected pattern tried to use
        requested: String,
    },
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteError::UnsupportedMethod { method } => {
                write!(
                    f,
                    "route error: unsupported method '{method}'. \
                    Expected one of GET, POST, PUT, DELETE, PATCH"
                )
            }
            RouteError::EmptyParameterName { pattern } => {
                write!(f, "route error: empty parameter name in pattern '{pattern}'")
            }
            RouteError::ParameterConflict {
                pattern,
                existing,
                requested,
            } => {
                write!(
                    f,
                    "route error: pattern '{pattern}' uses parameter ':{requested}' \
                    where ':{existing}' is already registered"
                )
            }
        }
    }
}

impl std::error::Error for RouteError {}
