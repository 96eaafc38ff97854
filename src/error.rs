use thiserror::Error;

/// Builder misuse, reported when a selector is built.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ConfigError {
    #[error("selector `{selector}` needs a stopping strategy: set a step limit or share a context that has one")]
    MissingStoppingStrategy { selector: &'static str },

    #[error("interleaved selector needs at least one member")]
    EmptyInterleaving,
}
