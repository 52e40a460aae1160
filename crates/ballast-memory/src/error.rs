use crate::resizer::ResizerUnit;

pub type Result<T> = std::result::Result<T, ResizerError>;

/// Misconfigurations detected while building a resizer tree.
///
/// A tree that fails to build is a programming error in the host's wiring;
/// there is no way to recover a partially built tree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResizerError {
    #[error("resizer `{name}`: fixed capacity must be non-negative, got {capacity}")]
    NegativeCapacity { name: String, capacity: i64 },

    #[error("resizer `{name}`: minimum capacity must be non-negative, got {min_capacity}")]
    NegativeMinCapacity { name: String, min_capacity: i64 },

    #[error(
        "resizer `{name}`: maximum capacity {max_capacity} is below minimum capacity {min_capacity}"
    )]
    MaxBelowMin {
        name: String,
        min_capacity: i64,
        max_capacity: i64,
    },

    #[error("resizer `{name}`: weight must be positive")]
    ZeroWeight { name: String },

    #[error("composite `{name}`: child `{child}` is sized in {found} but the group uses {expected}")]
    MixedUnits {
        name: String,
        child: String,
        expected: ResizerUnit,
        found: ResizerUnit,
    },

    #[error("composite `{name}` has no children")]
    EmptyComposite { name: String },
}
