use derive_more::Display;

/// Which shuffling an epoch's committees are drawn from.
///
/// Epoch processing only ever looks at committees of the previous and current epochs.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Display)]
pub enum RelativeEpoch {
    #[display("previous")]
    Previous,
    #[display("current")]
    Current,
}
