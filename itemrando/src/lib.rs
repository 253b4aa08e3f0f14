pub mod error;
pub mod fill;
pub mod pool;
pub mod randomize;
pub mod selection;
pub mod settings;

pub use error::{FillError, FillResult};
pub use fill::{FillEngine, FillPhase, PlacementEvent, PlacementKind, StepResult};
pub use randomize::{Randomization, Randomizer};
