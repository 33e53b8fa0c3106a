//! Portfolio snapshot storage port trait.

use crate::domain::error::QuantError;
use crate::domain::portfolio::TargetPortfolio;

pub trait SnapshotPort {
    fn load_latest_snapshot(&self) -> Result<Option<TargetPortfolio>, QuantError>;

    /// Every stored snapshot, ascending by `as_of_date`.
    fn load_all_snapshots_ordered(&self) -> Result<Vec<TargetPortfolio>, QuantError>;

    /// Store `portfolio`, replacing any snapshot with the same `as_of_date`.
    fn save_snapshot(&self, portfolio: &TargetPortfolio) -> Result<(), QuantError>;
}
