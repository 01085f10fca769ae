pub mod error;
pub mod period;
pub mod result;
pub mod review;
pub mod rule;
pub mod transaction;

pub use error::{DateRangeError, MatchError, PartitionError};
pub use period::DateRange;
pub use result::{MatchSuggestion, MatchingResult, ResultSummary};
pub use review::ReviewSession;
pub use rule::{MatchingRule, RuleConditions, ValueRange};
pub use transaction::{days_between, BankTransaction, Category, Direction, SystemTransaction};
