//! Campaign accounting.
//!
//! Pure arithmetic and status decisions over campaigns, loans and
//! repayments. Nothing in here touches storage or the network; callers pass
//! in the current time and the business timezone explicitly.

pub mod disbursement;
pub mod money;
pub mod repayment;
pub mod schedule;
pub mod status;

pub use disbursement::{split_disbursement, LenderShare};
pub use repayment::RepaymentPosition;
pub use schedule::MonthlyDueInfo;
pub use status::{CampaignStatus, StatusTransition};
