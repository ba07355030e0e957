pub mod accounts;
pub mod campaigns;
pub mod payments;
pub mod repayments;
