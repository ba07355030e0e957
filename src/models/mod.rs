pub mod account;
pub mod campaign;
pub mod loan;
pub mod payment;
pub mod repayment;
