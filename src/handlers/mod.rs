pub(crate) mod accounts;
pub(crate) mod campaigns;
pub(crate) mod payments;
pub(crate) mod repayments;
