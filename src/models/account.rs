use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::campaign::money_amount;
use crate::errors::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Founder,
    Lender,
}

/// Anything that holds a wallet balance the platform can move money into
/// or out of.
pub trait BalanceHolder {
    fn balance(&self) -> Decimal;

    fn set_balance(&mut self, balance: Decimal);

    fn credit(&mut self, amount: Decimal) {
        let balance = self.balance() + amount;
        self.set_balance(balance);
    }

    fn debit(&mut self, amount: Decimal) -> Result<()> {
        let available = self.balance();
        if amount > available {
            return Err(AppError::InsufficientBalance {
                required: amount,
                available,
            });
        }
        self.set_balance(available - amount);
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub email: String,
    pub name: String,
    pub account_type: AccountType,
    pub balance: Decimal,
    pub is_approved: bool,
    pub has_defaulted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn new(request: CreateAccount, now: DateTime<Utc>) -> Self {
        Account {
            id: ObjectId::new(),
            email: request.email.trim().to_lowercase(),
            name: request.name,
            account_type: request.account_type,
            balance: Decimal::ZERO,
            // lenders need no review; founders are approved by an admin
            is_approved: request.account_type == AccountType::Lender,
            has_defaulted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Founders lose access once unapproved; lenders always have it.
    pub fn is_accessible(&self) -> bool {
        match self.account_type {
            AccountType::Founder => self.is_approved && !self.has_defaulted,
            AccountType::Lender => true,
        }
    }
}

impl BalanceHolder for Account {
    fn balance(&self) -> Decimal {
        self.balance
    }

    fn set_balance(&mut self, balance: Decimal) {
        self.balance = balance;
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAccount {
    #[validate(email(message = "A valid email is required"))]
    pub email: String,

    #[validate(length(min = 2, max = 100, message = "Name must be between 2 and 100 characters"))]
    pub name: String,

    pub account_type: AccountType,
}

/// Cash-out of a wallet balance.
#[derive(Debug, Deserialize, Validate)]
pub struct Withdraw {
    #[validate(custom(function = "money_amount"))]
    pub amount: Decimal,
}
