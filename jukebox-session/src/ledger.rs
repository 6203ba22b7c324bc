//! Credit ledger
//!
//! Single source of truth for the spendable balance. The balance is a
//! `u32` and therefore never negative by construction; every failed
//! operation leaves it untouched. Private to the session controller's
//! single-writer loop, so no interior locking is needed.

use jukebox_common::{Error, Result};
use tracing::{info, warn};

/// In-memory credit balance with atomic add/deduct/set semantics
///
/// Every deduct is paired 1:1 with either a successful admission or an
/// equal-amount refund; the admission controller enforces the pairing.
#[derive(Debug)]
pub struct CreditLedger {
    balance: u32,
}

impl CreditLedger {
    pub fn new(initial_credits: u32) -> Self {
        info!("Credit ledger initialized with {} credits", initial_credits);
        Self {
            balance: initial_credits,
        }
    }

    /// Add credits; requires a positive amount
    pub fn add(&mut self, amount: u32) -> Result<u32> {
        if amount == 0 {
            warn!("Invalid amount to add: {}", amount);
            return Err(Error::InvalidAmount(amount as i64));
        }
        self.balance = self.balance.saturating_add(amount);
        info!("Added {} credits, new balance: {}", amount, self.balance);
        Ok(self.balance)
    }

    /// Deduct credits; requires a positive amount covered by the balance
    pub fn deduct(&mut self, amount: u32) -> Result<u32> {
        if amount == 0 {
            warn!("Invalid amount to deduct: {}", amount);
            return Err(Error::InvalidAmount(amount as i64));
        }
        if self.balance < amount {
            warn!(
                "Insufficient credits: balance {}, tried to deduct {}",
                self.balance, amount
            );
            return Err(Error::InsufficientCredits {
                need: amount,
                have: self.balance,
            });
        }
        self.balance -= amount;
        info!("Deducted {} credits, new balance: {}", amount, self.balance);
        Ok(self.balance)
    }

    /// Administrative override; overwrites the balance unconditionally
    pub fn set_balance(&mut self, amount: u32) {
        self.balance = amount;
        info!("Balance set to {}", self.balance);
    }

    pub fn balance(&self) -> u32 {
        self.balance
    }

    pub fn can_afford(&self, cost: u32) -> bool {
        self.balance >= cost
    }
}
