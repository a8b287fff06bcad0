use std::sync::Arc;

use hashbrown::HashMap;
use tokio::sync::{Mutex, RwLock};

/// A single player's balance. Internal lock serializes every
/// read-modify-write, per spec §5's shared-resource policy.
#[derive(Debug)]
pub struct Account {
    balance: Mutex<u32>,
}

impl Account {
    fn new() -> Account {
        Account {
            balance: Mutex::new(0),
        }
    }

    pub async fn balance(&self) -> u32 {
        *self.balance.lock().await
    }

    /// Applies a signed delta to the balance. Over/underflow past the
    /// `u32` range is a silent no-op — the balance is left unchanged
    /// and the pre-adjustment value is returned, satisfying P3.
    pub async fn adjust(&self, delta: i32) -> u32 {
        let mut balance = self.balance.lock().await;
        let adjusted = i64::from(*balance) + i64::from(delta);
        if adjusted >= 0 && adjusted <= i64::from(u32::MAX) {
            *balance = adjusted as u32;
        }
        *balance
    }

    /// Attempts to debit `amount`; returns whether it succeeded. Used
    /// for bets and double-downs, where insufficient funds must leave
    /// the balance untouched rather than clamp.
    pub async fn debit(&self, amount: u32) -> bool {
        let mut balance = self.balance.lock().await;
        if *balance >= amount {
            *balance -= amount;
            true
        } else {
            false
        }
    }

    /// Like `adjust`, an overflow past `u32::MAX` is a silent no-op
    /// rather than a clamp — the same invariant applies whether the
    /// balance moves via `UpdateBalance` or a table payout (spec §3).
    pub async fn credit(&self, amount: u32) {
        if amount == 0 {
            return;
        }
        let mut balance = self.balance.lock().await;
        if let Some(sum) = balance.checked_add(amount) {
            *balance = sum;
        }
    }
}

/// Process-wide username -> Account map. Accounts are created lazily
/// on first successful authentication and live for the process
/// lifetime (spec §3).
#[derive(Debug, Default)]
pub struct AccountRegistry {
    accounts: RwLock<HashMap<String, Arc<Account>>>,
}

impl AccountRegistry {
    pub fn new() -> AccountRegistry {
        AccountRegistry {
            accounts: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get_or_create(&self, username: &str) -> Arc<Account> {
        if let Some(account) = self.accounts.read().await.get(username) {
            return Arc::clone(account);
        }
        let mut accounts = self.accounts.write().await;
        Arc::clone(
            accounts
                .entry(username.to_string())
                .or_insert_with(|| Arc::new(Account::new())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn adjust_clamps_on_overflow() {
        let account = Account::new();
        assert_eq!(account.adjust(i32::MAX).await, i32::MAX as u32);
        // adding i32::MAX again would overflow u32::MAX: rejected, unchanged
        let before = account.balance().await;
        assert_eq!(account.adjust(i32::MAX).await, before);
    }

    #[tokio::test]
    async fn credit_rejects_overflow_past_u32_max() {
        let account = Account::new();
        account.credit(u32::MAX).await;
        assert_eq!(account.balance().await, u32::MAX);
        // a second credit would overflow u32::MAX: rejected, unchanged
        account.credit(1).await;
        assert_eq!(account.balance().await, u32::MAX);
    }

    #[tokio::test]
    async fn adjust_rejects_underflow_below_zero() {
        let account = Account::new();
        assert_eq!(account.adjust(-1).await, 0);
    }

    #[tokio::test]
    async fn bet_then_winnings_has_no_double_deduction() {
        let account = Account::new();
        account.adjust(1000).await;
        assert!(account.debit(50).await);
        assert_eq!(account.balance().await, 950);
        account.credit(75).await;
        assert_eq!(account.balance().await, 1025);
    }

    #[tokio::test]
    async fn debit_fails_without_mutating_balance_when_insufficient() {
        let account = Account::new();
        account.adjust(10).await;
        assert!(!account.debit(50).await);
        assert_eq!(account.balance().await, 10);
    }

    #[tokio::test]
    async fn registry_reuses_existing_account() {
        let registry = AccountRegistry::new();
        let a = registry.get_or_create("foo").await;
        a.adjust(500).await;
        let b = registry.get_or_create("foo").await;
        assert_eq!(b.balance().await, 500);
    }
}
