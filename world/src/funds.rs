//! City treasury.

use std::collections::BTreeMap;

use civitas_core::FundIssueKind;

/// Treasury balance together with a per-category ledger.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Funds {
    balance: i64,
    ledger: BTreeMap<FundIssueKind, i64>,
}

impl Funds {
    /// Creates a treasury holding `balance` denarii and an empty ledger.
    #[must_use]
    pub fn new(balance: i64) -> Self {
        Self {
            balance,
            ledger: BTreeMap::new(),
        }
    }

    /// Current balance; may be negative when the city is in debt.
    #[must_use]
    pub const fn balance(&self) -> i64 {
        self.balance
    }

    /// Total booked under `kind` since the treasury was created.
    #[must_use]
    pub fn issued(&self, kind: FundIssueKind) -> i64 {
        self.ledger.get(&kind).copied().unwrap_or(0)
    }

    /// Iterates over every ledger category with a booking.
    pub fn ledger(&self) -> impl Iterator<Item = (FundIssueKind, i64)> + '_ {
        self.ledger.iter().map(|(kind, amount)| (*kind, *amount))
    }

    /// Books a signed amount and returns the new balance.
    pub(crate) fn resolve(&mut self, kind: FundIssueKind, amount: i64) -> i64 {
        self.balance = self.balance.saturating_add(amount);
        let entry = self.ledger.entry(kind).or_insert(0);
        *entry = entry.saturating_add(amount);
        self.balance
    }

    pub(crate) fn restore(balance: i64, ledger: BTreeMap<FundIssueKind, i64>) -> Self {
        Self { balance, ledger }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bookings_move_balance_and_ledger() {
        let mut funds = Funds::new(100);

        assert_eq!(funds.resolve(FundIssueKind::Construction, -30), 70);
        assert_eq!(funds.resolve(FundIssueKind::Taxes, 12), 82);
        assert_eq!(funds.resolve(FundIssueKind::Construction, -100), -18);

        assert_eq!(funds.issued(FundIssueKind::Construction), -130);
        assert_eq!(funds.issued(FundIssueKind::Trade), 0);
        assert_eq!(funds.ledger().count(), 2);
    }
}
