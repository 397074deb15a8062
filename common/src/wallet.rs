use serde::{Deserialize, Serialize};

use crate::order::{EscrowParty, Order, OrderStatus};

/// A single wallet transaction (credit or debit) in the user's history.
///
/// The current service never returns any; the list exists so the user
/// projection keeps its shape when the backend grows a ledger.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: String,
    pub kind: TransactionKind,
    pub amount: f64,
    pub description: String,
    pub timestamp: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    Credit,
    Debit,
}

/// Spendable and held funds for one user.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WalletSnapshot {
    pub balance: f64,
    pub escrow_held: f64,
    #[serde(default)]
    pub transactions: Vec<WalletTransaction>,
}

/// Rejections from wallet operations. Insufficient balance is the only
/// domain failure this layer models.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum WalletError {
    InsufficientBalance { available: f64, requested: f64 },
}

impl std::fmt::Display for WalletError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientBalance {
                available,
                requested,
            } => write!(
                f,
                "insufficient balance: have {available}, need {requested}"
            ),
        }
    }
}

/// Everything an escrow funding call must write, computed up front so the
/// two wallet fields and the order status move together or not at all.
#[derive(Debug, Clone, PartialEq)]
pub struct FundingPlan {
    pub amount: f64,
    pub balance_after: f64,
    pub escrow_held_after: f64,
    /// Status to (re-)issue after the wallet write: the completion
    /// transition when the counterpart already funded, otherwise a
    /// re-assertion of `AwaitingEscrow`.
    pub next_status: OrderStatus,
}

/// Assess an escrow funding request for one party.
///
/// Returns `Ok(None)` when the party's escrow flag is already set: the call
/// is an idempotent no-op and the wallet must not be charged a second time.
/// Returns `Err(InsufficientBalance)` when the balance cannot cover the
/// amount owed; nothing may be mutated in that case.
pub fn plan_escrow_funding(
    order: &Order,
    party: EscrowParty,
    wallet: &WalletSnapshot,
) -> Result<Option<FundingPlan>, WalletError> {
    if party.already_funded(order) {
        return Ok(None);
    }
    let amount = party.amount_due(order);
    if wallet.balance < amount {
        return Err(WalletError::InsufficientBalance {
            available: wallet.balance,
            requested: amount,
        });
    }
    let next_status = if party.counterpart_funded(order) {
        OrderStatus::ReadyForPickup
    } else {
        OrderStatus::AwaitingEscrow
    };
    Ok(Some(FundingPlan {
        amount,
        balance_after: wallet.balance - amount,
        escrow_held_after: wallet.escrow_held + amount,
        next_status,
    }))
}
