//! Guest-into-user cart merge.

use shopfront_core::CartItem;

/// What a merge changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Guest lines whose key already existed in the user cart.
    pub summed: usize,
    /// Guest lines appended to the user cart.
    pub inserted: usize,
}

/// Merge `guest` lines into `user`.
///
/// A line whose key already exists in `user` adds its quantity to the
/// existing line (it does not take the max or overwrite); other lines are
/// appended in guest order. The user line keeps its own price snapshot and
/// display fields. Keys stay unique.
pub fn merge_into(user: &mut Vec<CartItem>, guest: Vec<CartItem>) -> MergeSummary {
    let mut summary = MergeSummary::default();

    for item in guest {
        if let Some(existing) = user.iter_mut().find(|u| u.key == item.key) {
            existing.quantity = existing.quantity.saturating_add(item.quantity);
            summary.summed += 1;
        } else {
            user.push(item);
            summary.inserted += 1;
        }
    }

    summary
}
