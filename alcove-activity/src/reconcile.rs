// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

#![forbid(unsafe_code)]

use std::collections::HashMap;

use crate::meta::{
    ActivityEntry, Amount, MetaType, NativeCurrency, TransactionCategory, TransactionMeta,
    TransactionStatus, TransferType,
};

/// Reconciles raw pending and confirmed transaction sequences into the
/// display-ready activity feed.
///
/// Input order is preserved (pending first, then confirmed); replacement
/// lookups cross the pending/confirmed boundary. The pass is pure and
/// fail-open: malformed or partially-missing input never panics, and an
/// unresolved `replaced_by` keeps the original unchanged.
pub fn reconcile(
    pending: &[TransactionMeta],
    confirmed: &[TransactionMeta],
    native: &NativeCurrency,
) -> Vec<ActivityEntry> {
    // Index the whole working set up front so replacement resolution stays
    // a constant-time lookup per candidate.
    let index: HashMap<&str, &TransactionMeta> = pending
        .iter()
        .chain(confirmed)
        .map(|meta| (meta.id.as_str(), meta))
        .collect();

    let mut entries: Vec<ActivityEntry> = pending
        .iter()
        .chain(confirmed)
        .filter_map(|meta| project(meta, &index, native))
        .collect();

    flag_queued_transactions(&mut entries);
    entries
}

fn project(
    meta: &TransactionMeta,
    index: &HashMap<&str, &TransactionMeta>,
    native: &NativeCurrency,
) -> Option<ActivityEntry> {
    if is_incoming_dust(meta) {
        return None;
    }

    let mut meta = meta.clone();
    if meta.transfer_type.is_none() {
        // Plain native-currency send; synthesize display data from the
        // active network.
        meta.transfer_type = Some(TransferType {
            amount: meta.transaction_params.value.unwrap_or_default(),
            currency: native.symbol.clone(),
            decimals: native.decimals,
            logo: native.logo.clone(),
        });
    }

    let mut force_drop = false;
    match meta.meta_type {
        // Satellite record of a cancellation; the original carries the
        // user-visible entry.
        MetaType::Cancel => return None,

        MetaType::SpeedUp => {
            // A fee bump only becomes the canonical visible record once it
            // lands; until then (or if it dies) the original represents the
            // operation.
            if meta.status == TransactionStatus::Submitted || meta.status.is_terminal_failure() {
                return None;
            }
        }

        MetaType::RegularSpeedingUp => {
            if let Some(replacement) = resolve_replacement(&meta, index) {
                match replacement.status {
                    TransactionStatus::Submitted => {
                        if let Some(hash) = replacement.transaction_params.hash.clone() {
                            meta.transaction_params.hash = Some(hash);
                        }
                    }
                    TransactionStatus::Confirmed => return None,
                    status if status.is_terminal_failure() => {
                        // The bump died; the original is live again but its
                        // displayed hash no longer references anything.
                        meta.transaction_params.hash = None;
                    }
                    // Replacement not yet broadcast (e.g. UNAPPROVED); leave
                    // the original untouched.
                    _ => {}
                }
            }
        }

        MetaType::RegularCancelling => {
            if let Some(cancel) = resolve_replacement(&meta, index) {
                let cancel_failed = cancel.status.is_terminal_failure();
                if cancel_failed && meta.status.is_terminal_failure() {
                    // Both settlement attempts for this nonce dead-ended.
                    meta.transaction_params.hash = None;
                    force_drop = true;
                } else if !cancel_failed {
                    if let Some(hash) = cancel.transaction_params.hash.clone() {
                        meta.transaction_params.hash = Some(hash);
                    }
                }
            }
        }

        MetaType::Regular => {}
    }

    Some(ActivityEntry {
        meta,
        force_drop,
        queued: false,
    })
}

/// Zero-value incoming records are dust/probe noise and never shown.
fn is_incoming_dust(meta: &TransactionMeta) -> bool {
    meta.transaction_category == Some(TransactionCategory::Incoming)
        && meta.transaction_params.value.is_some_and(Amount::is_zero)
}

fn resolve_replacement<'a>(
    meta: &TransactionMeta,
    index: &HashMap<&str, &'a TransactionMeta>,
) -> Option<&'a TransactionMeta> {
    meta.replaced_by
        .as_deref()
        .and_then(|id| index.get(id).copied())
}

/// Marks entries whose nonce sits behind a lower still-submitted nonce on
/// the same account as queued rather than pending.
///
/// Addresses are compared case-insensitively. Entries without an account or
/// nonce are never flagged.
pub fn flag_queued_transactions(entries: &mut [ActivityEntry]) {
    let mut lowest_submitted: HashMap<String, u64> = HashMap::new();
    for entry in entries.iter() {
        let Some((account, nonce)) = submitted_account_nonce(entry) else {
            continue;
        };
        lowest_submitted
            .entry(account)
            .and_modify(|lowest| *lowest = (*lowest).min(nonce))
            .or_insert(nonce);
    }

    for entry in entries.iter_mut() {
        let Some((account, nonce)) = submitted_account_nonce(entry) else {
            continue;
        };
        if lowest_submitted
            .get(&account)
            .is_some_and(|lowest| nonce > *lowest)
        {
            entry.queued = true;
        }
    }
}

fn submitted_account_nonce(entry: &ActivityEntry) -> Option<(String, u64)> {
    if entry.meta.status != TransactionStatus::Submitted {
        return None;
    }
    let from = entry.meta.transaction_params.from.as_deref()?;
    let nonce = entry.meta.transaction_params.nonce?;
    Some((from.to_ascii_lowercase(), nonce))
}
