use models::{CanonicalLedgerEntry, LedgerDraft};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Content tuple used for entries without a natural id.
///
/// Amounts are rendered at fixed precision so float noise below 1e-8 does not
/// change the key between ingestions.
pub fn content_signature(draft: &LedgerDraft) -> String {
    format!(
        "{}|{}|{}|{}|{:.8}|{:.8}|{:.8}",
        draft.exchange.tag(),
        draft.market_type.as_str(),
        draft.symbol,
        draft.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        draft.net_pnl,
        draft.fees,
        draft.funding
    )
}

/// Key for a single draft.
///
/// `occurrence` is the number of earlier drafts in the same batch that share the
/// exact content signature; it is ignored when the source supplied a natural id.
pub fn derive_key(draft: &LedgerDraft, occurrence: usize) -> String {
    let exchange = draft.exchange.tag();
    if let Some(id) = &draft.natural_id {
        return format!("{}|{}", exchange, id);
    }
    let h = make_hash_id(&format!("{}|{}", content_signature(draft), occurrence));
    format!("{}|h-{}", exchange, &h[..24])
}

/// Assigns keys to a whole batch, in source order.
///
/// Re-running this over the identical batch yields identical keys, and two
/// rows with the same content tuple get distinct keys.
pub fn derive_keys(drafts: Vec<LedgerDraft>) -> Vec<CanonicalLedgerEntry> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    drafts
        .into_iter()
        .map(|draft| {
            let occurrence = if draft.natural_id.is_some() {
                0
            } else {
                let counter = seen.entry(content_signature(&draft)).or_insert(0);
                let n = *counter;
                *counter += 1;
                n
            };
            let key = derive_key(&draft, occurrence);
            draft.into_entry(key)
        })
        .collect()
}

pub fn make_hash_id(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    let hash = hasher.finalize();
    hex::encode(hash)
}
