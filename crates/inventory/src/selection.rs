//! Candidate selection for a reservation request (pure; no locking).

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use stockhold_core::AccountId;

use crate::item::InventoryItem;

/// How the matcher chooses among eligible items.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Uniformly random across every eligible item.
    #[default]
    Random,
    /// Restricted to one seller's catalog (random within it).
    SellerCatalog { seller: AccountId },
}

impl SelectionPolicy {
    /// Seller restriction in effect, with a request-level selector taking precedence.
    pub fn effective_seller<'a>(&'a self, requested: Option<&'a AccountId>) -> Option<&'a AccountId> {
        match (requested, self) {
            (Some(seller), _) => Some(seller),
            (None, SelectionPolicy::SellerCatalog { seller }) => Some(seller),
            (None, SelectionPolicy::Random) => None,
        }
    }
}

/// Eligible items (idle + on sale), optionally restricted to one seller.
///
/// Sorted by id so a seeded RNG yields reproducible picks.
pub fn eligible<'a, I>(items: I, seller: Option<&AccountId>) -> Vec<&'a InventoryItem>
where
    I: IntoIterator<Item = &'a InventoryItem>,
{
    let mut out: Vec<&InventoryItem> = items
        .into_iter()
        .filter(|item| item.is_eligible())
        .filter(|item| seller.is_none_or(|s| item.account_id() == s))
        .collect();
    out.sort_by(|a, b| a.id_typed().cmp(b.id_typed()));
    out
}

/// Pick one eligible item according to `policy` (or the request's seller override).
pub fn select<'a, I, R>(
    items: I,
    policy: &SelectionPolicy,
    requested_seller: Option<&AccountId>,
    rng: &mut R,
) -> Option<&'a InventoryItem>
where
    I: IntoIterator<Item = &'a InventoryItem>,
    R: Rng + ?Sized,
{
    let seller = policy.effective_seller(requested_seller);
    eligible(items, seller).choose(rng).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{CatalogEntry, ListingStatus};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use stockhold_core::{ItemId, LockTicket, Money};

    fn item(id: &str, seller: &str, listing: ListingStatus) -> InventoryItem {
        InventoryItem::from_catalog(CatalogEntry {
            id: ItemId::new(id),
            account_id: AccountId::new(seller),
            title: String::new(),
            price: Money::from_minor(100),
            listing,
        })
    }

    #[test]
    fn skips_occupied_and_unlisted_items() {
        let mut busy = item("A", "s1", ListingStatus::OnSale);
        busy.occupy(LockTicket::new(), 0).unwrap();
        let items = vec![
            busy,
            item("B", "s1", ListingStatus::OffShelf),
            item("C", "s1", ListingStatus::OnSale),
        ];

        let ids: Vec<_> = eligible(&items, None).iter().map(|i| i.id_typed().as_str()).collect();
        assert_eq!(ids, vec!["C"]);
    }

    #[test]
    fn seller_policy_restricts_catalog() {
        let items = vec![
            item("A", "s1", ListingStatus::OnSale),
            item("B", "s2", ListingStatus::OnSale),
        ];
        let policy = SelectionPolicy::SellerCatalog {
            seller: AccountId::new("s2"),
        };
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..10 {
            let picked = select(&items, &policy, None, &mut rng).unwrap();
            assert_eq!(picked.id_typed().as_str(), "B");
        }
    }

    #[test]
    fn request_seller_overrides_policy() {
        let items = vec![
            item("A", "s1", ListingStatus::OnSale),
            item("B", "s2", ListingStatus::OnSale),
        ];
        let policy = SelectionPolicy::SellerCatalog {
            seller: AccountId::new("s2"),
        };
        let requested = AccountId::new("s1");
        let mut rng = StdRng::seed_from_u64(7);

        let picked = select(&items, &policy, Some(&requested), &mut rng).unwrap();
        assert_eq!(picked.id_typed().as_str(), "A");
    }

    #[test]
    fn empty_pool_selects_nothing() {
        let items: Vec<InventoryItem> = Vec::new();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(select(&items, &SelectionPolicy::Random, None, &mut rng).is_none());
    }

    #[test]
    fn random_policy_reaches_every_candidate() {
        let items = vec![
            item("A", "s1", ListingStatus::OnSale),
            item("B", "s2", ListingStatus::OnSale),
            item("C", "s3", ListingStatus::OnSale),
        ];
        let mut rng = StdRng::seed_from_u64(42);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            let picked = select(&items, &SelectionPolicy::Random, None, &mut rng).unwrap();
            seen.insert(picked.id_typed().clone());
        }
        assert_eq!(seen.len(), 3);
    }
}
