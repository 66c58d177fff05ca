//! Reconciliation stays correct when the read cache holds an old row.

use std::sync::Arc;
use std::time::Duration;

use billing_reconciler::adapters::cache::{external_key, CachedSubscriptionStore, InMemoryCache};
use billing_reconciler::adapters::events::InMemoryEventBus;
use billing_reconciler::adapters::memory::InMemorySubscriptionStore;
use billing_reconciler::application::{
    ReconcileSubscriptionCommand, ReconcileSubscriptionHandler, ReconcileSubscriptionResult,
};
use billing_reconciler::domain::foundation::{Timestamp, UserId};
use billing_reconciler::domain::subscription::{
    ReconciliationCommand, Subscription, SubscriptionStatus,
};
use billing_reconciler::ports::{SubscriptionStore, UpdateOutcome};

// ════════════════════════════════════════════════════════════════════════════════
// Test Infrastructure
// ════════════════════════════════════════════════════════════════════════════════

struct Fixture {
    backing: Arc<InMemorySubscriptionStore>,
    cache: Arc<InMemoryCache>,
    store: Arc<CachedSubscriptionStore>,
    reconciler: ReconcileSubscriptionHandler,
}

fn fixture() -> Fixture {
    let backing = Arc::new(InMemorySubscriptionStore::new());
    let cache = Arc::new(InMemoryCache::new());
    let store = Arc::new(CachedSubscriptionStore::new(
        backing.clone(),
        cache.clone(),
        Duration::from_secs(900),
    ));
    let reconciler =
        ReconcileSubscriptionHandler::new(store.clone(), Arc::new(InMemoryEventBus::new()));
    Fixture {
        backing,
        cache,
        store,
        reconciler,
    }
}

fn seed(backing: &InMemorySubscriptionStore, status: SubscriptionStatus) -> Subscription {
    let mut sub = Subscription::new_pending(
        UserId::new("user-1").unwrap(),
        "sub_1",
        "price_1",
        None,
        Timestamp::now(),
    );
    sub.status = status;
    backing.seed(sub.clone());
    sub
}

fn to(status: SubscriptionStatus) -> ReconcileSubscriptionCommand {
    ReconcileSubscriptionCommand {
        instruction: ReconciliationCommand::new("sub_1", status),
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn update_missed_by_cache_outage_does_not_hide_later_events() {
    let f = fixture();
    let sub = seed(&f.backing, SubscriptionStatus::Active);
    f.store.find_by_external_id("sub_1").await.unwrap();

    f.cache.set_unavailable(true);
    f.reconciler.handle(to(SubscriptionStatus::PastDue)).await.unwrap();
    f.cache.set_unavailable(false);
    let result = f.reconciler.handle(to(SubscriptionStatus::Active)).await.unwrap();

    assert!(matches!(result, ReconcileSubscriptionResult::Applied { .. }));
    assert_eq!(f.backing.get(&sub.id).unwrap().status, SubscriptionStatus::Active);
}

#[tokio::test]
async fn late_read_through_does_not_hide_later_events() {
    let f = fixture();
    let v1 = seed(&f.backing, SubscriptionStatus::Active);
    let mut past_due = v1.clone();
    past_due.status = SubscriptionStatus::PastDue;
    assert!(matches!(
        f.backing.update(&past_due, v1.version).await.unwrap(),
        UpdateOutcome::Updated(_)
    ));
    // a reader that loaded v1 before the write puts it in the cache afterwards
    f.cache
        .insert_raw(&external_key("sub_1"), &serde_json::to_string(&v1).unwrap());

    let result = f.reconciler.handle(to(SubscriptionStatus::Active)).await.unwrap();

    assert!(matches!(result, ReconcileSubscriptionResult::Applied { .. }));
    assert_eq!(f.backing.get(&v1.id).unwrap().status, SubscriptionStatus::Active);
}

#[tokio::test]
async fn refreshed_entry_reflects_the_reconciled_row() {
    let f = fixture();
    seed(&f.backing, SubscriptionStatus::Active);
    f.store.find_by_external_id("sub_1").await.unwrap();

    f.reconciler.handle(to(SubscriptionStatus::PastDue)).await.unwrap();

    let cached = f.store.find_by_external_id("sub_1").await.unwrap().unwrap();
    assert_eq!(cached.status, SubscriptionStatus::PastDue);
    assert_eq!(cached.version, 2);
}
