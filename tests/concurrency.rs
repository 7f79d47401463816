//! Concurrent access to the subscription manager.

use eventing_core::{
    EndStatus, EndpointReference, FileStore, NotificationSink, SubscribeRequest,
    SubscriptionManager, SubscriptionStore, Ticket, TicketId,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;

#[derive(Default)]
struct CountingSink {
    notices: Mutex<HashMap<TicketId, usize>>,
}

impl NotificationSink for CountingSink {
    fn notify_ended(&self, ticket: &Ticket, _reason: &str, _status: EndStatus) {
        *self.notices.lock().entry(ticket.id).or_default() += 1;
    }
}

fn push_with_end_to() -> SubscribeRequest {
    SubscribeRequest::push(EndpointReference::new("http://client.example/events"))
        .end_to(EndpointReference::new("http://client.example/ended"))
}

#[test]
fn test_concurrent_subscribe_ids_are_unique() {
    let sink = Arc::new(CountingSink::default());
    let manager = SubscriptionManager::in_memory(sink);
    let threads = 8;
    let per_thread = 250;

    let ids: Vec<TicketId> = thread::scope(|s| {
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                s.spawn(|| {
                    (0..per_thread)
                        .map(|_| manager.subscribe(push_with_end_to()).unwrap().0.id)
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect()
    });

    let unique: HashSet<_> = ids.iter().collect();
    assert_eq!(unique.len(), threads * per_thread);
    assert_eq!(manager.ticket_count(), threads * per_thread);
}

#[test]
fn test_end_races_unsubscribe() {
    let sink = Arc::new(CountingSink::default());
    let manager = SubscriptionManager::in_memory(sink.clone());
    let rounds = 200;

    let mut ended_count = 0;
    for _ in 0..rounds {
        let (ticket, _) = manager.subscribe(push_with_end_to()).unwrap();
        let barrier = Barrier::new(2);

        let (ended, unsubscribed) = thread::scope(|s| {
            let ender = s.spawn(|| {
                barrier.wait();
                manager.end(&ticket.id, "source cancelling", EndStatus::SourceCancelling)
            });
            let unsubscriber = s.spawn(|| {
                barrier.wait();
                manager.unsubscribe(&ticket.id)
            });
            (ender.join().unwrap(), unsubscriber.join().unwrap())
        });

        // Exactly one side observed the ticket.
        assert!(ended ^ unsubscribed);
        assert!(manager.find_ticket(&ticket.id).is_none());

        let notices = sink.notices.lock().get(&ticket.id).copied().unwrap_or(0);
        assert_eq!(notices, usize::from(ended));
        ended_count += usize::from(ended);
    }

    let total: usize = sink.notices.lock().values().sum();
    assert_eq!(total, ended_count);
}

#[test]
fn test_concurrent_ends_notify_once() {
    let sink = Arc::new(CountingSink::default());
    let manager = SubscriptionManager::in_memory(sink.clone());
    let (ticket, _) = manager.subscribe(push_with_end_to()).unwrap();
    let barrier = Barrier::new(4);

    let winners: usize = thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    manager.end(&ticket.id, "delivery failed", EndStatus::DeliveryFailure)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| usize::from(h.join().unwrap()))
            .sum()
    });

    assert_eq!(winners, 1);
    assert_eq!(sink.notices.lock().get(&ticket.id), Some(&1));
}

#[test]
fn test_concurrent_renewals_all_apply() {
    let sink = Arc::new(CountingSink::default());
    let manager = SubscriptionManager::in_memory(sink);
    let (ticket, _) = manager
        .subscribe(push_with_end_to().expires("2040-01-01T00:00:00Z", false))
        .unwrap();

    thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| {
                for _ in 0..50 {
                    manager.renew(&ticket.id, "PT1M").unwrap();
                }
            });
        }
    });

    // 400 one-minute renewals, none lost.
    let expires_at = manager.find_ticket(&ticket.id).unwrap().expires_at;
    assert_eq!(expires_at.to_rfc3339(), "2040-01-01T06:40:00+00:00");
}

#[test]
fn test_shutdown_during_subscribe_traffic() {
    let sink = Arc::new(CountingSink::default());
    let manager = SubscriptionManager::in_memory(sink.clone());

    let ended = thread::scope(|s| {
        let producer = s.spawn(|| {
            for _ in 0..500 {
                manager.subscribe(push_with_end_to()).unwrap();
            }
        });
        let ended = manager.shutdown("stopping");
        producer.join().unwrap();
        ended
    });

    // Everything ended got exactly one notice; the rest are still live.
    let notices = sink.notices.lock();
    assert_eq!(notices.len(), ended);
    assert!(notices.values().all(|&n| n == 1));
    assert_eq!(manager.ticket_count() + ended, 500);
}

#[test]
fn test_concurrent_flushes_then_reopen() {
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(CountingSink::default());
    let manager = SubscriptionManager::new(FileStore::open(dir.path()).unwrap(), sink);
    for _ in 0..200 {
        manager.subscribe(push_with_end_to()).unwrap();
    }

    let failures: usize = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                s.spawn(|| {
                    (0..50)
                        .filter(|_| manager.flush().is_err())
                        .count()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).sum()
    });
    assert_eq!(failures, 0);

    let expected: HashSet<_> = manager.list_tickets().into_iter().map(|t| t.id).collect();
    drop(manager);

    let store = FileStore::open(dir.path()).unwrap();
    assert_eq!(store.len(), 200);
    let restored: HashSet<_> = store.list_all().into_iter().map(|t| t.id).collect();
    assert_eq!(restored, expected);
    assert!(!dir.path().join("tickets.bin.tmp").exists());
}
