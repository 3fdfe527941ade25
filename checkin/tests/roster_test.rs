//! Presence roster feed over real check-ins.
//!
//! Run with: `cargo test --test roster_test`

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use checkin::types::{DeviceId, Namespace, Participant, PaymentStatus};
use checkin::{CheckInService, InMemoryParticipantStore};
use gatecheck_testing::{ManualClock, test_clock};
use gatecheck_core::environment::Clock;
use std::sync::Arc;
use std::time::Duration;

struct Venue {
    service: CheckInService,
    store: InMemoryParticipantStore,
    clock: ManualClock,
}

async fn venue() -> Venue {
    let mut participants = vec![
        Participant::workshop("W1", "Wanda", "Porto", PaymentStatus::Paid),
        Participant::workshop("W2", "Wes", "Braga", PaymentStatus::Pending),
    ];
    participants.extend(
        (1..=6).map(|i| Participant::general(format!("G{i}"), format!("Guest {i}"), "Lisbon")),
    );

    let store = InMemoryParticipantStore::with_participants(participants)
        .await
        .expect("seed participants");
    let clock = ManualClock::starting_at(test_clock().now());
    let service = CheckInService::new(Arc::new(store.clone()), Arc::new(clock.clone()));

    Venue {
        service,
        store,
        clock,
    }
}

impl Venue {
    /// Check the payloads in one minute apart.
    async fn arrive(&self, payloads: &[&str]) {
        let device = DeviceId::new("roster-test");
        for payload in payloads {
            self.clock.advance(Duration::from_secs(60));
            let result = self.service.submit_scan(payload, &device).await.unwrap();
            assert!(result.is_success(), "{payload}: {result:?}");
        }
    }
}

#[tokio::test]
async fn empty_roster_before_anyone_arrives() {
    let venue = venue().await;

    let recent = venue.service.recently_present(None, None).await.unwrap();
    let summary = venue.service.attendance_summary().await.unwrap();

    assert!(recent.is_empty());
    assert_eq!(summary.total, 8);
    assert_eq!(summary.present, 0);
}

#[tokio::test]
async fn most_recent_arrival_comes_first() {
    let venue = venue().await;
    venue
        .arrive(&["GENERAL|G1", "SPH|W1", "GENERAL|G2"])
        .await;

    let recent = venue.service.recently_present(None, None).await.unwrap();

    let names: Vec<_> = recent.iter().map(|p| p.display_name.as_str()).collect();
    assert_eq!(names, ["Guest 2", "Wanda", "Guest 1"]);
    assert!(recent
        .windows(2)
        .all(|pair| pair[0].checked_in_at >= pair[1].checked_in_at));
}

#[tokio::test]
async fn limit_is_clamped_to_at_least_one() {
    let venue = venue().await;
    venue
        .arrive(&["GENERAL|G1", "GENERAL|G2", "GENERAL|G3"])
        .await;

    let two = venue.service.recently_present(Some(2), None).await.unwrap();
    let zero = venue.service.recently_present(Some(0), None).await.unwrap();
    let huge = venue
        .service
        .recently_present(Some(10_000), None)
        .await
        .unwrap();

    assert_eq!(two.len(), 2);
    assert_eq!(zero.len(), 1);
    assert_eq!(zero[0].display_name, "Guest 3");
    assert_eq!(huge.len(), 3);
}

#[tokio::test]
async fn namespace_filter_keeps_populations_apart() {
    let venue = venue().await;
    venue
        .arrive(&["GENERAL|G1", "SPH|W1", "GENERAL|G2"])
        .await;

    let workshop = venue
        .service
        .recently_present(None, Some(Namespace::Workshop))
        .await
        .unwrap();
    let general = venue
        .service
        .recently_present(None, Some(Namespace::General))
        .await
        .unwrap();

    assert_eq!(workshop.len(), 1);
    assert_eq!(workshop[0].display_name, "Wanda");
    assert!(general.iter().all(|p| p.namespace == Namespace::General));
    assert_eq!(general.len(), 2);
}

#[tokio::test]
async fn refused_scans_do_not_reach_the_roster() {
    let venue = venue().await;
    let device = DeviceId::new("roster-test");

    let refused = venue.service.submit_scan("SPH|W2", &device).await.unwrap();
    assert!(!refused.is_success());

    let recent = venue.service.recently_present(None, None).await.unwrap();
    assert!(recent.is_empty());
}

#[tokio::test]
async fn summary_counts_each_namespace() {
    let venue = venue().await;
    venue
        .arrive(&["GENERAL|G1", "GENERAL|G4", "SPH|W1"])
        .await;

    let summary = venue.service.attendance_summary().await.unwrap();

    assert_eq!(summary.total, 8);
    assert_eq!(summary.present, 3);

    let general = summary
        .namespaces
        .iter()
        .find(|c| c.namespace == Namespace::General)
        .unwrap();
    let workshop = summary
        .namespaces
        .iter()
        .find(|c| c.namespace == Namespace::Workshop)
        .unwrap();
    assert_eq!((general.total, general.present), (6, 2));
    assert_eq!((workshop.total, workshop.present), (2, 1));
}

#[tokio::test]
async fn roster_fails_while_the_store_is_down() {
    let venue = venue().await;
    venue.store.set_outage(true);

    assert!(venue.service.recently_present(None, None).await.is_err());
    assert!(venue.service.attendance_summary().await.is_err());
}
