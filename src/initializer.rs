use tokio::task::JoinHandle;
use tracing::{error, info, instrument};

use crate::pipeline::ReservationService;
use crate::reservation::Reservation;
use crate::Error;

pub const SEED_NAMES: [&str; 8] = [
    "Josh", "Zen", "Fish", "Levi", "Blair", "Samuel", "Matt", "Sarah",
];

/// Replaces the content of the store with `names`, in a single transaction, and returns the
/// records the store holds afterwards. On error nothing changes.
#[instrument(skip(service))]
pub async fn reseed(
    service: &ReservationService,
    names: &[&str],
) -> Result<Vec<Reservation>, Error> {
    let mut tx = service.store().begin()?;

    let deleted = tx.delete_all().await?;
    info!(transaction_id = %tx.id, deleted, "Cleared reservations");

    let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
    service.save_all_in(&mut tx, names).await?;
    let records = tx.find_all().await?;
    tx.commit()?;

    Ok(records)
}

/// Reseeds the store in the background. The outcome is only reported through the logs; a failed
/// reseed leaves the previous data in place.
pub fn spawn(service: ReservationService) -> JoinHandle<()> {
    tokio::spawn(async move {
        match reseed(&service, &SEED_NAMES).await {
            Ok(records) => {
                for reservation in &records {
                    info!("{}", reservation);
                }
            }
            Err(e) => error!("Failed to seed reservations, keeping existing data: {}", e),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    fn names(records: &[Reservation]) -> Vec<&str> {
        records.iter().map(|r| r.name.as_str()).collect()
    }

    #[tokio::test]
    async fn seeds_an_empty_store() {
        let service = ReservationService::new(Store::open());

        let records = reseed(&service, &SEED_NAMES).await.unwrap();

        assert_eq!(records.len(), 8);
        assert_eq!(names(&records), SEED_NAMES);
        assert_eq!(service.find_all().await.unwrap(), records);
    }

    #[tokio::test]
    async fn replaces_existing_records() {
        let service = ReservationService::new(Store::open());
        service.save_all(["Old", "Older"]).await.unwrap();

        let records = reseed(&service, &SEED_NAMES).await.unwrap();

        assert_eq!(names(&records), SEED_NAMES);
        assert_eq!(service.find_all().await.unwrap(), records);
    }

    #[tokio::test]
    async fn failed_reseed_keeps_existing_records() {
        let service = ReservationService::new(Store::open());
        let existing = service.save_all(["Old"]).await.unwrap();

        let res = reseed(&service, &["Josh", "zen"]).await;

        assert!(res.is_err());
        assert_eq!(service.find_all().await.unwrap(), existing);
    }

    #[tokio::test]
    async fn spawned_seed() {
        let service = ReservationService::new(Store::open());

        spawn(service.clone()).await.unwrap();

        assert_eq!(names(&service.find_all().await.unwrap()), SEED_NAMES);
    }

    #[tokio::test]
    async fn spawned_seed_failure_is_not_fatal() {
        let service = ReservationService::new(Store::open());
        service.store().close();

        // The task logs the error and completes normally.
        spawn(service.clone()).await.unwrap();
    }
}
