use thiserror::Error as ThisError;
use tracing::{debug, instrument};

use crate::reservation::Reservation;
use crate::store::{Store, Transaction};
use crate::Error;

/// Persists batches of reservations. Every record is validated right after the store assigns its
/// identifier; a single invalid name aborts the transaction, so either the whole batch is
/// committed or none of it is.
#[derive(Clone)]
pub struct ReservationService {
    store: Store,
}

impl ReservationService {
    pub fn new(store: Store) -> ReservationService {
        ReservationService { store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Saves all names in a transaction of its own and returns the persisted records in input
    /// order.
    #[instrument(skip_all)]
    pub async fn save_all<I, S>(&self, names: I) -> Result<Vec<Reservation>, Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut tx = self.store.begin()?;
        let saved = self.save_all_in(&mut tx, names).await?;
        tx.commit()?;

        Ok(saved)
    }

    /// Saves all names as part of the caller's transaction. On error the caller is expected to
    /// drop the transaction, which rolls back everything saved here.
    pub async fn save_all_in<I, S>(
        &self,
        tx: &mut Transaction,
        names: I,
    ) -> Result<Vec<Reservation>, Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut saved = Vec::new();

        for name in names {
            let reservation = tx.create(Reservation::new(name)).await?;
            validate(&reservation)?;
            debug!(transaction_id = %tx.id, "Saved {}", reservation);
            saved.push(reservation);
        }

        Ok(saved)
    }

    pub async fn find_all(&self) -> Result<Vec<Reservation>, Error> {
        Ok(self.store.find_all().await?)
    }
}

/// A reservation name must start with an uppercase letter.
pub fn validate(reservation: &Reservation) -> Result<(), ValidationError> {
    match reservation.name.chars().next() {
        None => Err(ValidationError::EmptyName),
        Some(c) if c.is_uppercase() => Ok(()),
        Some(_) => Err(ValidationError::NotCapitalized {
            name: reservation.name.clone(),
        }),
    }
}

#[derive(Debug, ThisError, PartialEq)]
pub enum ValidationError {
    #[error("validation error; name must not be empty")]
    EmptyName,
    #[error("validation error; name must start with a capital letter! got {name:?}")]
    NotCapitalized { name: String },
}
