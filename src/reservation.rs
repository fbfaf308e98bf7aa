use serde::{Deserialize, Serialize};
use std::fmt;

/// A single reservation. The identifier is assigned by the store the first time the record is
/// persisted and is `None` until then.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Option<i32>,
    pub name: String,
}

impl Reservation {
    pub fn new(name: impl Into<String>) -> Reservation {
        Reservation {
            id: None,
            name: name.into(),
        }
    }
}

impl fmt::Display for Reservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "Reservation(id={}, name={})", id, self.name),
            None => write!(f, "Reservation(id=null, name={})", self.name),
        }
    }
}
