use super::pvz::PvzId;
use crate::error::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub type ReceptionId = Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum ReceptionStatus {
    Open,
    Closed,
}

impl ReceptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceptionStatus::Open => "open",
            ReceptionStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for ReceptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReceptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(ReceptionStatus::Open),
            "closed" => Ok(ReceptionStatus::Closed),
            other => Err(format!("unknown reception status `{other}`")),
        }
    }
}

/// A goods reception at a pickup point.
///
/// Starts `open` and moves to `closed` exactly once. Products may only be
/// attached to or detached from an open reception.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reception {
    pub id: ReceptionId,
    pub pvz_id: PvzId,
    pub status: ReceptionStatus,
    pub started_at: DateTime<Utc>,
}

impl Reception {
    pub fn open(pvz_id: PvzId) -> Self {
        Self {
            id: Uuid::new_v4(),
            pvz_id,
            status: ReceptionStatus::Open,
            started_at: Utc::now(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == ReceptionStatus::Open
    }

    /// Transitions an open reception to `closed`.
    pub fn close(&mut self) -> Result<(), Error> {
        if !self.is_open() {
            return Err(Error::AllReceptionsClosed);
        }
        self.status = ReceptionStatus::Closed;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reception_starts_open() {
        let reception = Reception::open(Uuid::new_v4());
        assert!(reception.is_open());
    }

    #[test]
    fn test_close_is_terminal() {
        let mut reception = Reception::open(Uuid::new_v4());
        assert!(reception.close().is_ok());
        assert_eq!(reception.status, ReceptionStatus::Closed);

        assert!(matches!(reception.close(), Err(Error::AllReceptionsClosed)));
        assert_eq!(reception.status, ReceptionStatus::Closed);
    }

    #[test]
    fn test_status_parsing_is_case_sensitive() {
        assert_eq!("open".parse::<ReceptionStatus>(), Ok(ReceptionStatus::Open));
        assert_eq!("closed".parse::<ReceptionStatus>(), Ok(ReceptionStatus::Closed));
        assert!("Closed".parse::<ReceptionStatus>().is_err());
    }
}
