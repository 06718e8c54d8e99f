use sea_orm::entity::prelude::*;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default status for a freshly registered profile.
pub const DEFAULT_PROFILE_STATUS: &str = "Pending";

/// Default status for a freshly posted product.
pub const DEFAULT_PRODUCT_STATUS: &str = "Available";

/// Progress of a delivery or a transportation request.
///
/// Stored as text so the column stays readable in the database, but only the
/// variants below are accepted and moves between them follow
/// [`FulfillmentStatus::can_transition_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum FulfillmentStatus {
    #[sea_orm(string_value = "Pending")]
    Pending,
    #[sea_orm(string_value = "Assigned")]
    Assigned,
    #[sea_orm(string_value = "InTransit")]
    InTransit,
    #[sea_orm(string_value = "Arrived")]
    Arrived,
    #[sea_orm(string_value = "Cancelled")]
    Cancelled,
}

impl Default for FulfillmentStatus {
    fn default() -> Self {
        FulfillmentStatus::Pending
    }
}

/// Errors raised when interpreting or changing a fulfillment status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusError {
    #[error("Unknown status '{0}'")]
    Unknown(String),

    #[error("Cannot change status from {from} to {to}")]
    IllegalTransition {
        from: FulfillmentStatus,
        to: FulfillmentStatus,
    },

    #[error("A job that is {0} can no longer be reassigned")]
    Closed(FulfillmentStatus),

    #[error("A rider is required to mark a job {0}")]
    RiderRequired(FulfillmentStatus),

    #[error("A pending job cannot have a rider")]
    RiderNotAllowed,
}

impl FulfillmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentStatus::Pending => "Pending",
            FulfillmentStatus::Assigned => "Assigned",
            FulfillmentStatus::InTransit => "InTransit",
            FulfillmentStatus::Arrived => "Arrived",
            FulfillmentStatus::Cancelled => "Cancelled",
        }
    }

    /// Statuses reachable in one step from `self`.
    pub fn next_states(&self) -> &'static [FulfillmentStatus] {
        use FulfillmentStatus::*;
        match self {
            Pending => &[Assigned, Cancelled],
            Assigned => &[Pending, InTransit, Cancelled],
            InTransit => &[Arrived, Cancelled],
            Arrived | Cancelled => &[],
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.next_states().is_empty()
    }

    /// Statuses that only make sense once someone is carrying the job.
    pub fn needs_rider(&self) -> bool {
        matches!(
            self,
            FulfillmentStatus::Assigned | FulfillmentStatus::InTransit | FulfillmentStatus::Arrived
        )
    }

    /// Re-writing the current status is always allowed.
    pub fn can_transition_to(&self, next: FulfillmentStatus) -> bool {
        *self == next || self.next_states().contains(&next)
    }

    pub fn transition_to(&self, next: FulfillmentStatus) -> Result<FulfillmentStatus, StatusError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(StatusError::IllegalTransition { from: *self, to: next })
        }
    }
}

/// Status of a delivery or ride together with the rider carrying it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub status: FulfillmentStatus,
    pub rider_id: Option<i32>,
}

impl Assignment {
    pub fn new(status: FulfillmentStatus, rider_id: Option<i32>) -> Self {
        Self { status, rider_id }
    }

    /// Apply a requested status and optional rider.
    ///
    /// Assigned, InTransit and Arrived need a rider, either the one supplied or
    /// the one already set. Going back to Pending releases the rider. A
    /// terminal job keeps its rider.
    pub fn change(
        self,
        requested: FulfillmentStatus,
        rider_id: Option<i32>,
    ) -> Result<Assignment, StatusError> {
        let status = self.status.transition_to(requested)?;

        if self.status.is_terminal() && rider_id.is_some_and(|r| self.rider_id != Some(r)) {
            return Err(StatusError::Closed(self.status));
        }

        let rider_id = match status {
            FulfillmentStatus::Pending if rider_id.is_some() => return Err(StatusError::RiderNotAllowed),
            FulfillmentStatus::Pending => None,
            status if status.needs_rider() => {
                Some(rider_id.or(self.rider_id).ok_or(StatusError::RiderRequired(status))?)
            }
            _ => rider_id.or(self.rider_id),
        };

        Ok(Assignment { status, rider_id })
    }
}

impl fmt::Display for FulfillmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FulfillmentStatus {
    type Err = StatusError;

    /// Accepts any casing and ignores spaces, dashes and underscores, so
    /// "In Transit", "in_transit" and "INTRANSIT" all parse.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "pending" => Ok(FulfillmentStatus::Pending),
            "assigned" => Ok(FulfillmentStatus::Assigned),
            "intransit" => Ok(FulfillmentStatus::InTransit),
            "arrived" => Ok(FulfillmentStatus::Arrived),
            "cancelled" | "canceled" => Ok(FulfillmentStatus::Cancelled),
            _ => Err(StatusError::Unknown(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::Iterable;
    use FulfillmentStatus::*;

    #[test]
    fn test_parse_accepts_loose_spelling() {
        assert_eq!("pending".parse::<FulfillmentStatus>(), Ok(Pending));
        assert_eq!("In Transit".parse::<FulfillmentStatus>(), Ok(InTransit));
        assert_eq!("in_transit".parse::<FulfillmentStatus>(), Ok(InTransit));
        assert_eq!("ARRIVED".parse::<FulfillmentStatus>(), Ok(Arrived));
        assert_eq!("canceled".parse::<FulfillmentStatus>(), Ok(Cancelled));
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert_eq!(
            "Teleported".parse::<FulfillmentStatus>(),
            Err(StatusError::Unknown("Teleported".to_string()))
        );
        assert!("".parse::<FulfillmentStatus>().is_err());
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for status in FulfillmentStatus::iter() {
            assert_eq!(status.to_string().parse::<FulfillmentStatus>(), Ok(status));
        }
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut status = FulfillmentStatus::default();
        assert_eq!(status, Pending);
        for next in [Assigned, InTransit, Arrived] {
            status = status.transition_to(next).unwrap();
        }
        assert_eq!(status, Arrived);
        assert!(status.is_terminal());
    }

    #[test]
    fn test_illegal_jumps_are_rejected() {
        assert_eq!(
            Pending.transition_to(Arrived),
            Err(StatusError::IllegalTransition { from: Pending, to: Arrived })
        );
        assert!(!Arrived.can_transition_to(Pending));
        assert!(!Cancelled.can_transition_to(Assigned));
        assert!(!InTransit.can_transition_to(Assigned));
    }

    #[test]
    fn test_same_status_is_a_noop() {
        for status in FulfillmentStatus::iter() {
            assert!(status.can_transition_to(status));
        }
    }

    #[test]
    fn test_any_live_status_can_be_cancelled() {
        for status in [Pending, Assigned, InTransit] {
            assert!(status.can_transition_to(Cancelled));
        }
    }

    #[test]
    fn test_riderless_job_cannot_progress() {
        let job = Assignment::new(Pending, None);
        assert_eq!(job.change(Assigned, None), Err(StatusError::RiderRequired(Assigned)));

        let job = Assignment::new(Assigned, None);
        assert_eq!(job.change(InTransit, None), Err(StatusError::RiderRequired(InTransit)));
    }

    #[test]
    fn test_rider_is_kept_or_supplied() {
        let assigned = Assignment::new(Pending, None).change(Assigned, Some(7)).unwrap();
        assert_eq!(assigned, Assignment::new(Assigned, Some(7)));

        let moving = assigned.change(InTransit, None).unwrap();
        assert_eq!(moving, Assignment::new(InTransit, Some(7)));
    }

    #[test]
    fn test_back_to_pending_releases_rider() {
        let job = Assignment::new(Assigned, Some(7));
        assert_eq!(job.change(Pending, None).unwrap(), Assignment::new(Pending, None));
        assert_eq!(job.change(Pending, Some(8)), Err(StatusError::RiderNotAllowed));
    }

    #[test]
    fn test_terminal_job_keeps_its_rider() {
        let done = Assignment::new(Arrived, Some(7));
        assert_eq!(done.change(Arrived, Some(8)), Err(StatusError::Closed(Arrived)));
        assert_eq!(done.change(Arrived, Some(7)).unwrap(), done);
        assert_eq!(done.change(Arrived, None).unwrap(), done);
    }

    #[test]
    fn test_cancelling_needs_no_rider() {
        let job = Assignment::new(Pending, None);
        assert_eq!(job.change(Cancelled, None).unwrap(), Assignment::new(Cancelled, None));
    }
}
