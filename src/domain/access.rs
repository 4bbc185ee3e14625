use super::reservation::UserId;
use crate::error::RentalError;
use std::collections::HashSet;

/// Permissions granted to an authenticated principal by the identity layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Read every reservation, not only one's own.
    ViewAllReservations,
    /// Hard-delete reservations outside the normal lifecycle.
    AdministerReservations,
}

/// An authenticated caller. Trusted as given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    capabilities: HashSet<Capability>,
}

impl Principal {
    pub fn renter(user_id: UserId) -> Self {
        Self {
            user_id,
            capabilities: HashSet::new(),
        }
    }

    pub fn administrator(user_id: UserId) -> Self {
        Self::renter(user_id)
            .with_capability(Capability::ViewAllReservations)
            .with_capability(Capability::AdministerReservations)
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    pub fn require(&self, capability: Capability) -> Result<(), RentalError> {
        if self.can(capability) {
            Ok(())
        } else {
            Err(RentalError::Forbidden(format!(
                "User {} lacks {:?}",
                self.user_id, capability
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renter_has_no_capabilities() {
        let renter = Principal::renter(UserId::new());
        assert!(!renter.can(Capability::ViewAllReservations));
        assert!(matches!(
            renter.require(Capability::AdministerReservations),
            Err(RentalError::Forbidden(_))
        ));
    }

    #[test]
    fn test_administrator_capabilities() {
        let admin = Principal::administrator(UserId::new());
        assert!(admin.require(Capability::AdministerReservations).is_ok());
        assert!(admin.can(Capability::ViewAllReservations));
    }
}
