//! shelter-core: entities and state machines of the adoption lifecycle.
//!
//! Everything here is pure: no I/O, no clock. Operations that stamp dates
//! take `now` as a parameter so callers (and tests) control time.
//!
//! # Public API
//!
//! - [`AdoptionApplication`] / [`ApplicationStatus`] -- applications and
//!   their review state machine
//! - [`AdoptionRecord`] / [`AdoptionStatus`] -- finalized adoptions with
//!   payment, trial, follow-up and return bookkeeping
//! - [`Animal`] -- the slice of the animal registry the workflow touches
//! - [`TransitionPolicy`] -- permissive or strict transition checking
//! - Typed identifiers: [`AnimalId`], [`ApplicationId`], [`AdoptionId`],
//!   [`ActorId`]

pub mod adoption;
pub mod animal;
pub mod application;
pub mod id;
pub mod transition;
pub mod validation;

pub use adoption::{
    days_after, AdoptionContract, AdoptionPatch, AdoptionPatchError, AdoptionRecord,
    AdoptionStatus, AdoptionTerms, FollowUp, FollowUpError, FollowUpKind, PatchOutcome,
    PaymentStatus, MAX_SCHEDULE_DAYS,
};
pub use animal::{Animal, AnimalStatus, AvailabilityError};
pub use application::{
    AddressInfo, AdoptionApplication, ApplicantInfo, ApplicantProfile, ApplicationPatch,
    ApplicationStatus, CurrentPet, HouseholdMember, HousingInfo, HousingType, OwnershipStatus,
    Reference,
};
pub use id::{ActorId, AdoptionId, AnimalId, ApplicationId, IdError};
pub use transition::{ChangeSet, TransitionError, TransitionPolicy};
pub use validation::ValidationError;
