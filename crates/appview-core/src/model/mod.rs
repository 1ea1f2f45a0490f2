pub mod outcome;
pub mod parts;
pub mod preprint;
pub mod provenance;
pub mod review;
pub mod uri;

pub use outcome::{BatchFailure, BatchOutcome};
pub use parts::{
    Author, BlobRef, FundingSource, License, PublicationStatus, RelatedWork, RelationType,
    SupplementaryMaterial,
};
pub use preprint::{Preprint, PreprintPatch};
pub use provenance::Provenance;
pub use review::{Review, ReviewMotivation, ReviewPatch};
pub use uri::RecordUri;
