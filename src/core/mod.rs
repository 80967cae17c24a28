pub mod limbs;
pub mod message;
pub mod traits;
pub mod types;

pub use limbs::{KEY_LIMBS_2048, PublicKeyLimbs};
pub use message::{PublicKeyMaterial, RawMessage, SignatureMaterial};
pub use traits::{KeyHasher, KeySource, PartialHasher};
pub use types::{BoundedBytes, FieldElement, HashAlignedSpan, PartialHashState, SequenceSpan};
