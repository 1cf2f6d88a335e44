pub mod case;
pub mod claims;
pub mod clock;
pub mod expiry;
pub mod factory;
pub mod issuer;
pub mod keystore;
pub mod sanitize;
pub mod scope;
pub mod verify;

pub use claims::{
    CanonicalClaims, DecodedToken, SignRequest, SignedToken, VerifyExpectation, VerifyResult,
};
pub use case::{to_app_case, to_wire_case};
pub use clock::{Clock, ManualClock, SystemClock};
pub use expiry::{Expiry, parse_duration, resolve_expiry};
pub use factory::build_issuer;
pub use issuer::TokenIssuer;
pub use keystore::{KeyType, Keystore, MemoryKeystore, SigningKey};
pub use sanitize::sanitize_token;
pub use scope::{
    Permission, Scope, UnknownPermission, UnknownScope, has_scope, is_valid_scope, split_claim,
};
pub use verify::decode;
