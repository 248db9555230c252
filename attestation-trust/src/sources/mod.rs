//! Trust source implementations.

mod ca_list;

pub use self::ca_list::CaListTrustSource;
