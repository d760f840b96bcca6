//! Wire formats and domain types shared across the TPT workspace.
//!
//! Nothing in this crate touches the filesystem or the network; it exists
//! so `tpt-core`, `tpt-cli`, `tpt-apply-updates`, and `tpt-repogen` agree on
//! one definition of a package descriptor, an installed record, and the
//! closed error enum without depending on each other.

pub mod aadpo;
pub mod error;
pub mod handler;
pub mod hash;
pub mod installed;
pub mod package;
pub mod version;

pub use aadpo::{AadpoAction, AadpoActionOutcome, AadpoManifest};
pub use error::{Error, Result};
pub use handler::{Format, NativeManager, Source};
pub use hash::Sha256Hex;
pub use installed::{InstalledDb, InstalledRecord, InstallationDetails};
pub use package::{DesktopEntrySpec, Metadata, PackageDescriptor, PackageName, RepositoryManifest};
pub use version::Version;
