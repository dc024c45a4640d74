//! High-level loading API.
//!
//! ```no_run
//! use pdbf::asset::{load_asset, Document};
//!
//! match load_asset("ALDERON.BL4")? {
//!     Document::Circuit(c) => println!("{} sectors", c.sectors.len()),
//!     Document::Vehicle(v) => println!("vehicle {}", v.name),
//! }
//! # Ok::<(), pdbf::FormatError>(())
//! ```

use std::fs;
use std::path::Path;

use log::debug;
use serde::Serialize;

use crate::error::FormatError;
use crate::records::circuit::Circuit;
use crate::records::vehicle::Vehicle;
use crate::records::AssetKind;

// ── LoadOptions ───────────────────────────────────────────────────────────────

/// Configuration for [`load_asset_with`] and [`Document::parse`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    /// Fail on reads past the end of the plaintext instead of zero-filling.
    /// Also rejects circuits whose header marker is not the expected value.
    pub strict: bool,
    /// Overrides detection from the file extension.
    pub kind:   Option<AssetKind>,
}

impl AssetKind {
    /// `.BV*` files are vehicles and `.BL*` files circuits, in any case.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        if ext.starts_with("bv") {
            Some(AssetKind::Vehicle)
        } else if ext.starts_with("bl") {
            Some(AssetKind::Circuit)
        } else {
            None
        }
    }
}

// ── Document ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub enum Document {
    Vehicle(Box<Vehicle>),
    Circuit(Box<Circuit>),
}

impl Document {
    pub fn parse(raw: &[u8], kind: AssetKind, options: &LoadOptions) -> Result<Self, FormatError> {
        Ok(match kind {
            AssetKind::Vehicle => Document::Vehicle(Box::new(Vehicle::parse(raw, options.strict)?)),
            AssetKind::Circuit => Document::Circuit(Box::new(Circuit::parse(raw, options.strict)?)),
        })
    }

    pub fn kind(&self) -> AssetKind {
        match self {
            Document::Vehicle(_) => AssetKind::Vehicle,
            Document::Circuit(_) => AssetKind::Circuit,
        }
    }

    pub fn as_vehicle(&self) -> Option<&Vehicle> {
        match self {
            Document::Vehicle(v) => Some(v),
            Document::Circuit(_) => None,
        }
    }

    pub fn as_circuit(&self) -> Option<&Circuit> {
        match self {
            Document::Circuit(c) => Some(c),
            Document::Vehicle(_) => None,
        }
    }
}

pub fn load_asset<P: AsRef<Path>>(path: P) -> Result<Document, FormatError> {
    load_asset_with(path, &LoadOptions::default())
}

pub fn load_asset_with<P: AsRef<Path>>(path: P, options: &LoadOptions) -> Result<Document, FormatError> {
    let path = path.as_ref();
    let kind = options
        .kind
        .or_else(|| AssetKind::from_path(path))
        .ok_or_else(|| FormatError::UnknownAssetKind(path.to_owned()))?;
    let raw = fs::read(path)?;
    debug!("loading {} as {:?} ({} bytes)", path.display(), kind, raw.len());
    Document::parse(&raw, kind, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn kind_from_extension() {
        assert_eq!(AssetKind::from_path(Path::new("DATA/ALDERON.BL4")), Some(AssetKind::Circuit));
        assert_eq!(AssetKind::from_path(Path::new("cars/nemesis.bv4")), Some(AssetKind::Vehicle));
        assert_eq!(AssetKind::from_path(Path::new("readme.txt")), None);
        assert_eq!(AssetKind::from_path(Path::new("noext")), None);
    }

    #[test]
    fn unknown_kind_is_reported_before_io() {
        let p = PathBuf::from("/nonexistent/file.dat");
        match load_asset(&p) {
            Err(FormatError::UnknownAssetKind(got)) => assert_eq!(got, p),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_io() {
        let r = load_asset("/nonexistent/file.bv4");
        assert!(matches!(r, Err(FormatError::Io(_))));
    }
}
