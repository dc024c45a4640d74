pub mod fixed;
pub mod error;
pub mod crypto;
pub mod cursor;
pub mod header;
pub mod records;
pub mod mesh;
pub mod asset;
pub mod perf;
pub mod inspect;

pub use error::FormatError;
pub use crypto::{decrypt, Decrypted, KeyScheme};
pub use cursor::BinaryCursor;
pub use header::ContainerHeader;
pub use records::{AssetKind, FaceData, ObjectData, TextureList};
pub use records::circuit::Circuit;
pub use records::vehicle::Vehicle;
pub use mesh::{build_mesh, update_mesh_uv, Aabb, MaterialKey, Mesh, MeshGroup};
pub use asset::{load_asset, load_asset_with, Document, LoadOptions};
pub use inspect::InspectContext;
